#[cfg(test)]
mod refinery_tests {
    use crate::api::ordering::AsciiCaseInsensitive;
    use crate::api::reduce::{ReduceContext, Reducer};
    use crate::config::refinery_config::{RefineryConfig, ShuffleMode};
    use crate::core::driver::ReduceDriver;
    use crate::core::grouped::GroupValues;
    use crate::core::side_state::SideState;
    use crate::framework::errors::FerrumRefineryError;
    use crate::framework::refinery::RefineryBuilder;
    use bytes::Bytes;
    use ferrum_deposit::block::{BlockRecordReader, BlockRecordWriter};
    use ferrum_deposit::config::deposit_config::DepositConfig;
    use ferrum_deposit::error::FerrumDepositError;
    use ferrum_deposit::lines::{LineRecordReader, LineRecordWriter};
    use ferrum_deposit::partition::{MemoryPartition, PartitionReader};
    use ferrum_deposit::record::Record;
    use ferrum_deposit::sink::{MemorySink, OutputSink};
    use std::fs;
    use std::fs::File;
    use std::io::{BufReader, BufWriter, Cursor};
    use tokio_test::{assert_err, assert_ok};

    const WORDS_PARTITION_ONE: &str = "apple\t1\nbanana\t2\ncherry\t1\n";
    const WORDS_PARTITION_TWO: &str = "apple\t3\ncherry\t4\ndate\t1\n";
    const WORDS_PARTITION_THREE: &str = "\nbanana\t5\n";

    type LinePartition = LineRecordReader<Cursor<&'static str>, String, u64>;

    fn line_partitions() -> Vec<LinePartition> {
        vec![
            LineRecordReader::new(Cursor::new(WORDS_PARTITION_ONE)),
            LineRecordReader::new(Cursor::new(WORDS_PARTITION_TWO)),
            LineRecordReader::new(Cursor::new(WORDS_PARTITION_THREE)),
        ]
    }

    fn expected_counts() -> Vec<(String, u64)> {
        vec![
            ("apple".to_string(), 4),
            ("banana".to_string(), 7),
            ("cherry".to_string(), 5),
            ("date".to_string(), 1),
        ]
    }

    struct WordCountReducer;

    impl Reducer<String, u64, String, u64> for WordCountReducer {
        fn reduce(
            &mut self,
            key: &String,
            values: &mut GroupValues<'_, String, u64>,
            context: &mut ReduceContext<'_, String, (), String, u64>,
        ) -> anyhow::Result<()> {
            context.emit(key.clone(), values.sum());
            Ok(())
        }
    }

    #[test]
    fn sorted_and_combine_paths_agree() {
        let mut merged = MemorySink::new();
        let mut combined = MemorySink::new();

        let sorted_summary = RefineryBuilder::new()
            .with_shuffle_mode(ShuffleMode::Sorted)
            .with_order_verification(true)
            .build()
            .unwrap()
            .refine(line_partitions(), WordCountReducer, &mut merged)
            .unwrap();
        let combined_summary = RefineryBuilder::new()
            .with_shuffle_mode(ShuffleMode::Combine)
            .with_combiner(|total: u64, count: u64| total + count)
            .build()
            .unwrap()
            .refine(line_partitions(), WordCountReducer, &mut combined)
            .unwrap();

        assert_eq!(merged.records(), expected_counts().as_slice());
        assert_eq!(combined.records(), expected_counts().as_slice());
        assert_eq!(sorted_summary.groups, 4);
        assert_eq!(combined_summary.groups, 4);
        // every input record reaches the reducer only on the sorted path
        assert_eq!(sorted_summary.values_read, 7);
        assert_eq!(combined_summary.values_read, 4);
    }

    #[test]
    fn config_selects_combine_mode_for_unsorted_input() {
        let config = RefineryConfig::from_xml_str(
            "<refinery><data.dir>data</data.dir><input.partitions>2</input.partitions>\
             <shuffle.mode>combine</shuffle.mode></refinery>",
        )
        .unwrap();
        let partitions = vec![
            MemoryPartition::from(vec![("Pear".to_string(), 1), ("apple".to_string(), 1)]),
            MemoryPartition::from(vec![("APPLE".to_string(), 2), ("pear".to_string(), 5)]),
        ];
        let mut sink = MemorySink::new();

        let refinery = RefineryBuilder::new()
            .with_config(config)
            .with_ordering(AsciiCaseInsensitive)
            .with_combiner(|total: u64, count: u64| total + count)
            .build()
            .unwrap();
        assert_eq!(refinery.shuffle_mode, ShuffleMode::Combine);

        assert_ok!(refinery.refine(partitions, WordCountReducer, &mut sink));
        let counts: Vec<u64> = sink.records().iter().map(|(_, count)| *count).collect();
        assert_eq!(counts, vec![3, 6]);
        assert!(sink.records()[0].0.eq_ignore_ascii_case("apple"));
        assert!(sink.records()[1].0.eq_ignore_ascii_case("pear"));
    }

    #[test]
    fn configured_order_verification_rejects_unsorted_partitions() {
        let config = RefineryConfig::from_xml_str(
            "<refinery><data.dir>data</data.dir><input.partitions>1</input.partitions>\
             <merge.verify.order>true</merge.verify.order></refinery>",
        )
        .unwrap();
        let partitions = vec![LineRecordReader::<_, String, u64>::new(Cursor::new(
            "b\t1\na\t1\n",
        ))];
        let mut sink = MemorySink::new();

        let result = RefineryBuilder::new()
            .with_config(config)
            .build()
            .unwrap()
            .refine(partitions, WordCountReducer, &mut sink);

        assert_eq!(
            result.map(|_| ()),
            Err(FerrumRefineryError::OrderingViolation(
                "partition 0: key \"a\" follows \"b\"".to_string()
            ))
        );
        assert!(sink.records().is_empty());
    }

    /// Yields its records, then fails every read after them.
    struct TruncatedPartition {
        records: Vec<(String, u64)>,
    }

    impl PartitionReader<String, u64> for TruncatedPartition {
        fn read_next(&mut self) -> ferrum_deposit::error::Result<Option<Record<String, u64>>> {
            match self.records.is_empty() {
                true => Err(FerrumDepositError::ReadError("disk gone".to_string())),
                false => Ok(Some(Record::from(self.records.remove(0)))),
            }
        }
    }

    #[test]
    fn read_failure_on_third_record_stops_all_writes() {
        let partitions = vec![TruncatedPartition {
            records: vec![("a".to_string(), 1), ("b".to_string(), 2)],
        }];
        let mut sink = MemorySink::new();

        let result = RefineryBuilder::new()
            .build()
            .unwrap()
            .refine(partitions, WordCountReducer, &mut sink);

        assert_err!(&result);
        assert_eq!(
            result.map(|_| ()),
            Err(FerrumRefineryError::ReadFailure(
                "partition 0: read error: disk gone".to_string()
            ))
        );
        // "a" completed before the failure; "b" never reaches the sink
        assert_eq!(sink.records(), &[("a".to_string(), 1)]);
        assert!(sink.is_closed());
    }

    #[test]
    fn combine_mode_fails_before_any_group_on_read_failure() {
        let partitions = vec![TruncatedPartition {
            records: vec![("a".to_string(), 1), ("b".to_string(), 2)],
        }];
        let mut sink = MemorySink::new();

        let result = RefineryBuilder::new()
            .with_shuffle_mode(ShuffleMode::Combine)
            .with_combiner(|total: u64, count: u64| total + count)
            .build()
            .unwrap()
            .refine(partitions, WordCountReducer, &mut sink);

        assert_eq!(
            result.map(|_| ()),
            Err(FerrumRefineryError::ReadFailure(
                "partition 0: read error: disk gone".to_string()
            ))
        );
        assert!(sink.records().is_empty());
    }

    type Point = (f64, f64);

    /// Point sum plus the number of points folded into it.
    type PointSum = (f64, f64, u64);

    fn add_points(left: PointSum, right: PointSum) -> PointSum {
        (left.0 + right.0, left.1 + right.1, left.2 + right.2)
    }

    /// Moves each centroid to the mean of its assigned points and reports
    /// whether it moved less than `tolerance`.
    struct CentroidReducer {
        tolerance: f64,
    }

    impl Reducer<String, PointSum, String, Point, Point> for CentroidReducer {
        fn reduce(
            &mut self,
            key: &String,
            values: &mut GroupValues<'_, String, PointSum>,
            context: &mut ReduceContext<'_, String, Point, String, Point>,
        ) -> anyhow::Result<()> {
            let (x, y, count) = values.fold((0.0, 0.0, 0), add_points);
            if count == 0 {
                anyhow::bail!("no points assigned");
            }
            let mean = (x / count as f64, y / count as f64);

            let centroid = context.side_state()?;
            let delta = ((mean.0 - centroid.0).powi(2) + (mean.1 - centroid.1).powi(2)).sqrt();
            *centroid = mean;

            context.report_outcome(delta < self.tolerance);
            context.emit(key.clone(), mean);
            Ok(())
        }
    }

    fn assignments() -> Vec<MemoryPartition<String, PointSum>> {
        vec![
            MemoryPartition::from(vec![
                ("c0".to_string(), (1.0, 1.0, 1)),
                ("c1".to_string(), (9.0, 9.0, 1)),
            ]),
            MemoryPartition::from(vec![
                ("c1".to_string(), (11.0, 11.0, 1)),
                ("c0".to_string(), (3.0, 3.0, 1)),
            ]),
        ]
    }

    fn centroid_round(centroids: SideState<String, Point>) -> (Vec<(String, Point)>, bool) {
        let source = RefineryBuilder::new()
            .with_shuffle_mode(ShuffleMode::Combine)
            .with_combiner(add_points)
            .build()
            .unwrap()
            .shuffle(assignments())
            .unwrap();
        let mut sink = MemorySink::new();

        let summary = ReduceDriver::new(source, CentroidReducer { tolerance: 0.01 }, &mut sink)
            .with_side_state(centroids)
            .run()
            .unwrap();

        (sink.into_records(), summary.outcome)
    }

    #[test]
    fn centroid_iteration_converges_on_side_state() {
        let initial: SideState<String, Point> = vec![
            ("c0".to_string(), (0.0, 0.0)),
            ("c1".to_string(), (10.0, 10.0)),
        ]
        .into_iter()
        .collect();

        let (moved, converged) = centroid_round(initial);
        assert!(!converged);
        assert_eq!(
            moved,
            vec![("c0".to_string(), (2.0, 2.0)), ("c1".to_string(), (10.0, 10.0))]
        );

        let (settled, converged) = centroid_round(moved.clone().into_iter().collect());
        assert!(converged);
        assert_eq!(settled, moved);
    }

    #[test]
    fn centroid_without_side_state_is_fatal() {
        let centroids: SideState<String, Point> =
            vec![("c0".to_string(), (0.0, 0.0))].into_iter().collect();
        let source = RefineryBuilder::new()
            .with_shuffle_mode(ShuffleMode::Combine)
            .with_combiner(add_points)
            .build()
            .unwrap()
            .shuffle(assignments())
            .unwrap();
        let mut sink = MemorySink::new();

        let result = ReduceDriver::new(source, CentroidReducer { tolerance: 0.01 }, &mut sink)
            .with_side_state(centroids)
            .run();

        assert_eq!(
            result.map(|_| ()),
            Err(FerrumRefineryError::MissingSideState("\"c1\"".to_string()))
        );
        assert_eq!(sink.records().len(), 1);
    }

    fn scratch_dir(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("ferrum-refinery-{}-{}", name, uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn reduces_line_partitions_from_the_data_dir() {
        let deposit = DepositConfig {
            data_dir: scratch_dir("lines"),
            record_format: "lines".to_string(),
        };
        fs::create_dir_all(deposit.input_path(0).parent().unwrap()).unwrap();
        fs::create_dir_all(deposit.output_path(0).parent().unwrap()).unwrap();
        fs::write(deposit.input_path(0), WORDS_PARTITION_ONE).unwrap();
        fs::write(deposit.input_path(1), WORDS_PARTITION_TWO).unwrap();
        fs::write(deposit.input_path(2), WORDS_PARTITION_THREE).unwrap();

        let readers: Vec<LineRecordReader<_, String, u64>> = (0..3)
            .map(|index| {
                LineRecordReader::new(BufReader::new(File::open(deposit.input_path(index)).unwrap()))
            })
            .collect();
        let writer =
            LineRecordWriter::new(BufWriter::new(File::create(deposit.output_path(0)).unwrap()));

        let summary = RefineryBuilder::new()
            .build()
            .unwrap()
            .refine(readers, WordCountReducer, writer)
            .unwrap();

        assert_eq!(summary.records_written, 4);
        assert_eq!(
            fs::read_to_string(deposit.output_path(0)).unwrap(),
            "apple\t4\nbanana\t7\ncherry\t5\ndate\t1\n"
        );

        let _ = fs::remove_dir_all(&deposit.data_dir);
    }

    fn block_partition(records: &[(&str, &str)]) -> BlockRecordReader<Cursor<Vec<u8>>> {
        let mut writer = BlockRecordWriter::new(Vec::new());
        for (key, value) in records {
            writer.write(key, value).unwrap();
        }
        BlockRecordReader::new(Cursor::new(writer.into_inner()))
    }

    /// Joins a key's raw values with commas.
    struct JoinReducer;

    impl Reducer<Bytes, Bytes, Bytes, Bytes> for JoinReducer {
        fn reduce(
            &mut self,
            key: &Bytes,
            values: &mut GroupValues<'_, Bytes, Bytes>,
            context: &mut ReduceContext<'_, Bytes, (), Bytes, Bytes>,
        ) -> anyhow::Result<()> {
            let values: Vec<Bytes> = values.collect();
            context.emit(key.clone(), Bytes::from(values.join(&b","[..])));
            Ok(())
        }
    }

    #[test]
    fn block_partitions_merge_in_byte_order() {
        let partitions = vec![
            block_partition(&[("apple", "1"), ("cherry", "2")]),
            block_partition(&[("apple", "3"), ("banana", "4")]),
        ];
        let mut output = BlockRecordWriter::new(Vec::new());

        let summary = RefineryBuilder::new()
            .with_order_verification(true)
            .build()
            .unwrap()
            .refine(partitions, JoinReducer, &mut output)
            .unwrap();
        assert_eq!(summary.groups, 3);

        let mut written = BlockRecordReader::new(Cursor::new(output.into_inner()));
        let mut records = Vec::new();
        while let Some(record) = written.read_next().unwrap() {
            records.push(record.into_parts());
        }
        assert_eq!(
            records,
            vec![
                (Bytes::from("apple"), Bytes::from("1,3")),
                (Bytes::from("banana"), Bytes::from("4")),
                (Bytes::from("cherry"), Bytes::from("2")),
            ]
        );
    }
}
