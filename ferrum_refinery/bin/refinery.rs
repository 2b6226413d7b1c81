use bytes::Bytes;
use chrono::Local;
use clap::{Parser, Subcommand};
use ferrum_deposit::block::{BlockRecordReader, BlockRecordWriter};
use ferrum_deposit::config::deposit_config::{DepositConfig, RecordFormat};
use ferrum_deposit::error::FerrumDepositError;
use ferrum_deposit::lines::{LineRecordReader, LineRecordWriter};
use ferrum_deposit::partition::PartitionReader;
use ferrum_deposit::record::Record;
use ferrum_deposit::sink::OutputSink;
use ferrum_refinery::api::reduce::{ReduceContext, Reducer};
use ferrum_refinery::config::refinery_config::RefineryConfig;
use ferrum_refinery::core::driver::{ReduceDriver, ReduceSummary};
use ferrum_refinery::core::grouped::GroupValues;
use ferrum_refinery::framework::errors::{FerrumRefineryError, Result};
use ferrum_refinery::framework::refinery::RefineryBuilder;
use std::fmt::Debug;
use std::fs::{self, File};
use std::hash::Hash;
use std::io::{BufReader, BufWriter, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sum the counts in the configured partitions into `<data.dir>/out/0`
    Reduce {
        #[arg(short, long, default_value = "config/refinery.xml")]
        config: String,
        #[arg(short, long, default_value = "config/deposit.xml")]
        deposit_config: String,
    },
    /// Print the resolved refinery configuration
    Inspect {
        #[arg(short, long, default_value = "config/refinery.xml")]
        config: String,
    },
}

/// Sums the counts of each key. With a side input the sum is added onto the
/// previous total for the key.
struct CountReducer {
    running_totals: bool,
}

impl<K> Reducer<K, u64, K, u64, u64> for CountReducer
where
    K: Hash + Eq + Clone + Debug,
{
    fn reduce(
        &mut self,
        key: &K,
        values: &mut GroupValues<'_, K, u64>,
        context: &mut ReduceContext<'_, K, u64, K, u64>,
    ) -> anyhow::Result<()> {
        let mut total: u64 = values.sum();
        if self.running_totals {
            let previous = context.side_state()?;
            total += *previous;
            *previous = total;
        }
        context.emit(key.clone(), total);
        Ok(())
    }
}

/// Block partitions carry each count as an 8-byte big-endian value.
struct BlockCounts<R: Read>(BlockRecordReader<R>);

impl<R: Read> PartitionReader<Bytes, u64> for BlockCounts<R> {
    fn read_next(&mut self) -> ferrum_deposit::error::Result<Option<Record<Bytes, u64>>> {
        let Some(record) = self.0.read_next()? else {
            return Ok(None);
        };
        let (key, value) = record.into_parts();
        let count: [u8; 8] = value[..].try_into().map_err(|_| {
            FerrumDepositError::DataValidationError(format!(
                "record {}: count is {} bytes, expected 8",
                self.0.records_read(),
                value.len()
            ))
        })?;
        Ok(Some(Record::new(key, u64::from_be_bytes(count))))
    }
}

struct BlockCountWriter<W: Write>(BlockRecordWriter<W>);

impl<W: Write> OutputSink<Bytes, u64> for BlockCountWriter<W> {
    fn write(&mut self, key: &Bytes, count: &u64) -> ferrum_deposit::error::Result<()> {
        OutputSink::<Bytes, [u8; 8]>::write(&mut self.0, key, &count.to_be_bytes())
    }

    fn close(&mut self) -> ferrum_deposit::error::Result<()> {
        OutputSink::<Bytes, [u8; 8]>::close(&mut self.0)
    }
}

fn open_partition(deposit: &DepositConfig, index: usize) -> Result<BufReader<File>> {
    let path = deposit.input_path(index);
    let file = File::open(&path).map_err(|err| {
        FerrumRefineryError::ReadFailure(format!("partition {}: {}: {}", index, path.display(), err))
    })?;
    Ok(BufReader::new(file))
}

fn create_output(deposit: &DepositConfig, channel: usize) -> Result<BufWriter<File>> {
    let path = deposit.output_path(channel);
    let created = match path.parent() {
        Some(dir) => fs::create_dir_all(dir).and_then(|_| File::create(&path)),
        None => File::create(&path),
    };
    created.map(BufWriter::new).map_err(|err| {
        FerrumRefineryError::WriteFailure(format!("output {}: {}", path.display(), err))
    })
}

fn reduce(
    config: RefineryConfig,
    deposit: DepositConfig,
    cancelled: Arc<AtomicBool>,
) -> Result<ReduceSummary> {
    match deposit.record_format()? {
        RecordFormat::Lines => reduce_counts(
            &config,
            &deposit,
            LineRecordReader::<_, String, u64>::new,
            LineRecordWriter::new(create_output(&deposit, 0)?),
            cancelled,
        ),
        RecordFormat::Block => reduce_counts(
            &config,
            &deposit,
            |input| BlockCounts(BlockRecordReader::new(input)),
            BlockCountWriter(BlockRecordWriter::new(create_output(&deposit, 0)?)),
            cancelled,
        ),
    }
}

fn reduce_counts<K, P, W>(
    config: &RefineryConfig,
    deposit: &DepositConfig,
    open: impl Fn(BufReader<File>) -> P,
    sink: W,
    cancelled: Arc<AtomicBool>,
) -> Result<ReduceSummary>
where
    K: Hash + Eq + Ord + Clone + Debug,
    P: PartitionReader<K, u64>,
    W: OutputSink<K, u64>,
{
    let readers = config
        .reduce_inputs()
        .map(|index| open_partition(deposit, index).map(&open))
        .collect::<Result<Vec<P>>>()?;

    let refinery = RefineryBuilder::<K, u64>::new()
        .with_config(config.clone())
        .with_combiner(|total: u64, count: u64| total + count)
        .build()?;
    info!(
        "refinery {} reducing {} {} partitions from {}",
        refinery.id,
        readers.len(),
        deposit.record_format,
        deposit.data_dir
    );

    let source = refinery.shuffle(readers)?;
    let reducer = CountReducer {
        running_totals: config.side_input,
    };

    let mut driver = ReduceDriver::new(source, reducer, sink).with_cancellation(cancelled);
    if let Some(index) = config.side_input_index() {
        driver = driver.with_side_input(open(open_partition(deposit, index)?))?;
    }
    if config.output_channels > 1 {
        driver = driver.with_summary_output(Box::new(create_output(deposit, 1)?));
    }

    driver.run()
}

#[tokio::main]
async fn main() -> Result<()> {
    // add logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let args = Cli::parse();

    let now = Local::now();
    println!("Time: {}", now.format("%Y-%m-%d %H:%M:%S"));

    match &args.command {
        Commands::Reduce {
            config,
            deposit_config,
        } => {
            let refinery_config = RefineryConfig::from_xml_file(config)?;
            let deposit_config = DepositConfig::from_xml_file(deposit_config)?;

            let cancelled = Arc::new(AtomicBool::new(false));
            let flag = cancelled.clone();

            // the reduce loop is synchronous, keep it off the runtime threads
            let mut invocation = tokio::task::spawn_blocking(move || {
                reduce(refinery_config, deposit_config, flag)
            });

            let summary = tokio::select! {
                joined = &mut invocation => joined??,
                _ = tokio::signal::ctrl_c() => {
                    warn!("interrupt received, cancelling reduce invocation");
                    cancelled.store(true, Ordering::SeqCst);
                    invocation.await??
                }
            };

            println!(
                "Reduced {} groups ({} values, {} records written), outcome: {}",
                summary.groups, summary.values_read, summary.records_written, summary.outcome
            );
            Ok(())
        }
        Commands::Inspect { config } => {
            let refinery_config = RefineryConfig::from_xml_file(config)?;
            println!("{:#?}", refinery_config);
            println!("shuffle mode: {:?}", refinery_config.shuffle_mode()?);
            println!("reduce inputs: {:?}", refinery_config.reduce_inputs());
            if let Some(index) = refinery_config.side_input_index() {
                println!("side input: partition {}", index);
            }
            Ok(())
        }
    }
}
