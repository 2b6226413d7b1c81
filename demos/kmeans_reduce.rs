use ferrum_deposit::partition::MemoryPartition;
use ferrum_deposit::sink::MemorySink;
use ferrum_refinery::api::reduce::{ReduceContext, Reducer};
use ferrum_refinery::config::refinery_config::ShuffleMode;
use ferrum_refinery::core::driver::ReduceDriver;
use ferrum_refinery::core::grouped::GroupValues;
use ferrum_refinery::core::side_state::SideState;
use ferrum_refinery::framework::refinery::RefineryBuilder;

type Point = (f64, f64);

/// Coordinate sums of the points assigned to a cluster, and how many there were.
type PointSum = (f64, f64, u64);

const TOLERANCE: f64 = 0.001;
const MAX_ROUNDS: usize = 20;

fn add_points(left: PointSum, right: PointSum) -> PointSum {
    (left.0 + right.0, left.1 + right.1, left.2 + right.2)
}

fn distance(a: Point, b: Point) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Moves every centroid to the mean of its points. A round has converged once
/// no centroid moved by more than `TOLERANCE`.
struct CentroidReducer;

impl Reducer<usize, PointSum, usize, Point, Point> for CentroidReducer {
    fn reduce(
        &mut self,
        key: &usize,
        values: &mut GroupValues<'_, usize, PointSum>,
        context: &mut ReduceContext<'_, usize, Point, usize, Point>,
    ) -> anyhow::Result<()> {
        let (x, y, count) = values.fold((0.0, 0.0, 0), add_points);
        let mean = (x / count as f64, y / count as f64);

        let centroid = context.side_state()?;
        let moved = distance(*centroid, mean);
        *centroid = mean;

        context.report_outcome(moved <= TOLERANCE);
        context.emit(*key, mean);
        Ok(())
    }
}

/// The map side of a round: every point goes to its nearest centroid.
fn assign(points: &[Point], centroids: &[(usize, Point)]) -> MemoryPartition<usize, PointSum> {
    let mut partition = MemoryPartition::new();
    for point in points {
        let nearest = centroids
            .iter()
            .min_by(|a, b| distance(a.1, *point).total_cmp(&distance(b.1, *point)))
            .map(|(cluster, _)| *cluster)
            .unwrap();
        partition.push(nearest, (point.0, point.1, 1));
    }
    partition
}

fn main() {
    let splits: Vec<Vec<Point>> = vec![
        vec![(1.0, 1.0), (1.5, 2.0), (8.0, 8.0)],
        vec![(0.5, 1.0), (9.0, 8.5), (8.5, 9.5)],
        vec![(1.0, 0.5), (9.5, 9.0)],
    ];
    let mut centroids: Vec<(usize, Point)> = vec![(0, (0.0, 0.0)), (1, (5.0, 5.0))];

    for round in 1..=MAX_ROUNDS {
        let partitions = splits
            .iter()
            .map(|points| assign(points, &centroids))
            .collect();

        let source = RefineryBuilder::new()
            .with_shuffle_mode(ShuffleMode::Combine)
            .with_combiner(add_points)
            .build()
            .unwrap()
            .shuffle(partitions)
            .unwrap();

        let side_state: SideState<usize, Point> = centroids.iter().copied().collect();
        let mut sink = MemorySink::new();
        let summary = ReduceDriver::new(source, CentroidReducer, &mut sink)
            .with_side_state(side_state)
            .run()
            .unwrap();

        centroids = sink.into_records();
        println!("round {}: {:?}", round, centroids);
        if summary.outcome {
            println!("converged after {} rounds", round);
            break;
        }
    }
}
