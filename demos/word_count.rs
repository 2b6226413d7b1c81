use ferrum_deposit::partition::MemoryPartition;
use ferrum_deposit::sink::MemorySink;
use ferrum_refinery::api::reduce::{ReduceContext, Reducer};
use ferrum_refinery::config::refinery_config::ShuffleMode;
use ferrum_refinery::core::grouped::GroupValues;
use ferrum_refinery::framework::refinery::RefineryBuilder;

/// Turns one upstream split into a partition of `(word, 1)` records.
fn words(text: &str) -> MemoryPartition<String, u32> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .map(|word| (word, 1))
        .collect()
}

struct WordCountReducer;

impl Reducer<String, u32, String, u32> for WordCountReducer {
    fn reduce(
        &mut self,
        key: &String,
        values: &mut GroupValues<'_, String, u32>,
        context: &mut ReduceContext<'_, String, (), String, u32>,
    ) -> anyhow::Result<()> {
        context.emit(key.clone(), values.sum());
        Ok(())
    }
}

fn main() {
    // partitions arrive unsorted, so pre-aggregate them in memory
    let partitions = vec![
        words("the quick brown fox"),
        words("jumps over the lazy dog."),
        words("The dog sleeps"),
    ];

    // create a refinery
    let refinery = RefineryBuilder::new()
        .with_shuffle_mode(ShuffleMode::Combine)
        .with_combiner(|total: u32, count: u32| total + count)
        .build()
        .unwrap();

    let mut counts = MemorySink::new();
    let summary = refinery
        .refine(partitions, WordCountReducer, &mut counts)
        .unwrap();

    for (word, count) in counts.records() {
        println!("{} {}", word, count);
    }
    println!("{} distinct words", summary.groups);
}
