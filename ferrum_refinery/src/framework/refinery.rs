use crate::api::combine::{Combiner, NoCombiner};
use crate::api::ordering::{KeyOrdering, NaturalOrdering};
use crate::api::reduce::Reducer;
use crate::config::refinery_config::{RefineryConfig, ShuffleMode};
use crate::core::collector::{CollectedGroups, PartialAggregationCollector};
use crate::core::driver::{ReduceDriver, ReduceSummary};
use crate::core::grouped::GroupedSource;
use crate::core::merger::SortedPartitionMerger;
use crate::framework::errors::{FerrumRefineryError, Result};
use ferrum_deposit::partition::PartitionReader;
use ferrum_deposit::sink::OutputSink;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use tracing::info;
use uuid::Uuid;

pub enum ShuffleSource<K, V, R, O> {
    Sorted(SortedPartitionMerger<K, V, R, O>),
    Combined(CollectedGroups<K, V>),
}

impl<K, V, R, O> GroupedSource<K, V> for ShuffleSource<K, V, R, O>
where
    K: Clone + Debug,
    R: PartitionReader<K, V>,
    O: KeyOrdering<K>,
{
    fn has_more_keys(&mut self) -> Result<bool> {
        match self {
            ShuffleSource::Sorted(merger) => merger.has_more_keys(),
            ShuffleSource::Combined(groups) => groups.has_more_keys(),
        }
    }

    fn current_key(&self) -> Result<&K> {
        match self {
            ShuffleSource::Sorted(merger) => merger.current_key(),
            ShuffleSource::Combined(groups) => groups.current_key(),
        }
    }

    fn begin_group(&mut self) {
        match self {
            ShuffleSource::Sorted(merger) => merger.begin_group(),
            ShuffleSource::Combined(groups) => groups.begin_group(),
        }
    }

    fn next_value(&mut self) -> Result<Option<V>> {
        match self {
            ShuffleSource::Sorted(merger) => merger.next_value(),
            ShuffleSource::Combined(groups) => groups.next_value(),
        }
    }
}

pub struct Refinery<K, V, O = NaturalOrdering, C = NoCombiner> {
    pub id: Uuid,
    pub shuffle_mode: ShuffleMode,
    pub verify_order: bool,
    ordering: O,
    combiner: Option<C>,
    _records: PhantomData<fn() -> (K, V)>,
}

impl<K, V, O, C> Refinery<K, V, O, C>
where
    K: Hash + Eq + Clone + Debug,
    O: KeyOrdering<K>,
    C: Combiner<V>,
{
    /// In combine mode every partition is drained before this returns.
    pub fn shuffle<R>(self, readers: Vec<R>) -> Result<ShuffleSource<K, V, R, O>>
    where
        R: PartitionReader<K, V>,
    {
        info!(
            "refinery {}: shuffling {} partitions in {:?} mode",
            self.id,
            readers.len(),
            self.shuffle_mode
        );
        match self.shuffle_mode {
            ShuffleMode::Sorted => Ok(ShuffleSource::Sorted(
                SortedPartitionMerger::new(readers, self.ordering)
                    .with_order_verification(self.verify_order),
            )),
            ShuffleMode::Combine => {
                let combiner = self.combiner.ok_or_else(missing_combiner)?;
                let mut collector = PartialAggregationCollector::new(combiner, self.ordering);
                for (index, reader) in readers.into_iter().enumerate() {
                    collector
                        .collect_partition(reader)
                        .map_err(|err| match err {
                            FerrumRefineryError::ReadFailure(msg) => {
                                FerrumRefineryError::ReadFailure(format!(
                                    "partition {}: {}",
                                    index, msg
                                ))
                            }
                            other => other,
                        })?;
                }
                Ok(ShuffleSource::Combined(collector.finish()))
            }
        }
    }

    pub fn refine<R, Red, FK, FV, W>(
        self,
        readers: Vec<R>,
        reducer: Red,
        sink: W,
    ) -> Result<ReduceSummary>
    where
        R: PartitionReader<K, V>,
        Red: Reducer<K, V, FK, FV>,
        W: OutputSink<FK, FV>,
    {
        let source = self.shuffle(readers)?;
        ReduceDriver::new(source, reducer, sink).run()
    }
}

pub struct RefineryBuilder<K, V, O = NaturalOrdering, C = NoCombiner> {
    config: Option<RefineryConfig>,
    shuffle_mode: Option<ShuffleMode>,
    verify_order: Option<bool>,
    ordering: O,
    combiner: Option<C>,
    _records: PhantomData<fn() -> (K, V)>,
}

impl<K, V> RefineryBuilder<K, V> {
    pub fn new() -> Self {
        RefineryBuilder {
            config: None,
            shuffle_mode: None,
            verify_order: None,
            ordering: NaturalOrdering,
            combiner: None,
            _records: PhantomData,
        }
    }
}

impl<K, V> Default for RefineryBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, O, C> RefineryBuilder<K, V, O, C> {
    // explicit with_* calls win over the config
    pub fn with_config(mut self, config: RefineryConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_shuffle_mode(mut self, shuffle_mode: ShuffleMode) -> Self {
        self.shuffle_mode = Some(shuffle_mode);
        self
    }

    pub fn with_order_verification(mut self, verify_order: bool) -> Self {
        self.verify_order = Some(verify_order);
        self
    }

    pub fn with_ordering<O2>(self, ordering: O2) -> RefineryBuilder<K, V, O2, C> {
        RefineryBuilder {
            config: self.config,
            shuffle_mode: self.shuffle_mode,
            verify_order: self.verify_order,
            ordering,
            combiner: self.combiner,
            _records: PhantomData,
        }
    }

    pub fn with_combiner<C2>(self, combiner: C2) -> RefineryBuilder<K, V, O, C2> {
        RefineryBuilder {
            config: self.config,
            shuffle_mode: self.shuffle_mode,
            verify_order: self.verify_order,
            ordering: self.ordering,
            combiner: Some(combiner),
            _records: PhantomData,
        }
    }

    pub fn build(self) -> Result<Refinery<K, V, O, C>> {
        let shuffle_mode = match (self.shuffle_mode, &self.config) {
            (Some(mode), _) => mode,
            (None, Some(config)) => config.shuffle_mode()?,
            (None, None) => ShuffleMode::Sorted,
        };
        let verify_order = self
            .verify_order
            .or(self.config.as_ref().map(|config| config.merge_verify_order))
            .unwrap_or(false);

        if shuffle_mode == ShuffleMode::Combine && self.combiner.is_none() {
            return Err(missing_combiner());
        }

        Ok(Refinery {
            id: Uuid::new_v4(),
            shuffle_mode,
            verify_order,
            ordering: self.ordering,
            combiner: self.combiner,
            _records: PhantomData,
        })
    }
}

fn missing_combiner() -> FerrumRefineryError {
    FerrumRefineryError::ConfigError("combine mode requires a combiner".to_string())
}
