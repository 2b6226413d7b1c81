use crate::api::combine::Combiner;
use crate::api::ordering::KeyOrdering;
use crate::core::grouped::GroupedSource;
use crate::framework::errors::{FerrumRefineryError, Result};
use ferrum_deposit::partition::PartitionReader;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::{debug, info};

/// Folds records from unsorted partitions into one combined value per key,
/// then hands them out in key order.
pub struct PartialAggregationCollector<K, V, C, O> {
    // always `Some` between calls; taken only while combining in place
    entries: HashMap<K, Option<V>>,
    combiner: C,
    ordering: O,
    records_collected: u64,
}

impl<K, V, C, O> PartialAggregationCollector<K, V, C, O>
where
    K: Hash + Eq,
    C: Combiner<V>,
    O: KeyOrdering<K>,
{
    pub fn new(combiner: C, ordering: O) -> Self {
        PartialAggregationCollector {
            entries: HashMap::new(),
            combiner,
            ordering,
            records_collected: 0,
        }
    }

    pub fn collect(&mut self, key: K, value: V) {
        self.records_collected += 1;
        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(Some(value));
            }
            Entry::Occupied(slot) => {
                let stored = slot.into_mut();
                *stored = Some(match stored.take() {
                    Some(existing) => self.combiner.combine(existing, value),
                    None => value,
                });
            }
        }
    }

    pub fn collect_partition<R>(&mut self, mut reader: R) -> Result<u64>
    where
        R: PartitionReader<K, V>,
    {
        let mut count = 0;
        while let Some(record) = reader
            .read_next()
            .map_err(|err| FerrumRefineryError::ReadFailure(err.to_string()))?
        {
            self.collect(record.key, record.value);
            count += 1;
        }
        debug!("collected {} records from partition", count);
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records_collected(&self) -> u64 {
        self.records_collected
    }

    /// Keys that compare equal under the ordering are combined into the first
    /// of them.
    pub fn finish(self) -> CollectedGroups<K, V> {
        let PartialAggregationCollector {
            entries,
            combiner,
            ordering,
            records_collected,
        } = self;

        let mut sorted: Vec<(K, V)> = entries
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect();
        sorted.sort_by(|left, right| ordering.compare(&left.0, &right.0));

        let mut groups: Vec<(K, V)> = Vec::with_capacity(sorted.len());
        for (key, value) in sorted {
            match groups.pop() {
                Some((last_key, last_value)) if ordering.equal(&last_key, &key) => {
                    groups.push((last_key, combiner.combine(last_value, value)));
                }
                Some(last) => {
                    groups.push(last);
                    groups.push((key, value));
                }
                None => groups.push((key, value)),
            }
        }

        info!(
            "collector combined {} records into {} groups",
            records_collected,
            groups.len()
        );
        CollectedGroups::new(groups)
    }
}

pub struct CollectedGroups<K, V> {
    remaining: std::vec::IntoIter<(K, V)>,
    current: Option<(K, Option<V>)>,
    started: bool,
    len: usize,
}

impl<K, V> CollectedGroups<K, V> {
    fn new(groups: Vec<(K, V)>) -> Self {
        CollectedGroups {
            len: groups.len(),
            remaining: groups.into_iter(),
            current: None,
            started: false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<K, V> IntoIterator for CollectedGroups<K, V> {
    type Item = (K, V);
    type IntoIter = std::iter::Chain<std::option::IntoIter<(K, V)>, std::vec::IntoIter<(K, V)>>;

    fn into_iter(self) -> Self::IntoIter {
        let current = self
            .current
            .and_then(|(key, value)| value.map(|value| (key, value)));
        current.into_iter().chain(self.remaining)
    }
}

impl<K, V> GroupedSource<K, V> for CollectedGroups<K, V> {
    fn has_more_keys(&mut self) -> Result<bool> {
        if self.current.is_some() && !self.started {
            return Ok(true);
        }
        self.started = false;
        self.current = self
            .remaining
            .next()
            .map(|(key, value)| (key, Some(value)));
        Ok(self.current.is_some())
    }

    fn current_key(&self) -> Result<&K> {
        self.current.as_ref().map(|(key, _)| key).ok_or_else(|| {
            FerrumRefineryError::InvalidState(
                "no current key; call has_more_keys first".to_string(),
            )
        })
    }

    fn begin_group(&mut self) {
        if self.current.is_some() {
            self.started = true;
        }
    }

    fn next_value(&mut self) -> Result<Option<V>> {
        match self.current.as_mut() {
            Some((_, value)) => {
                self.started = true;
                Ok(value.take())
            }
            None => Err(FerrumRefineryError::InvalidState(
                "no current group to draw values from".to_string(),
            )),
        }
    }
}
