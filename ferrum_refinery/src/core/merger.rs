use crate::api::ordering::KeyOrdering;
use crate::core::grouped::GroupedSource;
use crate::framework::errors::{FerrumRefineryError, Result};
use ferrum_deposit::partition::PartitionReader;
use ferrum_deposit::record::Record;
use std::cmp::Ordering;
use std::fmt::Debug;
use tracing::{debug, error};

enum Cursor<K> {
    Unpositioned,
    Positioned(K),
    InGroup(K),
    Exhausted,
    Poisoned,
}

/// Values of a group are drawn from readers in ascending index order, each
/// reader drained of the key before the next is visited.
pub struct SortedPartitionMerger<K, V, R, O> {
    readers: Vec<R>,
    heads: Vec<Option<Record<K, V>>>,
    ordering: O,
    cursor: Cursor<K>,
    verify_order: bool,
    records_merged: u64,
}

impl<K, V, R, O> SortedPartitionMerger<K, V, R, O>
where
    K: Clone + Debug,
    R: PartitionReader<K, V>,
    O: KeyOrdering<K>,
{
    pub fn new(readers: Vec<R>, ordering: O) -> Self {
        SortedPartitionMerger {
            heads: Vec::with_capacity(readers.len()),
            readers,
            ordering,
            cursor: Cursor::Unpositioned,
            verify_order: false,
            records_merged: 0,
        }
    }

    pub fn with_order_verification(mut self, verify_order: bool) -> Self {
        self.verify_order = verify_order;
        self
    }

    pub fn records_merged(&self) -> u64 {
        self.records_merged
    }

    fn prime(&mut self) -> Result<()> {
        debug!("priming merger over {} partitions", self.readers.len());
        for index in 0..self.readers.len() {
            let head = self.read_from(index)?;
            self.heads.push(head);
        }
        Ok(())
    }

    fn read_from(&mut self, index: usize) -> Result<Option<Record<K, V>>> {
        self.readers[index].read_next().map_err(|err| {
            error!("partition {} failed: {}", index, err);
            FerrumRefineryError::ReadFailure(format!("partition {}: {}", index, err))
        })
    }

    // ties resolve to the lowest reader index
    fn min_key(&self) -> Option<&K> {
        let mut min: Option<&K> = None;
        for record in self.heads.iter().flatten() {
            match min {
                Some(key) if self.ordering.compare(&record.key, key) != Ordering::Less => {}
                _ => min = Some(&record.key),
            }
        }
        min
    }

    fn position(&mut self) -> bool {
        match self.min_key().cloned() {
            Some(key) => {
                self.cursor = Cursor::Positioned(key);
                true
            }
            None => {
                debug!("merger exhausted after {} records", self.records_merged);
                self.cursor = Cursor::Exhausted;
                false
            }
        }
    }

    fn take_matching(&mut self, key: &K) -> Result<Option<V>> {
        let index = self.heads.iter().position(|head| {
            head.as_ref()
                .is_some_and(|record| self.ordering.equal(&record.key, key))
        });
        let Some(index) = index else {
            return Ok(None);
        };

        let taken = self.heads[index].take();
        let next = self.read_from(index)?;
        if self.verify_order {
            if let (Some(previous), Some(next)) = (&taken, &next) {
                if self.ordering.compare(&next.key, &previous.key) == Ordering::Less {
                    return Err(FerrumRefineryError::OrderingViolation(format!(
                        "partition {}: key {:?} follows {:?}",
                        index, next.key, previous.key
                    )));
                }
            }
        }
        self.heads[index] = next;
        self.records_merged += 1;
        Ok(taken.map(|record| record.value))
    }

    fn skip_group(&mut self, key: &K) -> Result<()> {
        while self.take_matching(key)?.is_some() {}
        Ok(())
    }

    fn poison<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.cursor = Cursor::Poisoned;
        }
        result
    }
}

impl<K, V, R, O> GroupedSource<K, V> for SortedPartitionMerger<K, V, R, O>
where
    K: Clone + Debug,
    R: PartitionReader<K, V>,
    O: KeyOrdering<K>,
{
    fn has_more_keys(&mut self) -> Result<bool> {
        match std::mem::replace(&mut self.cursor, Cursor::Poisoned) {
            Cursor::Unpositioned => {
                let primed = self.prime();
                self.poison(primed)?;
                Ok(self.position())
            }
            Cursor::Positioned(key) => {
                self.cursor = Cursor::Positioned(key);
                Ok(true)
            }
            Cursor::InGroup(key) => {
                let skipped = self.skip_group(&key);
                self.poison(skipped)?;
                Ok(self.position())
            }
            Cursor::Exhausted => {
                self.cursor = Cursor::Exhausted;
                Ok(false)
            }
            Cursor::Poisoned => Err(poisoned()),
        }
    }

    fn current_key(&self) -> Result<&K> {
        match &self.cursor {
            Cursor::Positioned(key) | Cursor::InGroup(key) => Ok(key),
            Cursor::Poisoned => Err(poisoned()),
            _ => Err(FerrumRefineryError::InvalidState(
                "no current key; call has_more_keys first".to_string(),
            )),
        }
    }

    fn begin_group(&mut self) {
        self.cursor = match std::mem::replace(&mut self.cursor, Cursor::Poisoned) {
            Cursor::Positioned(key) => Cursor::InGroup(key),
            other => other,
        };
    }

    fn next_value(&mut self) -> Result<Option<V>> {
        let key = match std::mem::replace(&mut self.cursor, Cursor::Poisoned) {
            Cursor::Positioned(key) | Cursor::InGroup(key) => key,
            Cursor::Poisoned => return Err(poisoned()),
            other => {
                self.cursor = other;
                return Err(FerrumRefineryError::InvalidState(
                    "no current group to draw values from".to_string(),
                ));
            }
        };
        let taken = self.take_matching(&key);
        let value = self.poison(taken)?;
        self.cursor = Cursor::InGroup(key);
        Ok(value)
    }
}

fn poisoned() -> FerrumRefineryError {
    FerrumRefineryError::InvalidState("merger used after a read failure".to_string())
}
