use crate::error::Result;
use crate::record::Record;
use std::collections::VecDeque;

/// `read_next` returns `Ok(None)` once the partition is exhausted and keeps
/// returning it afterwards.
pub trait PartitionReader<K, V> {
    fn read_next(&mut self) -> Result<Option<Record<K, V>>>;
}

impl<K, V, R> PartitionReader<K, V> for Box<R>
where
    R: PartitionReader<K, V> + ?Sized,
{
    fn read_next(&mut self) -> Result<Option<Record<K, V>>> {
        (**self).read_next()
    }
}

impl<K, V, R> PartitionReader<K, V> for &mut R
where
    R: PartitionReader<K, V> + ?Sized,
{
    fn read_next(&mut self) -> Result<Option<Record<K, V>>> {
        (**self).read_next()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPartition<K, V> {
    records: VecDeque<Record<K, V>>,
}

impl<K, V> MemoryPartition<K, V> {
    pub fn new() -> Self {
        MemoryPartition {
            records: VecDeque::new(),
        }
    }

    pub fn push(&mut self, key: K, value: V) {
        self.records.push_back(Record::new(key, value));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for MemoryPartition<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MemoryPartition {
            records: iter.into_iter().map(Record::from).collect(),
        }
    }
}

impl<K, V> From<Vec<(K, V)>> for MemoryPartition<K, V> {
    fn from(records: Vec<(K, V)>) -> Self {
        records.into_iter().collect()
    }
}

impl<K, V> PartitionReader<K, V> for MemoryPartition<K, V> {
    fn read_next(&mut self) -> Result<Option<Record<K, V>>> {
        Ok(self.records.pop_front())
    }
}
