use crate::framework::errors::{FerrumRefineryError, Result};
use ferrum_deposit::partition::PartitionReader;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SideState<K, S> {
    entries: HashMap<K, S>,
}

impl<K, S> SideState<K, S>
where
    K: Hash + Eq + Debug,
{
    pub fn new() -> Self {
        SideState {
            entries: HashMap::new(),
        }
    }

    // a later record for the same key replaces the earlier one
    pub fn load<R>(mut reader: R) -> Result<Self>
    where
        R: PartitionReader<K, S>,
    {
        let mut entries = HashMap::new();
        while let Some(record) = reader.read_next().map_err(|err| {
            FerrumRefineryError::ReadFailure(format!("side input: {}", err))
        })? {
            debug!("loading side state for key {:?}", record.key);
            entries.insert(record.key, record.value);
        }
        info!("loaded side state for {} keys", entries.len());
        Ok(SideState { entries })
    }

    pub fn insert(&mut self, key: K, state: S) -> Option<S> {
        self.entries.insert(key, state)
    }

    pub fn get(&self, key: &K) -> Option<&S> {
        self.entries.get(key)
    }

    pub fn require(&self, key: &K) -> Result<&S> {
        self.entries
            .get(key)
            .ok_or_else(|| FerrumRefineryError::MissingSideState(format!("{:?}", key)))
    }

    pub fn require_mut(&mut self, key: &K) -> Result<&mut S> {
        self.entries
            .get_mut(key)
            .ok_or_else(|| FerrumRefineryError::MissingSideState(format!("{:?}", key)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, S> Default for SideState<K, S>
where
    K: Hash + Eq + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> FromIterator<(K, S)> for SideState<K, S>
where
    K: Hash + Eq + Debug,
{
    fn from_iter<I: IntoIterator<Item = (K, S)>>(iter: I) -> Self {
        SideState {
            entries: iter.into_iter().collect(),
        }
    }
}
