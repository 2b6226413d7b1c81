use crate::framework::errors::{FerrumRefineryError, Result};

/// `has_more_keys` skips what is left of a started group and is idempotent
/// until the current group is started by `begin_group` or `next_value`.
pub trait GroupedSource<K, V> {
    fn has_more_keys(&mut self) -> Result<bool>;

    fn current_key(&self) -> Result<&K>;

    fn begin_group(&mut self);

    fn next_value(&mut self) -> Result<Option<V>>;

    fn values_for_current_key(&mut self) -> GroupValues<'_, K, V>
    where
        Self: Sized,
    {
        self.begin_group();
        GroupValues::new(self)
    }
}

impl<K, V, S> GroupedSource<K, V> for Box<S>
where
    S: GroupedSource<K, V> + ?Sized,
{
    fn has_more_keys(&mut self) -> Result<bool> {
        (**self).has_more_keys()
    }

    fn current_key(&self) -> Result<&K> {
        (**self).current_key()
    }

    fn begin_group(&mut self) {
        (**self).begin_group()
    }

    fn next_value(&mut self) -> Result<Option<V>> {
        (**self).next_value()
    }
}

/// Stops at the first read error and keeps it for `take_error`.
pub struct GroupValues<'a, K, V> {
    source: &'a mut dyn GroupedSource<K, V>,
    error: Option<FerrumRefineryError>,
    consumed: u64,
}

impl<'a, K, V> GroupValues<'a, K, V> {
    pub fn new(source: &'a mut dyn GroupedSource<K, V>) -> Self {
        GroupValues {
            source,
            error: None,
            consumed: 0,
        }
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn take_error(&mut self) -> Option<FerrumRefineryError> {
        self.error.take()
    }
}

impl<'a, K, V> Iterator for GroupValues<'a, K, V> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        if self.error.is_some() {
            return None;
        }
        match self.source.next_value() {
            Ok(Some(value)) => {
                self.consumed += 1;
                Some(value)
            }
            Ok(None) => None,
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }
}
