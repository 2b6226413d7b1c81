use crate::error::Result;

/// Nothing may be written after `close`.
pub trait OutputSink<K, V> {
    fn write(&mut self, key: &K, value: &V) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

impl<K, V, W> OutputSink<K, V> for Box<W>
where
    W: OutputSink<K, V> + ?Sized,
{
    fn write(&mut self, key: &K, value: &V) -> Result<()> {
        (**self).write(key, value)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<K, V, W> OutputSink<K, V> for &mut W
where
    W: OutputSink<K, V> + ?Sized,
{
    fn write(&mut self, key: &K, value: &V) -> Result<()> {
        (**self).write(key, value)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySink<K, V> {
    records: Vec<(K, V)>,
    closed: bool,
}

impl<K, V> MemorySink<K, V> {
    pub fn new() -> Self {
        MemorySink {
            records: Vec::new(),
            closed: false,
        }
    }

    pub fn records(&self) -> &[(K, V)] {
        &self.records
    }

    pub fn into_records(self) -> Vec<(K, V)> {
        self.records
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<K: Clone, V: Clone> OutputSink<K, V> for MemorySink<K, V> {
    fn write(&mut self, key: &K, value: &V) -> Result<()> {
        if self.closed {
            return Err(crate::error::FerrumDepositError::WriteError(
                "sink already closed".to_string(),
            ));
        }
        self.records.push((key.clone(), value.clone()));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
