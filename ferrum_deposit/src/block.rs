//! `u32 key length | key | u32 value length | value`, lengths big-endian.

use crate::error::{FerrumDepositError, Result};
use crate::partition::PartitionReader;
use crate::record::Record;
use crate::sink::OutputSink;
use bytes::{BufMut, Bytes, BytesMut};
use std::io::{ErrorKind, Read, Write};
use tracing::{debug, error};

pub const DEFAULT_MAX_FIELD_LEN: u32 = 64 * 1024 * 1024;

pub struct BlockRecordReader<R: Read> {
    reader: R,
    records_read: u64,
    max_field_len: u32,
}

impl<R: Read> BlockRecordReader<R> {
    pub fn new(reader: R) -> Self {
        BlockRecordReader {
            reader,
            records_read: 0,
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }

    pub fn with_max_field_len(mut self, max_field_len: u32) -> Self {
        self.max_field_len = max_field_len;
        self
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    // false only on a clean record boundary
    fn fill_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => {
                    return Err(self.truncated("record header"));
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FerrumDepositError::ReadError(err.to_string())),
            }
        }
        Ok(true)
    }

    fn read_len(&mut self, field: &str) -> Result<usize> {
        let mut header = [0u8; 4];
        if !self.fill_or_eof(&mut header)? {
            return Err(self.truncated(field));
        }
        let len = u32::from_be_bytes(header);
        if len > self.max_field_len {
            return Err(FerrumDepositError::DataValidationError(format!(
                "record {}: {} length {} exceeds limit {}",
                self.records_read, field, len, self.max_field_len
            )));
        }
        Ok(len as usize)
    }

    fn read_field(&mut self, len: usize, field: &str) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(len);
        match self.reader.read_exact(&mut buf) {
            Ok(()) => Ok(buf.freeze()),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Err(self.truncated(field)),
            Err(err) => Err(FerrumDepositError::ReadError(err.to_string())),
        }
    }

    fn truncated(&self, field: &str) -> FerrumDepositError {
        error!("block partition truncated after {} records", self.records_read);
        FerrumDepositError::ReadError(format!(
            "record {}: truncated {}",
            self.records_read, field
        ))
    }
}

impl<R: Read> PartitionReader<Bytes, Bytes> for BlockRecordReader<R> {
    fn read_next(&mut self) -> Result<Option<Record<Bytes, Bytes>>> {
        let mut header = [0u8; 4];
        if !self.fill_or_eof(&mut header)? {
            debug!("block partition exhausted after {} records", self.records_read);
            return Ok(None);
        }
        let key_len = u32::from_be_bytes(header);
        if key_len > self.max_field_len {
            return Err(FerrumDepositError::DataValidationError(format!(
                "record {}: key length {} exceeds limit {}",
                self.records_read, key_len, self.max_field_len
            )));
        }
        let key = self.read_field(key_len as usize, "key")?;
        let value_len = self.read_len("value")?;
        let value = self.read_field(value_len, "value")?;

        self.records_read += 1;
        Ok(Some(Record::new(key, value)))
    }
}

pub struct BlockRecordWriter<W: Write> {
    writer: W,
    buffer: BytesMut,
}

impl<W: Write> BlockRecordWriter<W> {
    pub fn new(writer: W) -> Self {
        BlockRecordWriter {
            writer,
            buffer: BytesMut::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W, K, V> OutputSink<K, V> for BlockRecordWriter<W>
where
    W: Write,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    fn write(&mut self, key: &K, value: &V) -> Result<()> {
        let key = key.as_ref();
        let value = value.as_ref();
        let key_len = u32::try_from(key.len())
            .map_err(|_| FerrumDepositError::WriteError("key too large".to_string()))?;
        let value_len = u32::try_from(value.len())
            .map_err(|_| FerrumDepositError::WriteError("value too large".to_string()))?;

        self.buffer.clear();
        self.buffer.reserve(8 + key.len() + value.len());
        self.buffer.put_u32(key_len);
        self.buffer.put_slice(key);
        self.buffer.put_u32(value_len);
        self.buffer.put_slice(value);

        self.writer
            .write_all(&self.buffer)
            .map_err(|err| FerrumDepositError::WriteError(err.to_string()))
    }

    fn close(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|err| FerrumDepositError::WriteError(err.to_string()))
    }
}
