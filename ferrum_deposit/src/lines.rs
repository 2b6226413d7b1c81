use crate::error::{FerrumDepositError, Result};
use crate::partition::PartitionReader;
use crate::record::Record;
use crate::sink::OutputSink;
use std::fmt::Display;
use std::io::{BufRead, Write};
use std::marker::PhantomData;
use std::str::FromStr;
use tracing::{debug, warn};

const SEPARATOR: char = '\t';

/// Blank lines are skipped; a line without a tab is a validation error.
pub struct LineRecordReader<R, K, V> {
    reader: R,
    line: String,
    line_number: u64,
    _record: PhantomData<fn() -> (K, V)>,
}

impl<R: BufRead, K, V> LineRecordReader<R, K, V> {
    pub fn new(reader: R) -> Self {
        LineRecordReader {
            reader,
            line: String::new(),
            line_number: 0,
            _record: PhantomData,
        }
    }
}

impl<R, K, V> PartitionReader<K, V> for LineRecordReader<R, K, V>
where
    R: BufRead,
    K: FromStr,
    V: FromStr,
    K::Err: Display,
    V::Err: Display,
{
    fn read_next(&mut self) -> Result<Option<Record<K, V>>> {
        loop {
            self.line.clear();
            let read = self.reader.read_line(&mut self.line).map_err(|err| {
                FerrumDepositError::ReadError(format!(
                    "line {}: {}",
                    self.line_number + 1,
                    err
                ))
            })?;
            if read == 0 {
                debug!("line partition exhausted after {} lines", self.line_number);
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }

            let (raw_key, raw_value) = line.split_once(SEPARATOR).ok_or_else(|| {
                warn!("line {} has no key/value separator", self.line_number);
                FerrumDepositError::DataValidationError(format!(
                    "line {}: missing key/value separator",
                    self.line_number
                ))
            })?;
            let key = raw_key.parse::<K>().map_err(|err| {
                FerrumDepositError::DataValidationError(format!(
                    "line {}: bad key {:?}: {}",
                    self.line_number, raw_key, err
                ))
            })?;
            let value = raw_value.parse::<V>().map_err(|err| {
                FerrumDepositError::DataValidationError(format!(
                    "line {}: bad value {:?}: {}",
                    self.line_number, raw_value, err
                ))
            })?;
            return Ok(Some(Record::new(key, value)));
        }
    }
}

pub struct LineRecordWriter<W: Write> {
    writer: W,
}

impl<W: Write> LineRecordWriter<W> {
    pub fn new(writer: W) -> Self {
        LineRecordWriter { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W, K, V> OutputSink<K, V> for LineRecordWriter<W>
where
    W: Write,
    K: Display,
    V: Display,
{
    fn write(&mut self, key: &K, value: &V) -> Result<()> {
        writeln!(self.writer, "{}{}{}", key, SEPARATOR, value)
            .map_err(|err| FerrumDepositError::WriteError(err.to_string()))
    }

    fn close(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|err| FerrumDepositError::WriteError(err.to_string()))
    }
}
