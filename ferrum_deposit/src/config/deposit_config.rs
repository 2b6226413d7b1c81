use crate::error::FerrumDepositError;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Lines,
    Block,
}

impl FromStr for RecordFormat {
    type Err = FerrumDepositError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "lines" => Ok(RecordFormat::Lines),
            "block" => Ok(RecordFormat::Block),
            other => Err(FerrumDepositError::ConfigError(format!(
                "unknown record format: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositConfig {
    #[serde(rename = "data.dir")]
    pub data_dir: String,

    #[serde(rename = "record.format", default = "default_record_format")]
    pub record_format: String,
}

fn default_record_format() -> String {
    "lines".to_string()
}

impl DepositConfig {
    pub fn from_xml_file(file_path: &str) -> Result<Self, FerrumDepositError> {
        let xml_str = std::fs::read_to_string(file_path)
            .map_err(|_| FerrumDepositError::ConfigError("Xml config error".to_string()))?;
        Self::from_xml_str(&xml_str)
    }

    pub fn from_xml_str(xml_str: &str) -> Result<Self, FerrumDepositError> {
        let config = serde_xml_rs::from_str(xml_str)?;
        Ok(config)
    }

    pub fn record_format(&self) -> Result<RecordFormat, FerrumDepositError> {
        self.record_format.parse()
    }

    pub fn input_path(&self, index: usize) -> PathBuf {
        PathBuf::from(&self.data_dir).join("in").join(index.to_string())
    }

    pub fn output_path(&self, index: usize) -> PathBuf {
        PathBuf::from(&self.data_dir).join("out").join(index.to_string())
    }
}
