use crate::framework::errors::FerrumRefineryError;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleMode {
    Sorted,
    Combine,
}

impl FromStr for ShuffleMode {
    type Err = FerrumRefineryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sorted" => Ok(ShuffleMode::Sorted),
            "combine" => Ok(ShuffleMode::Combine),
            other => Err(FerrumRefineryError::ConfigError(format!(
                "unknown shuffle mode: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RefineryConfig {
    #[serde(rename = "data.dir")]
    pub data_dir: String,

    #[serde(rename = "input.partitions")]
    pub input_partitions: usize,

    #[serde(rename = "output.channels", default = "default_output_channels")]
    pub output_channels: usize,

    #[serde(rename = "shuffle.mode", default = "default_shuffle_mode")]
    pub shuffle_mode: String,

    #[serde(rename = "merge.verify.order", default)]
    pub merge_verify_order: bool,

    // the last input partition holds side state
    #[serde(rename = "side.input", default)]
    pub side_input: bool,
}

fn default_output_channels() -> usize {
    1
}

fn default_shuffle_mode() -> String {
    "sorted".to_string()
}

impl RefineryConfig {
    pub fn from_xml_file(file_path: &str) -> Result<Self, FerrumRefineryError> {
        let xml_str = std::fs::read_to_string(file_path)
            .map_err(|_| FerrumRefineryError::ConfigError("Xml config error".to_string()))?;
        Self::from_xml_str(&xml_str)
    }

    pub fn from_xml_str(xml_str: &str) -> Result<Self, FerrumRefineryError> {
        let config: RefineryConfig = serde_xml_rs::from_str(xml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn shuffle_mode(&self) -> Result<ShuffleMode, FerrumRefineryError> {
        self.shuffle_mode.parse()
    }

    pub fn reduce_inputs(&self) -> std::ops::Range<usize> {
        match self.side_input {
            true => 0..self.input_partitions.saturating_sub(1),
            false => 0..self.input_partitions,
        }
    }

    pub fn side_input_index(&self) -> Option<usize> {
        match self.side_input {
            true => self.input_partitions.checked_sub(1),
            false => None,
        }
    }

    fn validate(&self) -> Result<(), FerrumRefineryError> {
        self.shuffle_mode()?;
        if self.side_input && self.input_partitions == 0 {
            return Err(FerrumRefineryError::ConfigError(
                "side.input requires at least one input partition".to_string(),
            ));
        }
        if self.output_channels == 0 {
            return Err(FerrumRefineryError::ConfigError(
                "output.channels must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn parses_full_config() {
        let config = RefineryConfig::from_xml_str(
            r#"<refinery>
                <data.dir>/var/ferrum</data.dir>
                <input.partitions>3</input.partitions>
                <output.channels>2</output.channels>
                <shuffle.mode>combine</shuffle.mode>
                <merge.verify.order>true</merge.verify.order>
                <side.input>true</side.input>
            </refinery>"#,
        )
        .unwrap();

        assert_eq!(config.shuffle_mode(), Ok(ShuffleMode::Combine));
        assert!(config.merge_verify_order);
        assert_eq!(config.reduce_inputs(), 0..2);
        assert_eq!(config.side_input_index(), Some(2));
        assert_eq!(config.output_channels, 2);
    }

    #[test]
    fn optional_fields_have_defaults() {
        let config = RefineryConfig::from_xml_str(
            "<refinery><data.dir>data</data.dir><input.partitions>4</input.partitions></refinery>",
        )
        .unwrap();

        assert_eq!(config.shuffle_mode(), Ok(ShuffleMode::Sorted));
        assert!(!config.merge_verify_order);
        assert_eq!(config.reduce_inputs(), 0..4);
        assert_eq!(config.side_input_index(), None);
        assert_eq!(config.output_channels, 1);
    }

    #[test]
    fn unknown_shuffle_mode_is_rejected() {
        assert_err!(RefineryConfig::from_xml_str(
            "<refinery><data.dir>d</data.dir><input.partitions>1</input.partitions>\
             <shuffle.mode>hash</shuffle.mode></refinery>",
        ));
    }

    #[test]
    fn side_input_needs_a_partition() {
        assert_eq!(
            RefineryConfig::from_xml_str(
                "<refinery><data.dir>d</data.dir><input.partitions>0</input.partitions>\
                 <side.input>true</side.input></refinery>",
            )
            .map(|_| ()),
            Err(FerrumRefineryError::ConfigError(
                "side.input requires at least one input partition".to_string()
            ))
        );
    }
}
