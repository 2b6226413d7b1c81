use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq)]
pub enum FerrumDepositError {
    ConfigError(String),
    IOError(String),
    ReadError(String),
    WriteError(String),
    DataValidationError(String),
}

impl Display for FerrumDepositError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FerrumDepositError::ConfigError(msg) => write!(f, "config error: {}", msg),
            FerrumDepositError::IOError(msg) => write!(f, "io error: {}", msg),
            FerrumDepositError::ReadError(msg) => write!(f, "read error: {}", msg),
            FerrumDepositError::WriteError(msg) => write!(f, "write error: {}", msg),
            FerrumDepositError::DataValidationError(msg) => {
                write!(f, "data validation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for FerrumDepositError {}

impl From<std::io::Error> for FerrumDepositError {
    fn from(error: std::io::Error) -> Self {
        FerrumDepositError::IOError(error.to_string())
    }
}

impl From<serde_xml_rs::Error> for FerrumDepositError {
    fn from(error: serde_xml_rs::Error) -> Self {
        FerrumDepositError::ConfigError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FerrumDepositError>;
