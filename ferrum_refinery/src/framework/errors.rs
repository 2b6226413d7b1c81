use ferrum_deposit::error::FerrumDepositError;
use serde_xml_rs::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq)]
pub enum FerrumRefineryError {
    ConfigError(String),
    ReadFailure(String),
    OrderingViolation(String),
    MissingSideState(String),
    ReduceFailure(String),
    WriteFailure(String),
    InvalidState(String),
    TaskError(String),
    Cancelled,
}

impl Display for FerrumRefineryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FerrumRefineryError::ConfigError(msg) => write!(f, "config error: {}", msg),
            FerrumRefineryError::ReadFailure(msg) => write!(f, "read failure: {}", msg),
            FerrumRefineryError::OrderingViolation(msg) => {
                write!(f, "ordering violation: {}", msg)
            }
            FerrumRefineryError::MissingSideState(key) => {
                write!(f, "missing side state for key {}", key)
            }
            FerrumRefineryError::ReduceFailure(msg) => write!(f, "reduce failure: {}", msg),
            FerrumRefineryError::WriteFailure(msg) => write!(f, "write failure: {}", msg),
            FerrumRefineryError::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            FerrumRefineryError::TaskError(msg) => write!(f, "task error: {}", msg),
            FerrumRefineryError::Cancelled => write!(f, "invocation cancelled"),
        }
    }
}

impl std::error::Error for FerrumRefineryError {}

impl From<Error> for FerrumRefineryError {
    fn from(value: Error) -> Self {
        FerrumRefineryError::ConfigError(value.to_string())
    }
}

// partition and sink errors are wrapped at the call site
impl From<FerrumDepositError> for FerrumRefineryError {
    fn from(value: FerrumDepositError) -> Self {
        match value {
            FerrumDepositError::ConfigError(msg) => FerrumRefineryError::ConfigError(msg),
            FerrumDepositError::WriteError(msg) => FerrumRefineryError::WriteFailure(msg),
            other => FerrumRefineryError::ReadFailure(other.to_string()),
        }
    }
}

impl From<std::io::Error> for FerrumRefineryError {
    fn from(value: std::io::Error) -> Self {
        FerrumRefineryError::ReadFailure(value.to_string())
    }
}

impl From<tokio::task::JoinError> for FerrumRefineryError {
    fn from(value: tokio::task::JoinError) -> Self {
        FerrumRefineryError::TaskError(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FerrumRefineryError>;
