use std::time::Duration;

use thiserror::Error;

use crate::nl::command::{CommandKind, Param};
use crate::service::ServiceError;

#[derive(Error, Debug)]
pub enum TalkError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Missing parameter {param} for {kind}")]
    MissingParameter { kind: CommandKind, param: Param },

    #[error("Board service error: {0}")]
    Service(#[from] ServiceError),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TalkError>;
