//! Error types shared by every stageport crate

use thiserror::Error;

/// Result type alias for stageport operations
pub type Result<T> = std::result::Result<T, StageportError>;

/// Low-level failures that are not specific to one layer
#[derive(Error, Debug)]
pub enum StageportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl StageportError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
