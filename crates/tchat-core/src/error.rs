//! Error types for tchat-core

use thiserror::Error;

/// Result type alias using tchat-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can end a chat turn
#[derive(Error, Debug)]
pub enum Error {
    /// The turn was interrupted by the user. Not a failure.
    #[error("Generation cancelled")]
    Cancelled,

    /// An error from the model server
    #[error(transparent)]
    Backend(#[from] tchat_ai::Error),

    /// Missing or invalid settings, detected before anything is sent
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The output sink refused a chunk
    #[error("Output error: {0}")]
    Sink(#[source] std::io::Error),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Cancelled => "cancelled",
            Error::Backend(_) => "backend",
            Error::Configuration(_) => "configuration",
            Error::Sink(_) => "sink",
        }
    }
}
