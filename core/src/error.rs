//! Error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
///
/// A non-zero exit from a remote command is not an error; it comes back
/// as a [`crate::CommandOutcome`] and the caller decides what it means.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Raised by [`crate::check_status`]; the binary exits with `code`.
    #[error("Fatal: {message} ({code})")]
    Fatal { code: i32, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Process exit code this error should terminate the run with
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Fatal { code, .. } => *code,
            _ => 1,
        }
    }
}
