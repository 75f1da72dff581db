//! Centralized error types for mimewalk.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mimewalk library.
///
/// Legacy-format failures (TNEF, UU) never show up here: the walker
/// recovers from them locally.
#[derive(Error, Debug)]
pub enum WalkError {
    /// The MIME structure is unusable (e.g. a multipart without children).
    #[error("Structural error at part '{address}': {reason}")]
    Structural { address: String, reason: String },

    /// A part's payload could not be turned into text or bytes.
    #[error("Cannot decode part '{address}' of message {}: {reason}", .message_id.as_deref().unwrap_or("<no message-id>"))]
    ContentDecode {
        address: String,
        message_id: Option<String>,
        reason: String,
    },

    /// The character encoding is not supported.
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    /// The MIME layer could not produce a part tree from the input.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, WalkError>`.
pub type Result<T> = std::result::Result<T, WalkError>;

impl WalkError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Structural` variant for the part at `address`.
    pub fn structural(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Structural {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// `true` for errors describing broken structure rather than unreadable content.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural { .. })
    }
}
