//! Error types for the feature-schema crate.

use thiserror::Error;

/// Errors that can occur while loading a feature schema artifact.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The artifact could not be read from disk
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The artifact is not valid UTF-8 text and not a supported pickle
    #[error("Feature artifact is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The artifact decoded, but not into a sequence of column names
    #[error("Malformed feature artifact: {reason}")]
    Malformed { reason: String },

    /// The pickle stream uses an opcode outside the supported subset
    #[error("Unsupported pickle opcode 0x{opcode:02x} at byte {offset}")]
    UnsupportedPickle { opcode: u8, offset: usize },

    #[error("Feature schema is empty")]
    Empty,

    /// The same column appears twice, so positions would be ambiguous
    #[error("Duplicate feature column: {column}")]
    DuplicateColumn { column: String },
}

impl SchemaError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        SchemaError::Malformed {
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, SchemaError>;
