//! Error types for the snapshot crate.

use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapResult<T> = Result<T, SnapError>;

/// Errors that can occur while building or converting snapshots.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapError {
    /// A child key contains forbidden characters or is empty.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// Why the key was rejected.
        reason: String,
    },

    /// A path could not be parsed.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The offending path text.
        path: String,
        /// Why the path was rejected.
        reason: String,
    },

    /// NaN and infinities cannot be stored.
    #[error("non-finite numbers are not valid data")]
    NonFiniteNumber,

    /// Priorities must be numbers or strings.
    #[error("invalid priority: {message}")]
    InvalidPriority {
        /// Description of the problem.
        message: String,
    },

    /// The JSON document has a shape the tree model cannot represent.
    #[error("invalid JSON data: {message}")]
    InvalidJson {
        /// Description of the problem.
        message: String,
    },
}

impl SnapError {
    /// Create an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid priority error.
    pub fn invalid_priority(message: impl Into<String>) -> Self {
        Self::InvalidPriority {
            message: message.into(),
        }
    }

    /// Create an invalid JSON error.
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
        }
    }
}
