//! Error types for the client.

use crate::protocol::ServerCode;
use canopy_core::{CoreError, ListenerId};
use canopy_snap::SnapError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in client operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Engine error.
    #[error("engine error: {0}")]
    Core(#[from] CoreError),

    /// Invalid path, key or data passed by the application.
    #[error("snapshot error: {0}")]
    Snap(#[from] SnapError),

    /// A server payload could not be turned into an operation.
    #[error("malformed payload: {message}")]
    MalformedPayload {
        /// Description of the problem.
        message: String,
    },

    /// The listener is not registered.
    #[error("unknown listener {0}")]
    UnknownListener(ListenerId),

    /// The server cancelled a listen.
    #[error("listen at {path} revoked: {reason}")]
    ListenRevoked {
        /// Code sent by the server.
        code: ServerCode,
        /// Location whose listens were cancelled.
        path: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl ClientError {
    /// Creates a malformed payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Creates a revocation error for `path`.
    pub fn revoked(code: ServerCode, path: impl Into<String>) -> Self {
        Self::ListenRevoked {
            reason: code.reason().to_string(),
            code,
            path: path.into(),
        }
    }
}
