//! Error types for Canopy core.

use crate::change::ChangeKind;
use crate::types::WriteId;
use canopy_snap::SnapError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Canopy core operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Snapshot model error.
    #[error("snapshot error: {0}")]
    Snap(#[from] SnapError),

    /// Two child changes for the same key cannot be combined.
    ///
    /// This is a programming error in the caller that produced the changes.
    #[error("invalid change transition for key {key:?}: {incoming:?} after {tracked:?}")]
    InvalidChangeTransition {
        /// The child key.
        key: String,
        /// Kind already tracked for the key.
        tracked: ChangeKind,
        /// Kind that was folded in.
        incoming: ChangeKind,
    },

    /// Value changes, moves and priority changes are not tracked per child.
    #[error("change cannot be tracked per child: {message}")]
    UntrackableChange {
        /// Description of the rejected change.
        message: String,
    },

    /// Write ids must strictly increase.
    #[error("write id {attempted} is not greater than the last write id {last}")]
    WriteIdNotMonotonic {
        /// Highest write id seen so far.
        last: WriteId,
        /// Rejected write id.
        attempted: WriteId,
    },

    /// The write is not pending.
    #[error("unknown write {write_id}")]
    UnknownWrite {
        /// The write id.
        write_id: WriteId,
    },

    /// The pending write ceiling was reached.
    #[error("too many pending writes (limit {limit})")]
    TooManyPendingWrites {
        /// Configured ceiling.
        limit: usize,
    },

    /// Query parameters are inconsistent with the index.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an untrackable change error.
    pub fn untrackable(message: impl Into<String>) -> Self {
        Self::UntrackableChange {
            message: message.into(),
        }
    }

    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::InvalidChangeTransition {
            key: "a".into(),
            tracked: ChangeKind::ChildAdded,
            incoming: ChangeKind::ChildAdded,
        };
        assert!(err.to_string().contains("\"a\""));

        let err = CoreError::WriteIdNotMonotonic {
            last: WriteId::new(4),
            attempted: WriteId::new(2),
        };
        assert_eq!(
            err.to_string(),
            "write id write:2 is not greater than the last write id write:4"
        );
    }

    #[test]
    fn snap_errors_convert() {
        let err: CoreError = SnapError::NonFiniteNumber.into();
        assert!(matches!(err, CoreError::Snap(_)));
    }
}
