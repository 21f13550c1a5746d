//! Scalar leaf values and priorities.

use crate::error::{SnapError, SnapResult};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A leaf value.
///
/// Numbers are always finite; constructors reject NaN and infinities so the
/// type can implement `Eq` and a total order.
#[derive(Debug, Clone)]
pub enum Scalar {
    /// Boolean value.
    Bool(bool),
    /// Finite number.
    Number(f64),
    /// UTF-8 string.
    Text(Arc<str>),
}

impl Scalar {
    /// Creates a number, rejecting NaN and infinities.
    pub fn number(n: f64) -> SnapResult<Self> {
        if n.is_finite() {
            Ok(Scalar::Number(n))
        } else {
            Err(SnapError::NonFiniteNumber)
        }
    }

    /// Creates a string value.
    pub fn text(s: impl Into<Arc<str>>) -> Self {
        Scalar::Text(s.into())
    }

    /// Position of this value's type in the value ordering.
    fn type_rank(&self) -> u8 {
        match self {
            Scalar::Bool(_) => 0,
            Scalar::Number(_) => 1,
            Scalar::Text(_) => 2,
        }
    }

    /// Returns the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number, if this is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl Ord for Scalar {
    /// Booleans (false, true), then numbers, then strings.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Number(a), Scalar::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Number(f64::from(n))
    }
}

impl From<i64> for Scalar {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::text(s)
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::text(s)
    }
}

impl TryFrom<f64> for Scalar {
    type Error = SnapError;

    fn try_from(n: f64) -> SnapResult<Self> {
        Scalar::number(n)
    }
}

/// Ordering priority attached to a node.
///
/// Nodes without a priority sort first, then numeric priorities, then
/// string priorities.
#[derive(Debug, Clone)]
pub enum Priority {
    /// Finite numeric priority.
    Number(f64),
    /// String priority.
    Text(Arc<str>),
}

impl Priority {
    /// Converts a scalar into a priority. Booleans are not valid priorities.
    pub fn from_scalar(value: &Scalar) -> SnapResult<Self> {
        match value {
            Scalar::Number(n) => Ok(Priority::Number(*n)),
            Scalar::Text(s) => Ok(Priority::Text(Arc::clone(s))),
            Scalar::Bool(b) => Err(SnapError::invalid_priority(format!(
                "boolean {b} cannot be used as a priority"
            ))),
        }
    }

    /// Converts the priority back into a scalar.
    pub fn to_scalar(&self) -> Scalar {
        match self {
            Priority::Number(n) => Scalar::Number(*n),
            Priority::Text(s) => Scalar::Text(Arc::clone(s)),
        }
    }

    /// Compares two optional priorities: none < numbers < strings.
    pub fn compare(a: Option<&Priority>, b: Option<&Priority>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Priority::Number(a), Priority::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Priority::Text(a), Priority::Text(b)) => a.cmp(b),
            (Priority::Number(_), Priority::Text(_)) => Ordering::Less,
            (Priority::Text(_), Priority::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<i32> for Priority {
    fn from(n: i32) -> Self {
        Priority::Number(f64::from(n))
    }
}

impl From<&str> for Priority {
    fn from(s: &str) -> Self {
        Priority::Text(s.into())
    }
}
