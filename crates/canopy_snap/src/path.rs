//! Slash-separated locations within the tree.

use crate::error::{SnapError, SnapResult};
use crate::key::{validate_key, ChildKey, PRIORITY_KEY};
use std::fmt;

/// A location in the tree, as a sequence of child keys.
///
/// The empty path is the root. Paths order segment by segment, so an
/// ancestor always sorts before its descendants.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path {
    segments: Vec<ChildKey>,
}

impl Path {
    /// The root path.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a path from already trusted segments.
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ChildKey>,
    {
        Self {
            segments: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses `"/a/b/c"` (leading, trailing and doubled slashes are ignored).
    ///
    /// Every segment must be a valid key; `.priority` is accepted as the last
    /// segment only.
    pub fn parse(text: &str) -> SnapResult<Self> {
        let parts: Vec<&str> = text.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let is_last = i + 1 == parts.len();
            if *part == PRIORITY_KEY {
                if !is_last {
                    return Err(SnapError::invalid_path(
                        text,
                        ".priority may only appear as the last segment",
                    ));
                }
            } else {
                validate_key(part, false)
                    .map_err(|e| SnapError::invalid_path(text, e.to_string()))?;
            }
            segments.push(ChildKey::new(*part));
        }
        Ok(Self { segments })
    }

    /// Returns true for the root path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// The first segment, if any.
    pub fn front(&self) -> Option<&ChildKey> {
        self.segments.first()
    }

    /// The last segment, if any.
    pub fn back(&self) -> Option<&ChildKey> {
        self.segments.last()
    }

    /// The path without its first segment.
    #[must_use]
    pub fn pop_front(&self) -> Self {
        Self {
            segments: self.segments.iter().skip(1).cloned().collect(),
        }
    }

    /// The parent path, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Appends one segment.
    #[must_use]
    pub fn child(&self, key: impl Into<ChildKey>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.into());
        Self { segments }
    }

    /// Appends every segment of `other`.
    #[must_use]
    pub fn join(&self, other: &Path) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Returns true if `self` equals `other` or is one of its ancestors.
    pub fn contains(&self, other: &Path) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// The remainder of `self` below `ancestor`, if `ancestor` contains it.
    pub fn relative_to(&self, ancestor: &Path) -> Option<Self> {
        if !ancestor.contains(self) {
            return None;
        }
        Some(Self {
            segments: self.segments[ancestor.len()..].to_vec(),
        })
    }

    /// Iterates over the segments.
    pub fn iter(&self) -> impl Iterator<Item = &ChildKey> {
        self.segments.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

impl From<ChildKey> for Path {
    fn from(key: ChildKey) -> Self {
        Self {
            segments: vec![key],
        }
    }
}
