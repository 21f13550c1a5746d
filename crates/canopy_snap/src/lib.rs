//! # Canopy Snap
//!
//! Immutable snapshot trees for the Canopy sync engine.
//!
//! This crate provides:
//! - [`Node`]: a persistent tree of scalars with optional priorities
//! - [`Path`] and [`ChildKey`] with numeric-aware key ordering
//! - [`Index`]: sibling ordering by priority, key, value or a child path
//! - JSON import/export through `serde_json`
//!
//! ## Usage
//!
//! ```
//! use canopy_snap::{Node, Path};
//!
//! let node = Node::from_json_str(r#"{"a": 1, "b": {"c": true}}"#).unwrap();
//! let path = Path::parse("/b/c").unwrap();
//!
//! let updated = node.update_child(&path, Node::from(false));
//! assert_eq!(node.child(&path), Node::from(true));
//! assert_eq!(updated.child(&path), Node::from(false));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod index;
mod json;
mod key;
mod node;
mod path;
mod value;

pub use error::{SnapError, SnapResult};
pub use index::{compare_values, Index, NamedNode};
pub use key::{
    name_compare, try_parse_int, validate_key, ChildKey, MAX_KEY_BYTES, MAX_NAME, MIN_NAME,
    PRIORITY_KEY, VALUE_KEY,
};
pub use node::Node;
pub use path::Path;
pub use value::{Priority, Scalar};
