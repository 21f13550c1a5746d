//! # Canopy Testkit
//!
//! Test utilities for Canopy.
//!
//! This crate provides:
//! - Property-based test generators using proptest
//! - Event logs and JSON fixtures
//! - Ready-made engine scenarios
//!
//! ## Usage
//!
//! ```rust,ignore
//! use canopy_testkit::prelude::*;
//!
//! let log = EventLog::new();
//! client.subscribe_value(query, log.callback())?;
//! client.set("/a", json_node(json!(1)))?;
//! assert_eq!(log.kinds(), vec![ChangeKind::Value]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
