//! # Canopy Core
//!
//! Client-side sync engine for Canopy.
//!
//! This crate provides:
//! - [`ViewCache`]: paired event and server caches with completeness flags
//! - [`ChildChangeAccumulator`]: net per-child changes of one operation
//! - [`WriteTree`] and [`CompoundWrite`]: the overlay of pending local writes
//! - Query filters, the view processor and the [`EventGenerator`]
//! - [`SyncTree`]: routes server and user operations to every affected view
//!
//! ## Usage
//!
//! ```
//! use canopy_core::{Config, ListenerId, QuerySpec, Registration, SyncTree, WriteId};
//! use canopy_snap::{Node, Path};
//!
//! let mut tree = SyncTree::without_provider(Config::default());
//! let query = QuerySpec::default_at(Path::root());
//! tree.add_event_registration(query.clone(), Registration::all(ListenerId::new(1)))?;
//!
//! let data = Node::from_json_str(r#"{"a": 1, "b": 2}"#)?;
//! tree.apply_server_overwrite(Path::root(), data)?;
//!
//! let events = tree.apply_user_overwrite(Path::parse("a")?, Node::from(5), WriteId::new(1), true)?;
//! assert_eq!(events[0].kind.as_str(), "child_changed");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod accumulator;
mod cache;
mod change;
mod compound_write;
mod config;
mod error;
mod event_generator;
pub mod filter;
mod operation;
mod query;
mod stats;
mod sync_point;
mod sync_tree;
mod types;
mod view;
mod view_cache;
mod view_processor;
mod write_tree;

pub use accumulator::ChildChangeAccumulator;
pub use cache::CacheNode;
pub use change::{Change, ChangeKind, Event};
pub use compound_write::CompoundWrite;
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use event_generator::{EventGenerator, Registration};
pub use operation::{Operation, OperationSource};
pub use query::{Bound, Limit, QueryParams, QuerySpec};
pub use stats::{StatsSnapshot, SyncStats};
pub use sync_point::SyncPoint;
pub use sync_tree::{ListenProvider, NullListenProvider, SyncTree};
pub use types::{ListenerId, WriteId};
pub use view::{View, ViewState};
pub use view_cache::ViewCache;
pub use view_processor::{ProcessorResult, ViewProcessor};
pub use write_tree::{WriteKind, WriteRecord, WriteTree, WriteTreeRef};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
