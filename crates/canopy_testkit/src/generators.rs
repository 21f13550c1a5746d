//! Property-based test generators using proptest.
//!
//! Every generated key, path and node is valid for the snapshot model.

use canopy_core::Change;
use canopy_snap::{ChildKey, Node, Path};
use proptest::prelude::*;

/// Strategy for child keys: short words and small integers, so numeric and
/// lexical ordering both get exercised.
pub fn key_strategy() -> impl Strategy<Value = ChildKey> {
    prop_oneof![
        3 => prop::string::string_regex("[a-e]{1,3}").expect("Invalid regex"),
        1 => (-5i32..50).prop_map(|n| n.to_string()),
    ]
    .prop_map(ChildKey::from)
}

/// Strategy for paths up to `max_depth` segments deep.
pub fn path_strategy(max_depth: usize) -> impl Strategy<Value = Path> {
    prop::collection::vec(key_strategy(), 0..=max_depth).prop_map(Path::from_keys)
}

/// Strategy for leaves.
pub fn leaf_strategy() -> impl Strategy<Value = Node> {
    prop_oneof![
        any::<bool>().prop_map(Node::from),
        (-100i64..100).prop_map(Node::from),
        prop::string::string_regex("[a-z]{0,4}")
            .expect("Invalid regex")
            .prop_map(Node::from),
    ]
}

/// Strategy for trees up to three levels deep.
pub fn node_strategy() -> impl Strategy<Value = Node> {
    leaf_strategy().prop_recursive(3, 24, 4, |inner| {
        prop::collection::vec((key_strategy(), inner), 0..4).prop_map(Node::from_children)
    })
}

/// Strategy for the successive states of one child; `None` is absent.
///
/// Consecutive states may repeat.
pub fn touch_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<Option<i64>>> {
    prop::collection::vec(prop::option::of(0i64..4), 1..=max_len)
}

/// The per-child changes that move a child through `states`, one change per
/// transition that alters it.
pub fn touches_to_changes(key: &str, states: &[Option<i64>]) -> Vec<Change> {
    states
        .windows(2)
        .filter_map(|pair| match (pair[0], pair[1]) {
            (None, Some(new)) => Some(Change::child_added(key, Node::from(new))),
            (Some(old), None) => Some(Change::child_removed(key, Node::from(old))),
            (Some(old), Some(new)) if old != new => {
                Some(Change::child_changed(key, Node::from(new), Node::from(old)))
            }
            _ => None,
        })
        .collect()
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
