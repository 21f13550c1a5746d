//! Query parameters and query identity.

use crate::error::{CoreError, CoreResult};
use crate::filter::{IndexedFilter, LimitedFilter, NodeFilter, RangedFilter};
use canopy_snap::{ChildKey, Index, NamedNode, Node, Path};
use std::fmt;

/// One end of a query range.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    /// Indexed value at the bound.
    pub value: Node,
    /// Optional key that breaks ties at `value`.
    pub key: Option<ChildKey>,
}

/// Which end of the range a limit keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// The first `n` children in index order.
    First(usize),
    /// The last `n` children in index order.
    Last(usize),
}

impl Limit {
    /// The number of children kept.
    pub fn count(self) -> usize {
        match self {
            Limit::First(n) | Limit::Last(n) => n,
        }
    }
}

/// How a query orders and restricts the children at its location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    index: Index,
    start: Option<Bound>,
    end: Option<Bound>,
    limit: Option<Limit>,
}

impl QueryParams {
    /// Parameters that load all data ordered by priority.
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders children by `index`.
    #[must_use]
    pub fn order_by(mut self, index: Index) -> Self {
        self.index = index;
        self
    }

    /// Starts the range at `value` (and `key` within equal values).
    #[must_use]
    pub fn start_at(mut self, value: Node, key: Option<ChildKey>) -> Self {
        self.start = Some(Bound { value, key });
        self
    }

    /// Ends the range at `value` (and `key` within equal values).
    #[must_use]
    pub fn end_at(mut self, value: Node, key: Option<ChildKey>) -> Self {
        self.end = Some(Bound { value, key });
        self
    }

    /// Keeps only the first `n` children of the range.
    #[must_use]
    pub fn limit_to_first(mut self, n: usize) -> Self {
        self.limit = Some(Limit::First(n));
        self
    }

    /// Keeps only the last `n` children of the range.
    #[must_use]
    pub fn limit_to_last(mut self, n: usize) -> Self {
        self.limit = Some(Limit::Last(n));
        self
    }

    /// The ordering index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// The range start, if bounded.
    pub fn start(&self) -> Option<&Bound> {
        self.start.as_ref()
    }

    /// The range end, if bounded.
    pub fn end(&self) -> Option<&Bound> {
        self.end.as_ref()
    }

    /// The limit, if any.
    pub fn limit(&self) -> Option<Limit> {
        self.limit
    }

    /// Returns true when the query has no range and no limit.
    pub fn loads_all_data(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.limit.is_none()
    }

    /// Returns true for the plain "everything at this location" query.
    pub fn is_default(&self) -> bool {
        self.loads_all_data() && self.index == Index::Priority
    }

    /// Checks that bounds and limit make sense for the index.
    pub fn validate(&self) -> CoreResult<()> {
        if self.limit.is_some_and(|l| l.count() == 0) {
            return Err(CoreError::invalid_query("limit must be positive"));
        }
        for bound in [&self.start, &self.end].into_iter().flatten() {
            if !bound.value.is_empty() && !bound.value.is_leaf() {
                return Err(CoreError::invalid_query("bound values must be scalars"));
            }
            match &self.index {
                Index::Key => {
                    if bound.key.is_some() {
                        return Err(CoreError::invalid_query(
                            "key-ordered queries take no key in their bounds",
                        ));
                    }
                    if bound.value.value().and_then(|v| v.as_text()).is_none() {
                        return Err(CoreError::invalid_query(
                            "key-ordered queries need string bounds",
                        ));
                    }
                }
                Index::Priority => {
                    if bound.value.value().is_some_and(|v| v.as_bool().is_some()) {
                        return Err(CoreError::invalid_query(
                            "priority-ordered queries cannot use boolean bounds",
                        ));
                    }
                }
                Index::Value | Index::Child(_) => {}
            }
        }
        Ok(())
    }

    /// The lowest child in range, or `None` when unbounded below.
    pub fn start_post(&self) -> Option<NamedNode> {
        self.start.as_ref().map(|b| {
            self.index
                .bound(&b.value, b.key.clone().unwrap_or_else(ChildKey::min))
        })
    }

    /// The highest child in range, or `None` when unbounded above.
    pub fn end_post(&self) -> Option<NamedNode> {
        self.end.as_ref().map(|b| {
            self.index
                .bound(&b.value, b.key.clone().unwrap_or_else(ChildKey::max))
        })
    }

    /// Canonical string identifying these parameters.
    ///
    /// Equal parameters always produce the same identifier.
    pub fn identifier(&self) -> String {
        if self.is_default() {
            return "default".to_string();
        }
        let mut parts = vec![format!("i={}", self.index.identifier())];
        let bound = |b: &Bound| match &b.key {
            Some(key) => format!("{},{key}", b.value.to_json(false)),
            None => b.value.to_json(false).to_string(),
        };
        if let Some(b) = &self.start {
            parts.push(format!("s={}", bound(b)));
        }
        if let Some(b) = &self.end {
            parts.push(format!("e={}", bound(b)));
        }
        match self.limit {
            Some(Limit::First(n)) => parts.push(format!("l=f{n}")),
            Some(Limit::Last(n)) => parts.push(format!("l=l{n}")),
            None => {}
        }
        parts.join(";")
    }

    /// The filter that applies these parameters to snapshots.
    pub fn node_filter(&self) -> Box<dyn NodeFilter> {
        if let Some(limit) = self.limit {
            Box::new(LimitedFilter::new(self, limit))
        } else if self.loads_all_data() {
            Box::new(IndexedFilter::new(self.index.clone()))
        } else {
            Box::new(RangedFilter::new(self))
        }
    }
}

/// A query: a location plus parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Query location.
    pub path: Path,
    /// Ordering and restrictions.
    pub params: QueryParams,
}

impl QuerySpec {
    /// Creates a query.
    pub fn new(path: Path, params: QueryParams) -> Self {
        Self { path, params }
    }

    /// The default query at `path`.
    pub fn default_at(path: Path) -> Self {
        Self::new(path, QueryParams::default())
    }

    /// Identifier of the parameters, unique among queries at one path.
    pub fn identifier(&self) -> String {
        self.params.identifier()
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.path, self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn default_identifier() {
        assert_eq!(QueryParams::new().identifier(), "default");
        assert!(QueryParams::new().loads_all_data());
        assert!(!QueryParams::new().order_by(Index::Key).is_default());
    }

    #[test]
    fn identifiers_are_canonical() {
        let a = QueryParams::new()
            .limit_to_first(2)
            .order_by(Index::Value)
            .start_at(Node::from(5), None);
        let b = QueryParams::new()
            .order_by(Index::Value)
            .start_at(Node::from(5), None)
            .limit_to_first(2);
        assert_eq!(a.identifier(), b.identifier());
        assert_eq!(a.identifier(), "i=.value;s=5;l=f2");
        assert_ne!(
            a.identifier(),
            QueryParams::new().order_by(Index::Value).limit_to_last(2).identifier()
        );
    }

    #[test]
    fn validation() {
        assert!(QueryParams::new().limit_to_first(0).validate().is_err());
        assert!(QueryParams::new()
            .order_by(Index::Key)
            .start_at(Node::from(1), None)
            .validate()
            .is_err());
        assert!(QueryParams::new()
            .order_by(Index::Key)
            .start_at(Node::from("b"), None)
            .validate()
            .is_ok());
        assert!(QueryParams::new()
            .start_at(Node::from(true), None)
            .validate()
            .is_err());
        assert!(QueryParams::new()
            .order_by(Index::Value)
            .end_at(Node::from_children([("x", Node::from(1))]), None)
            .validate()
            .is_err());
    }

    #[test]
    fn posts_bracket_bound_values() {
        let params = QueryParams::new()
            .order_by(Index::Value)
            .start_at(Node::from(2), None)
            .end_at(Node::from(4), None);
        let start = params.start_post().unwrap();
        let end = params.end_post().unwrap();
        let inside = NamedNode::new("k", Node::from(2));
        assert_eq!(params.index().compare(&start, &inside), Ordering::Less);
        assert_eq!(params.index().compare(&inside, &end), Ordering::Less);
        assert!(QueryParams::new().start_post().is_none());
    }

    #[test]
    fn filter_selection() {
        assert!(!QueryParams::new().node_filter().filters_nodes());
        assert!(QueryParams::new()
            .start_at(Node::from(1), None)
            .node_filter()
            .filters_nodes());
        assert!(QueryParams::new().limit_to_last(3).node_filter().filters_nodes());
    }
}
