//! Child keys and their ordering.

use crate::error::{SnapError, SnapResult};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Sentinel key that sorts before every valid key.
pub const MIN_NAME: &str = "[MIN_NAME]";

/// Sentinel key that sorts after every valid key.
pub const MAX_NAME: &str = "[MAX_NAME]";

/// Reserved pseudo-child holding a node's priority.
pub const PRIORITY_KEY: &str = ".priority";

/// Reserved JSON key carrying a leaf value next to `.priority`.
pub const VALUE_KEY: &str = ".value";

/// Maximum key length in bytes.
pub const MAX_KEY_BYTES: usize = 768;

/// Returns the value of `s` if it looks like a 32-bit integer.
///
/// Only `-?\d{1,10}` strings within the `i32` range qualify, so `"007"`
/// parses but `"1e3"` and `"99999999999"` do not.
pub fn try_parse_int(s: &str) -> Option<i32> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || digits.len() > 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i64>().ok().and_then(|v| i32::try_from(v).ok())
}

/// Compares two key names, including the `MIN_NAME`/`MAX_NAME` sentinels.
///
/// Integer-looking keys sort before all other keys and compare numerically;
/// equal integers fall back to length so `"1"` sorts before `"01"`.
/// Everything else compares lexicographically.
pub fn name_compare(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if a == MIN_NAME || b == MAX_NAME {
        return Ordering::Less;
    }
    if b == MIN_NAME || a == MAX_NAME {
        return Ordering::Greater;
    }
    match (try_parse_int(a), try_parse_int(b)) {
        (Some(x), Some(y)) => x
            .cmp(&y)
            .then(a.len().cmp(&b.len()))
            // "-0" and "00" are the same integer with the same length
            .then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Checks that `key` is usable as a data key.
///
/// When `allow_meta` is set, the reserved `.priority` and `.value` keys are
/// accepted as well.
pub fn validate_key(key: &str, allow_meta: bool) -> SnapResult<()> {
    if allow_meta && (key == PRIORITY_KEY || key == VALUE_KEY) {
        return Ok(());
    }
    if key.is_empty() {
        return Err(SnapError::invalid_key(key, "keys must be non-empty"));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(SnapError::invalid_key(
            key,
            format!("keys are limited to {MAX_KEY_BYTES} bytes"),
        ));
    }
    if let Some(c) = key
        .chars()
        .find(|c| matches!(c, '.' | '#' | '$' | '[' | ']' | '/') || c.is_ascii_control())
    {
        return Err(SnapError::invalid_key(
            key,
            format!("contains forbidden character {c:?}"),
        ));
    }
    Ok(())
}

/// The name of a child within a node.
///
/// Keys are cheap to clone and order with [`name_compare`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ChildKey(Arc<str>);

impl ChildKey {
    /// Creates a key without validating it.
    ///
    /// Use [`ChildKey::parse`] for untrusted input.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Creates a key after validating it as a data key.
    pub fn parse(name: &str) -> SnapResult<Self> {
        validate_key(name, false)?;
        Ok(Self::new(name))
    }

    /// The `.priority` pseudo-key.
    pub fn priority() -> Self {
        Self::new(PRIORITY_KEY)
    }

    /// The key sorting before all others.
    pub fn min() -> Self {
        Self::new(MIN_NAME)
    }

    /// The key sorting after all others.
    pub fn max() -> Self {
        Self::new(MAX_NAME)
    }

    /// Returns the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the `.priority` pseudo-key.
    pub fn is_priority(&self) -> bool {
        &*self.0 == PRIORITY_KEY
    }
}

impl Ord for ChildKey {
    fn cmp(&self, other: &Self) -> Ordering {
        name_compare(&self.0, &other.0)
    }
}

impl PartialOrd for ChildKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl From<&str> for ChildKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ChildKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_int_bounds() {
        assert_eq!(try_parse_int("42"), Some(42));
        assert_eq!(try_parse_int("-7"), Some(-7));
        assert_eq!(try_parse_int("007"), Some(7));
        assert_eq!(try_parse_int("2147483647"), Some(i32::MAX));
        assert_eq!(try_parse_int("2147483648"), None);
        assert_eq!(try_parse_int("12345678901"), None);
        assert_eq!(try_parse_int("1.5"), None);
        assert_eq!(try_parse_int("-"), None);
        assert_eq!(try_parse_int(""), None);
    }

    #[test]
    fn integers_sort_first_and_numerically() {
        let mut keys = vec!["b", "10", "a", "9", "-1", "01", "1"];
        keys.sort_by(|a, b| name_compare(a, b));
        assert_eq!(keys, vec!["-1", "1", "01", "9", "10", "a", "b"]);
    }

    #[test]
    fn sentinels_bound_everything() {
        assert_eq!(name_compare(MIN_NAME, "0"), Ordering::Less);
        assert_eq!(name_compare("zzz", MAX_NAME), Ordering::Less);
        assert_eq!(name_compare(MAX_NAME, MIN_NAME), Ordering::Greater);
        assert_eq!(name_compare(MIN_NAME, MIN_NAME), Ordering::Equal);
    }

    #[test]
    fn validate_rejects_forbidden_characters() {
        assert!(validate_key("users", false).is_ok());
        assert!(validate_key("a.b", false).is_err());
        assert!(validate_key("a/b", false).is_err());
        assert!(validate_key("$x", false).is_err());
        assert!(validate_key("", false).is_err());
        assert!(validate_key("tab\there", false).is_err());
        assert!(validate_key(PRIORITY_KEY, false).is_err());
        assert!(validate_key(PRIORITY_KEY, true).is_ok());
    }

    #[test]
    fn child_key_ordering_uses_name_compare() {
        let mut keys: Vec<ChildKey> = ["c", "2", "a", "10"].into_iter().map(ChildKey::from).collect();
        keys.sort();
        let names: Vec<&str> = keys.iter().map(ChildKey::as_str).collect();
        assert_eq!(names, vec!["2", "10", "a", "c"]);
    }

    proptest! {
        #[test]
        fn name_compare_is_antisymmetric(a in "[a-c0-9-]{1,4}", b in "[a-c0-9-]{1,4}") {
            prop_assert_eq!(name_compare(&a, &b), name_compare(&b, &a).reverse());
        }

        #[test]
        fn name_compare_equal_only_for_same_text(a in "[a-c0-9-]{1,4}", b in "[a-c0-9-]{1,4}") {
            prop_assert_eq!(name_compare(&a, &b) == Ordering::Equal, a == b);
        }
    }
}
