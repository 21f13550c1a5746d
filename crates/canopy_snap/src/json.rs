//! Conversion between nodes and `serde_json` values.
//!
//! Priorities travel in the `.priority` meta key. A leaf with a priority is
//! written as `{".value": v, ".priority": p}`. Arrays import as children
//! keyed `"0"`, `"1"`, ...

use crate::error::{SnapError, SnapResult};
use crate::key::{validate_key, ChildKey, PRIORITY_KEY, VALUE_KEY};
use crate::node::Node;
use crate::value::{Priority, Scalar};
use serde_json::{Map, Number, Value};

/// Largest integer that `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn scalar_from_json(value: &Value) -> SnapResult<Option<Scalar>> {
    match value {
        Value::Bool(b) => Ok(Some(Scalar::Bool(*b))),
        Value::Number(n) => {
            let n = n
                .as_f64()
                .ok_or_else(|| SnapError::invalid_json(format!("number {n} is not representable")))?;
            Scalar::number(n).map(Some)
        }
        Value::String(s) => Ok(Some(Scalar::text(s.as_str()))),
        Value::Null | Value::Array(_) | Value::Object(_) => Ok(None),
    }
}

fn priority_from_json(value: &Value) -> SnapResult<Option<Priority>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(_) | Value::String(_) | Value::Bool(_) => match scalar_from_json(value)? {
            Some(scalar) => Priority::from_scalar(&scalar).map(Some),
            None => Ok(None),
        },
        Value::Array(_) | Value::Object(_) => Err(SnapError::invalid_priority(
            "priorities must be numbers or strings",
        )),
    }
}

fn scalar_to_json(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Number(n) => number_to_json(*n),
        Scalar::Text(s) => Value::String(s.to_string()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn priority_to_json(priority: &Priority) -> Value {
    scalar_to_json(&priority.to_scalar())
}

impl Node {
    /// Builds a node from a JSON document.
    ///
    /// `null`, empty objects and empty arrays all become the empty node.
    pub fn from_json(value: &Value) -> SnapResult<Self> {
        match value {
            Value::Null => Ok(Node::empty()),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                Ok(scalar_from_json(value)?.map_or_else(Node::empty, Node::leaf))
            }
            Value::Array(items) => {
                let mut children = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    children.push((ChildKey::from(i.to_string()), Node::from_json(item)?));
                }
                Ok(Node::from_children(children))
            }
            Value::Object(map) => Self::from_json_object(map),
        }
    }

    fn from_json_object(map: &Map<String, Value>) -> SnapResult<Self> {
        let priority = map.get(PRIORITY_KEY).map(priority_from_json).transpose()?.flatten();

        if let Some(inner) = map.get(VALUE_KEY) {
            if map.keys().any(|k| k != VALUE_KEY && k != PRIORITY_KEY) {
                return Err(SnapError::invalid_json(
                    ".value cannot be combined with other children",
                ));
            }
            let node = match scalar_from_json(inner)? {
                Some(scalar) => Node::leaf(scalar),
                None if inner.is_null() => Node::empty(),
                None => {
                    return Err(SnapError::invalid_json(".value must hold a scalar"));
                }
            };
            return Ok(node.with_priority(priority));
        }

        let mut children = Vec::with_capacity(map.len());
        for (key, child) in map {
            if key == PRIORITY_KEY {
                continue;
            }
            validate_key(key, false)?;
            children.push((ChildKey::from(key.as_str()), Node::from_json(child)?));
        }
        Ok(Node::from_children(children).with_priority(priority))
    }

    /// Parses JSON text into a node.
    pub fn from_json_str(text: &str) -> SnapResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| SnapError::invalid_json(e.to_string()))?;
        Self::from_json(&value)
    }

    /// Converts the node to JSON.
    ///
    /// With `export` set, priorities are included through `.priority` and
    /// `.value`; otherwise only data is written.
    pub fn to_json(&self, export: bool) -> Value {
        if self.is_empty() {
            return Value::Null;
        }
        let priority = self.priority().filter(|_| export);
        if let Some(value) = self.value() {
            return match priority {
                Some(p) => {
                    let mut map = Map::new();
                    map.insert(VALUE_KEY.to_string(), scalar_to_json(value));
                    map.insert(PRIORITY_KEY.to_string(), priority_to_json(p));
                    Value::Object(map)
                }
                None => scalar_to_json(value),
            };
        }
        let mut map = Map::new();
        for (key, child) in self.children() {
            map.insert(key.to_string(), child.to_json(export));
        }
        if let Some(p) = priority {
            map.insert(PRIORITY_KEY.to_string(), priority_to_json(p));
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use serde_json::json;

    #[test]
    fn import_nested_object() {
        let node = Node::from_json(&json!({"a": 1, "b": {"c": "x"}})).unwrap();
        assert_eq!(node.child(&Path::parse("a").unwrap()), Node::from(1));
        assert_eq!(node.child(&Path::parse("b/c").unwrap()), Node::from("x"));
    }

    #[test]
    fn null_and_empty_containers_are_empty() {
        assert!(Node::from_json(&json!(null)).unwrap().is_empty());
        assert!(Node::from_json(&json!({})).unwrap().is_empty());
        assert!(Node::from_json(&json!([])).unwrap().is_empty());
        assert!(Node::from_json(&json!({"a": null})).unwrap().is_empty());
    }

    #[test]
    fn arrays_become_integer_keys() {
        let node = Node::from_json(&json!(["x", "y"])).unwrap();
        assert_eq!(node.num_children(), 2);
        assert_eq!(node.immediate_child(&"1".into()), Node::from("y"));
    }

    #[test]
    fn priority_meta_keys() {
        let node = Node::from_json(&json!({".value": 3, ".priority": "p"})).unwrap();
        assert!(node.is_leaf());
        assert_eq!(node.priority(), Some(&Priority::from("p")));

        let node = Node::from_json(&json!({"a": 1, ".priority": 2})).unwrap();
        assert_eq!(node.priority(), Some(&Priority::from(2)));
        assert_eq!(node.to_json(true), json!({"a": 1, ".priority": 2}));
        assert_eq!(node.to_json(false), json!({"a": 1}));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Node::from_json(&json!({"a.b": 1})).is_err());
        assert!(Node::from_json(&json!({".priority": true, "a": 1})).is_err());
        assert!(Node::from_json(&json!({".value": 1, "a": 2})).is_err());
        assert!(Node::from_json(&json!({".value": [1]})).is_err());
        assert!(Node::from_json_str("{not json").is_err());
    }

    #[test]
    fn integral_numbers_export_as_integers() {
        assert_eq!(Node::from(7).to_json(false), json!(7));
        let half = Node::leaf(Scalar::number(0.5).unwrap());
        assert_eq!(half.to_json(false), json!(0.5));
    }

    #[test]
    fn display_and_debug_use_json() {
        let node = Node::from_json(&json!({"a": 1})).unwrap();
        assert_eq!(node.to_string(), r#"{"a":1}"#);
        assert_eq!(format!("{node:?}"), r#"Node({"a":1})"#);
    }
}
