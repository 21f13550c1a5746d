//! Operations exchanged with the transport and the local write API.
//!
//! Payloads are plain JSON. Decoding validates paths and data so nothing
//! malformed reaches the engine.

use crate::error::{ClientError, ClientResult};
use canopy_core::CompoundWrite;
use canopy_snap::{Node, Path};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Why the server cancelled a listen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServerCode {
    /// Security rules rejected the listen.
    PermissionDenied,
    /// The requested data is too large.
    TooBig,
    /// The service is not reachable.
    Unavailable,
    /// Any other code, kept verbatim.
    Other(String),
}

impl ServerCode {
    /// Wire name of the code.
    pub fn as_str(&self) -> &str {
        match self {
            ServerCode::PermissionDenied => "permission_denied",
            ServerCode::TooBig => "too_big",
            ServerCode::Unavailable => "unavailable",
            ServerCode::Other(code) => code,
        }
    }

    /// Human-readable explanation.
    pub fn reason(&self) -> &'static str {
        match self {
            ServerCode::PermissionDenied => {
                "client doesn't have permission to access the desired data"
            }
            ServerCode::TooBig => "the requested data is too big to be returned",
            ServerCode::Unavailable => "the service is unavailable",
            ServerCode::Other(_) => "the server cancelled the listen",
        }
    }
}

impl From<String> for ServerCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "permission_denied" => ServerCode::PermissionDenied,
            "too_big" => ServerCode::TooBig,
            "unavailable" => ServerCode::Unavailable,
            _ => ServerCode::Other(code),
        }
    }
}

impl From<ServerCode> for String {
    fn from(code: ServerCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ServerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation pushed by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServerOperation {
    /// Replace the data at `path`.
    Overwrite {
        /// Location.
        path: String,
        /// New data.
        data: Value,
    },
    /// Replace several locations below `path`.
    Merge {
        /// Location.
        path: String,
        /// Relative path to new data.
        children: Map<String, Value>,
    },
    /// The server accepted or rejected a local write.
    AckUserWrite {
        /// The acknowledged write.
        write_id: u64,
        /// Whether the write was rejected.
        #[serde(default)]
        revert: bool,
    },
    /// Initial data for listens at `path` is complete.
    ListenComplete {
        /// Location.
        path: String,
    },
    /// Listens at `path` were cancelled.
    ListenRevoked {
        /// Location.
        path: String,
        /// Cancellation code.
        code: ServerCode,
    },
}

impl ServerOperation {
    /// Parses one operation from JSON text.
    pub fn from_json_str(text: &str) -> ClientResult<Self> {
        serde_json::from_str(text).map_err(|e| ClientError::malformed(e.to_string()))
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ServerOperation::Overwrite { .. } => "overwrite",
            ServerOperation::Merge { .. } => "merge",
            ServerOperation::AckUserWrite { .. } => "ack_user_write",
            ServerOperation::ListenComplete { .. } => "listen_complete",
            ServerOperation::ListenRevoked { .. } => "listen_revoked",
        }
    }
}

/// A local write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum UserOperation {
    /// Replace the data at `path`.
    Overwrite {
        /// Fresh write id.
        write_id: u64,
        /// Location.
        path: String,
        /// New data.
        data: Value,
    },
    /// Replace several locations below `path`.
    Merge {
        /// Fresh write id.
        write_id: u64,
        /// Location.
        path: String,
        /// Relative path to new data.
        children: Map<String, Value>,
    },
}

impl UserOperation {
    /// The write id carried by the operation.
    pub fn write_id(&self) -> u64 {
        match self {
            UserOperation::Overwrite { write_id, .. } | UserOperation::Merge { write_id, .. } => {
                *write_id
            }
        }
    }
}

/// Parses a payload path.
pub(crate) fn decode_path(text: &str) -> ClientResult<Path> {
    Path::parse(text).map_err(|e| ClientError::malformed(e.to_string()))
}

/// Parses payload data.
pub(crate) fn decode_node(value: &Value) -> ClientResult<Node> {
    Node::from_json(value).map_err(|e| ClientError::malformed(e.to_string()))
}

/// Parses merge children keyed by relative path.
pub(crate) fn decode_children(children: &Map<String, Value>) -> ClientResult<CompoundWrite> {
    let mut writes = Vec::with_capacity(children.len());
    for (path, value) in children {
        writes.push((decode_path(path)?, decode_node(value)?));
    }
    Ok(CompoundWrite::from_writes(writes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_operations_parse() {
        let op = ServerOperation::from_json_str(r#"{"op":"overwrite","path":"/a","data":{"b":1}}"#)
            .unwrap();
        assert_eq!(
            op,
            ServerOperation::Overwrite {
                path: "/a".into(),
                data: json!({"b": 1}),
            }
        );

        let ack = ServerOperation::from_json_str(r#"{"op":"ack_user_write","write_id":3}"#).unwrap();
        assert_eq!(
            ack,
            ServerOperation::AckUserWrite {
                write_id: 3,
                revert: false
            }
        );
        assert_eq!(ack.name(), "ack_user_write");
    }

    #[test]
    fn unknown_codes_are_kept() {
        let op = ServerOperation::from_json_str(
            r#"{"op":"listen_revoked","path":"/a","code":"expired_token"}"#,
        )
        .unwrap();
        match op {
            ServerOperation::ListenRevoked { code, .. } => {
                assert_eq!(code, ServerCode::Other("expired_token".into()));
                assert_eq!(code.as_str(), "expired_token");
            }
            other => panic!("unexpected {other:?}"),
        }
        let known: ServerCode = serde_json::from_value(json!("too_big")).unwrap();
        assert_eq!(known, ServerCode::TooBig);
        assert_eq!(serde_json::to_value(&known).unwrap(), json!("too_big"));
    }

    #[test]
    fn malformed_operations_are_rejected() {
        assert!(matches!(
            ServerOperation::from_json_str(r#"{"op":"explode"}"#),
            Err(ClientError::MalformedPayload { .. })
        ));
        assert!(decode_path("/a/b$").is_err());
        assert!(decode_node(&json!({"a": {"b.c": 1}})).is_err());
    }

    #[test]
    fn merge_children_decode() {
        let children = json!({"a": 1, "b/c": null});
        let cw = decode_children(children.as_object().unwrap()).unwrap();
        assert_eq!(cw.len(), 2);

        let user: UserOperation = serde_json::from_value(
            json!({"op": "merge", "write_id": 7, "path": "/", "children": {"x": true}}),
        )
        .unwrap();
        assert_eq!(user.write_id(), 7);
    }
}
