//! Replay command implementation.
//!
//! A script is a JSON-lines file. Each non-blank line is one step:
//!
//! ```text
//! {"step": "listen", "id": "all", "path": "/", "kinds": ["child_added"]}
//! {"step": "server", "operation": {"op": "overwrite", "path": "/", "data": {"a": 1}}}
//! {"step": "set", "path": "/a", "data": 5}
//! {"step": "update", "path": "/", "children": {"b/c": true}}
//! {"step": "unlisten", "id": "all"}
//! ```

use canopy_client::{Client, ClientConfig, ClientError, ServerOperation};
use canopy_core::{ChangeKind, Config, Event, ListenerId, QueryParams, QuerySpec, StatsSnapshot};
use canopy_snap::{ChildKey, Index, Node, Path};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while replaying a script.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// The script could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line is not a valid step.
    #[error("line {line}: {message}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// The client rejected a step.
    #[error("line {line}: {source}")]
    Client {
        /// One-based line number.
        line: usize,
        /// Underlying error.
        source: ClientError,
    },
}

impl ReplayError {
    fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    fn client(line: usize, source: impl Into<ClientError>) -> Self {
        Self::Client {
            line,
            source: source.into(),
        }
    }
}

/// One script step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Registers a listener under a script-local name.
    Listen {
        /// Script-local listener name.
        id: String,
        /// Query location.
        path: String,
        /// Event kinds; all kinds when empty.
        #[serde(default)]
        kinds: Vec<String>,
        /// `priority`, `key`, `value` or `child:<path>`.
        #[serde(default)]
        order_by: Option<String>,
        /// Lower bound.
        #[serde(default)]
        start_at: Option<Value>,
        /// Upper bound.
        #[serde(default)]
        end_at: Option<Value>,
        /// Keep only the first n children.
        #[serde(default)]
        limit_to_first: Option<usize>,
        /// Keep only the last n children.
        #[serde(default)]
        limit_to_last: Option<usize>,
    },
    /// Removes a listener.
    Unlisten {
        /// Script-local listener name.
        id: String,
    },
    /// Local overwrite.
    Set {
        /// Target location.
        path: String,
        /// New data.
        data: Value,
    },
    /// Local merge.
    Update {
        /// Base location.
        path: String,
        /// Relative paths and their new data.
        children: Map<String, Value>,
    },
    /// Operation pushed by the server.
    Server {
        /// The operation.
        operation: ServerOperation,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Listen { .. } => "listen",
            Step::Unlisten { .. } => "unlisten",
            Step::Set { .. } => "set",
            Step::Update { .. } => "update",
            Step::Server { .. } => "server",
        }
    }
}

/// An event as printed by the replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Line of the step that raised the event.
    pub line: usize,
    /// Script-local listener name.
    pub listener: String,
    /// Event kind.
    pub kind: String,
    /// Query location.
    pub path: String,
    /// Child key, for child events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Snapshot data.
    pub data: Value,
    /// Preceding sibling, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_key: Option<String>,
}

impl EventRecord {
    fn new(line: usize, listener: String, event: &Event) -> Self {
        Self {
            line,
            listener,
            kind: event.kind.to_string(),
            path: event.path.to_string(),
            key: event.key.as_ref().map(ChildKey::to_string),
            data: event.node.to_json(false),
            prev_key: event.prev_key.as_ref().map(ChildKey::to_string),
        }
    }

    fn to_text(&self) -> String {
        let mut text = format!("{:>4} {} {} {}", self.line, self.listener, self.kind, self.path);
        if let Some(key) = &self.key {
            text.push_str(&format!(" key={key}"));
        }
        text.push_str(&format!(" {}", self.data));
        if let Some(prev) = &self.prev_key {
            text.push_str(&format!(" prev={prev}"));
        }
        text
    }
}

/// Drives a client through script steps and collects the events.
pub struct Replayer {
    client: Client,
    names: BTreeMap<String, ListenerId>,
    pending: Arc<Mutex<Vec<(String, Event)>>>,
    records: Vec<EventRecord>,
}

impl Replayer {
    /// Creates a replayer over an offline client.
    pub fn new() -> Self {
        let config = ClientConfig::new().with_core(Config::new().session("replay"));
        Self {
            client: Client::offline(config),
            names: BTreeMap::new(),
            pending: Arc::new(Mutex::new(Vec::new())),
            records: Vec::new(),
        }
    }

    /// Applies one step read from `line`.
    pub fn apply(&mut self, line: usize, step: Step) -> Result<(), ReplayError> {
        debug!(line, step = step.name(), "replaying step");
        match step {
            Step::Listen {
                id,
                path,
                kinds,
                order_by,
                start_at,
                end_at,
                limit_to_first,
                limit_to_last,
            } => {
                if self.names.contains_key(&id) {
                    return Err(ReplayError::parse(line, format!("listener {id} already exists")));
                }
                let mut params = QueryParams::new();
                if let Some(order) = order_by {
                    params = params.order_by(parse_index(line, &order)?);
                }
                if let Some(value) = start_at {
                    params = params.start_at(json_node(line, &value)?, None);
                }
                if let Some(value) = end_at {
                    params = params.end_at(json_node(line, &value)?, None);
                }
                if let Some(n) = limit_to_first {
                    params = params.limit_to_first(n);
                }
                if let Some(n) = limit_to_last {
                    params = params.limit_to_last(n);
                }
                let path = Path::parse(&path).map_err(|e| ReplayError::client(line, e))?;
                let kinds = parse_kinds(line, &kinds)?;

                let sink = Arc::clone(&self.pending);
                let name = id.clone();
                let listener = self
                    .client
                    .subscribe(
                        QuerySpec::new(path, params),
                        kinds,
                        Arc::new(move |event: &Event| sink.lock().push((name.clone(), event.clone()))),
                    )
                    .map_err(|e| ReplayError::client(line, e))?;
                self.names.insert(id, listener);
            }
            Step::Unlisten { id } => {
                let listener = self
                    .names
                    .remove(&id)
                    .ok_or_else(|| ReplayError::parse(line, format!("unknown listener {id}")))?;
                self.client
                    .unsubscribe(listener)
                    .map_err(|e| ReplayError::client(line, e))?;
            }
            Step::Set { path, data } => {
                let node = json_node(line, &data)?;
                self.client
                    .set(&path, node)
                    .map_err(|e| ReplayError::client(line, e))?;
            }
            Step::Update { path, children } => {
                let children = children
                    .iter()
                    .map(|(relative, value)| {
                        let relative =
                            Path::parse(relative).map_err(|e| ReplayError::client(line, e))?;
                        Ok((relative, json_node(line, value)?))
                    })
                    .collect::<Result<Vec<_>, ReplayError>>()?;
                self.client
                    .update(&path, children)
                    .map_err(|e| ReplayError::client(line, e))?;
            }
            Step::Server { operation } => {
                self.client
                    .apply_server_operation(operation)
                    .map_err(|e| ReplayError::client(line, e))?;
            }
        }

        let raised = std::mem::take(&mut *self.pending.lock());
        self.records.extend(
            raised
                .into_iter()
                .map(|(name, event)| EventRecord::new(line, name, &event)),
        );
        Ok(())
    }

    /// Engine counters so far.
    pub fn stats(&self) -> StatsSnapshot {
        self.client.stats()
    }

    /// The events collected so far.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

}

impl Default for Replayer {
    fn default() -> Self {
        Self::new()
    }
}

fn json_node(line: usize, value: &Value) -> Result<Node, ReplayError> {
    Node::from_json(value).map_err(|e| ReplayError::client(line, e))
}

fn parse_index(line: usize, text: &str) -> Result<Index, ReplayError> {
    match text {
        "priority" => Ok(Index::Priority),
        "key" => Ok(Index::Key),
        "value" => Ok(Index::Value),
        _ => match text.strip_prefix("child:") {
            Some(child) => Path::parse(child)
                .map(Index::Child)
                .map_err(|e| ReplayError::client(line, e)),
            None => Err(ReplayError::parse(line, format!("unknown index {text}"))),
        },
    }
}

fn parse_kinds(line: usize, names: &[String]) -> Result<Vec<ChangeKind>, ReplayError> {
    if names.is_empty() {
        return Ok(ChangeKind::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| {
            ChangeKind::ALL
                .into_iter()
                .find(|kind| kind.as_str() == name.as_str())
                .ok_or_else(|| ReplayError::parse(line, format!("unknown event kind {name}")))
        })
        .collect()
}

/// Replays every step read from `reader`.
pub fn replay<R: BufRead>(reader: R) -> Result<Replayer, ReplayError> {
    let mut replayer = Replayer::new();
    for (index, text) in reader.lines().enumerate() {
        let line = index + 1;
        let text = text?;
        if text.trim().is_empty() {
            continue;
        }
        let step: Step =
            serde_json::from_str(&text).map_err(|e| ReplayError::parse(line, e.to_string()))?;
        replayer.apply(line, step)?;
    }
    Ok(replayer)
}

/// Runs the replay command.
pub fn run(
    script: &std::path::Path,
    format: &str,
    show_stats: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(script)?;
    let replayer = replay(BufReader::new(file))?;
    let stats = replayer.stats();
    let records = replayer.records();
    info!(events = records.len(), "replay finished");

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
        _ => {
            for record in records {
                println!("{}", record.to_text());
            }
        }
    }

    if show_stats {
        println!();
        println!("Server operations: {}", stats.server_operations);
        println!("User writes:       {}", stats.user_writes);
        println!("Acks:              {}", stats.acks);
        println!("Reverts:           {}", stats.reverts);
        println!("Events raised:     {}", stats.events_raised);
        println!("Views created:     {}", stats.views_created);
        println!("Views removed:     {}", stats.views_removed);
        println!("Errors:            {}", stats.errors);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn script(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn replay_file(file: &tempfile::NamedTempFile) -> Result<Replayer, ReplayError> {
        replay(BufReader::new(File::open(file.path()).unwrap()))
    }

    #[test]
    fn replays_write_and_ack() {
        let file = script(&[
            r#"{"step": "listen", "id": "kids", "path": "/", "kinds": ["child_added", "child_changed"]}"#,
            r#"{"step": "server", "operation": {"op": "overwrite", "path": "/", "data": {"a": 1, "b": 2}}}"#,
            "",
            r#"{"step": "set", "path": "/a", "data": 5}"#,
            r#"{"step": "server", "operation": {"op": "overwrite", "path": "/b", "data": 9}}"#,
            r#"{"step": "server", "operation": {"op": "ack_user_write", "write_id": 1}}"#,
        ]);
        let replayer = replay_file(&file).unwrap();
        let lines: Vec<_> = replayer
            .records()
            .iter()
            .map(|r| (r.line, r.kind.as_str(), r.key.clone()))
            .collect();
        assert_eq!(
            lines,
            vec![
                (2, "child_added", Some("a".to_string())),
                (2, "child_added", Some("b".to_string())),
                (4, "child_changed", Some("a".to_string())),
                (5, "child_changed", Some("b".to_string())),
            ]
        );
        assert_eq!(replayer.stats().acks, 1);
        assert_eq!(
            replayer.records()[3].to_text(),
            "   5 kids child_changed / key=b 9 prev=a"
        );
    }

    #[test]
    fn ordered_and_limited_listen() {
        let file = script(&[
            r#"{"step": "listen", "id": "top", "path": "/", "kinds": ["child_added"], "order_by": "value", "limit_to_last": 1}"#,
            r#"{"step": "server", "operation": {"op": "overwrite", "path": "/", "data": {"x": 3, "y": 7, "z": 5}}}"#,
        ]);
        let records = replay_file(&file).unwrap().records().to_vec();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key.as_deref(), Some("y"));
        assert_eq!(records[0].data, serde_json::json!(7));
    }

    #[test]
    fn bad_lines_report_their_number() {
        let file = script(&[
            r#"{"step": "listen", "id": "v", "path": "/"}"#,
            r#"{"step": "teleport"}"#,
        ]);
        assert!(matches!(
            replay_file(&file),
            Err(ReplayError::Parse { line: 2, .. })
        ));

        let file = script(&[r#"{"step": "unlisten", "id": "ghost"}"#]);
        assert!(matches!(
            replay_file(&file),
            Err(ReplayError::Parse { line: 1, .. })
        ));

        let file = script(&[
            r#"{"step": "server", "operation": {"op": "ack_user_write", "write_id": 3}}"#,
        ]);
        assert!(matches!(
            replay_file(&file),
            Err(ReplayError::Client { line: 1, .. })
        ));
    }

    #[test]
    fn update_writes_nested_children() {
        let file = script(&[
            r#"{"step": "listen", "id": "v", "path": "/", "kinds": ["value"]}"#,
            r#"{"step": "server", "operation": {"op": "listen_complete", "path": "/"}}"#,
            r#"{"step": "update", "path": "/", "children": {"a/b": 1, "c": "x"}}"#,
        ]);
        let records = replay_file(&file).unwrap().records().to_vec();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].data, serde_json::json!({"a": {"b": 1}, "c": "x"}));
    }
}
