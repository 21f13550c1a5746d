//! Operations applied to the sync tree.

use crate::compound_write::CompoundWrite;
use canopy_snap::{ChildKey, Node, Path};

/// Where an operation originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationSource {
    /// A local write.
    User,
    /// Data pushed by the server.
    Server,
}

/// A change to apply to the views below a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Replace the node at `path`.
    Overwrite {
        /// Origin.
        source: OperationSource,
        /// Location, relative to the receiver.
        path: Path,
        /// New data.
        snap: Node,
    },
    /// Replace several locations below `path`.
    Merge {
        /// Origin.
        source: OperationSource,
        /// Location, relative to the receiver.
        path: Path,
        /// New data, relative to `path`.
        children: CompoundWrite,
    },
    /// The server accepted or rejected a local write.
    AckUserWrite {
        /// Location of the write, relative to the receiver.
        path: Path,
        /// Whether the write was rejected.
        revert: bool,
        /// The written data, relative to `path`.
        write: CompoundWrite,
    },
    /// The server finished sending the initial data for a listen.
    ListenComplete {
        /// Location, relative to the receiver.
        path: Path,
    },
}

impl Operation {
    /// The location this operation touches.
    pub fn path(&self) -> &Path {
        match self {
            Operation::Overwrite { path, .. }
            | Operation::Merge { path, .. }
            | Operation::AckUserWrite { path, .. }
            | Operation::ListenComplete { path } => path,
        }
    }

    /// The origin of the operation.
    pub fn source(&self) -> OperationSource {
        match self {
            Operation::Overwrite { source, .. } | Operation::Merge { source, .. } => *source,
            Operation::AckUserWrite { .. } | Operation::ListenComplete { .. } => {
                OperationSource::Server
            }
        }
    }

    /// The same operation seen from the child `key` of the receiver.
    ///
    /// Returns `None` when the operation does not reach that child.
    pub fn for_child(&self, key: &ChildKey) -> Option<Operation> {
        match self.path().front() {
            Some(front) if front == key => Some(self.with_path(self.path().pop_front())),
            Some(_) => None,
            None => self.descend_root(key),
        }
    }

    /// The same operation seen from `base`, which must contain or be
    /// contained in the operation path.
    pub fn relative_to(&self, base: &Path) -> Option<Operation> {
        if let Some(rel) = self.path().relative_to(base) {
            return Some(self.with_path(rel));
        }
        let below = base.relative_to(self.path())?;
        let mut op = self.with_path(Path::root());
        for key in below.iter() {
            op = op.for_child(key)?;
        }
        Some(op)
    }

    fn with_path(&self, path: Path) -> Operation {
        match self {
            Operation::Overwrite { source, snap, .. } => Operation::Overwrite {
                source: *source,
                path,
                snap: snap.clone(),
            },
            Operation::Merge {
                source, children, ..
            } => Operation::Merge {
                source: *source,
                path,
                children: children.clone(),
            },
            Operation::AckUserWrite { revert, write, .. } => Operation::AckUserWrite {
                path,
                revert: *revert,
                write: write.clone(),
            },
            Operation::ListenComplete { .. } => Operation::ListenComplete { path },
        }
    }

    fn descend_root(&self, key: &ChildKey) -> Option<Operation> {
        let child_path = Path::from(key.clone());
        match self {
            Operation::Overwrite { source, snap, .. } => Some(Operation::Overwrite {
                source: *source,
                path: Path::root(),
                snap: snap.immediate_child(key),
            }),
            Operation::Merge { source, children, .. } => {
                let child = children.child_compound_write(&child_path);
                if child.is_empty() {
                    None
                } else if let Some(root) = child.root_write() {
                    Some(Operation::Overwrite {
                        source: *source,
                        path: Path::root(),
                        snap: root.clone(),
                    })
                } else {
                    Some(Operation::Merge {
                        source: *source,
                        path: Path::root(),
                        children: child,
                    })
                }
            }
            Operation::AckUserWrite { revert, write, .. } => {
                let child = write.child_compound_write(&child_path);
                (!child.is_empty()).then(|| Operation::AckUserWrite {
                    path: Path::root(),
                    revert: *revert,
                    write: child,
                })
            }
            Operation::ListenComplete { .. } => Some(Operation::ListenComplete {
                path: Path::root(),
            }),
        }
    }
}
