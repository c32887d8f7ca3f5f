use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a structured failure. Every module error maps onto exactly one
/// kind so callers (HTTP views, the CLI, remote peers) can branch on it
/// without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PathNotFound,
    AlreadyExists,
    NotAFile,
    NotEmpty,
    InvalidPath,
    InvalidPattern,
    InvalidRoot,
    NodeNotFound,
    NodeInactive,
    ConflictingNode,
    NotMaster,
    RemoteCallFailed,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PathNotFound => "path_not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::NotAFile => "not_a_file",
            ErrorKind::NotEmpty => "not_empty",
            ErrorKind::InvalidPath => "invalid_path",
            ErrorKind::InvalidPattern => "invalid_pattern",
            ErrorKind::InvalidRoot => "invalid_root",
            ErrorKind::NodeNotFound => "node_not_found",
            ErrorKind::NodeInactive => "node_inactive",
            ErrorKind::ConflictingNode => "conflicting_node",
            ErrorKind::NotMaster => "not_master",
            ErrorKind::RemoteCallFailed => "remote_call_failed",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire form of a failure: a kind plus a human readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: ErrorKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
