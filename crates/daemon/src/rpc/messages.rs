//! Operation table shared by every RPC driver.
//!
//! Only the operations listed here are remotely callable. Adding one means
//! adding a `Request` variant, its `Operation`, and an arm in
//! `NodeManager::execute_blocking`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use common::fs::{DirEntry, DiskUsage};
use common::node::{Node, NodeReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListNodes,
    GetNode,
    Ls,
    Mkdir,
    Rm,
    Rename,
    DiskUsage,
    NodeUpdate,
    Find,
    GetSearchHistory,
    GetAbsPath,
    FileSize,
    EnsureParentDir,
    IsFile,
    GetFileContent,
}

impl Operation {
    pub const ALL: [Operation; 15] = [
        Operation::ListNodes,
        Operation::GetNode,
        Operation::Ls,
        Operation::Mkdir,
        Operation::Rm,
        Operation::Rename,
        Operation::DiskUsage,
        Operation::NodeUpdate,
        Operation::Find,
        Operation::GetSearchHistory,
        Operation::GetAbsPath,
        Operation::FileSize,
        Operation::EnsureParentDir,
        Operation::IsFile,
        Operation::GetFileContent,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListNodes => "list_nodes",
            Operation::GetNode => "get_node",
            Operation::Ls => "ls",
            Operation::Mkdir => "mkdir",
            Operation::Rm => "rm",
            Operation::Rename => "rename",
            Operation::DiskUsage => "disk_usage",
            Operation::NodeUpdate => "node_update",
            Operation::Find => "find",
            Operation::GetSearchHistory => "get_search_history",
            Operation::GetAbsPath => "get_abs_path",
            Operation::FileSize => "file_size",
            Operation::EnsureParentDir => "ensure_parent_dir",
            Operation::IsFile => "is_file",
            Operation::GetFileContent => "get_file_content",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .find(|op| op.name() == s)
            .copied()
            .ok_or_else(|| format!("unknown operation: {s}"))
    }
}

/// A call against a node manager. Serialized externally tagged so both
/// the JSON and the bincode drivers can carry it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    ListNodes,
    GetNode { hostname: String },
    Ls { path: String, show_all: bool },
    Mkdir { path: String },
    Rm { path: String, force: bool },
    Rename { path: String, new_name: String },
    DiskUsage,
    NodeUpdate { node: Node },
    Find { pattern: String },
    GetSearchHistory,
    GetAbsPath { path: String },
    FileSize { path: String },
    EnsureParentDir { path: String },
    IsFile { path: String },
    GetFileContent { path: String },
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::ListNodes => Operation::ListNodes,
            Request::GetNode { .. } => Operation::GetNode,
            Request::Ls { .. } => Operation::Ls,
            Request::Mkdir { .. } => Operation::Mkdir,
            Request::Rm { .. } => Operation::Rm,
            Request::Rename { .. } => Operation::Rename,
            Request::DiskUsage => Operation::DiskUsage,
            Request::NodeUpdate { .. } => Operation::NodeUpdate,
            Request::Find { .. } => Operation::Find,
            Request::GetSearchHistory => Operation::GetSearchHistory,
            Request::GetAbsPath { .. } => Operation::GetAbsPath,
            Request::FileSize { .. } => Operation::FileSize,
            Request::EnsureParentDir { .. } => Operation::EnsureParentDir,
            Request::IsFile { .. } => Operation::IsFile,
            Request::GetFileContent { .. } => Operation::GetFileContent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Done,
    Nodes(Vec<NodeReport>),
    Node(Option<Node>),
    Entries(Vec<DirEntry>),
    DiskUsage(DiskUsage),
    History(Vec<String>),
    Path(String),
    Size(u64),
    Flag(bool),
    Text(String),
}

impl Response {
    /// Short variant name used in mismatch errors.
    pub fn variant(&self) -> &'static str {
        match self {
            Response::Done => "done",
            Response::Nodes(_) => "nodes",
            Response::Node(_) => "node",
            Response::Entries(_) => "entries",
            Response::DiskUsage(_) => "disk_usage",
            Response::History(_) => "history",
            Response::Path(_) => "path",
            Response::Size(_) => "size",
            Response::Flag(_) => "flag",
            Response::Text(_) => "text",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>().unwrap(), op);
        }
        assert!("shutdown".parse::<Operation>().is_err());
    }

    #[test]
    fn test_request_json_shape() {
        let request = Request::Ls {
            path: "/docs".into(),
            show_all: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"ls": {"path": "/docs", "show_all": true}}));

        let json = serde_json::to_value(Request::DiskUsage).unwrap();
        assert_eq!(json, serde_json::json!("disk_usage"));
    }

    #[test]
    fn test_request_bincode_carries_node() {
        let mut node = Node::new("worker", common::node::Role::Slave, "10.0.0.3")
            .with_transport("tcp://10.0.0.3:9527");
        node.last_heartbeat = Some(chrono::Utc::now());
        let request = Request::NodeUpdate { node };

        let bytes = bincode::serialize(&request).unwrap();
        let decoded: Request = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.operation(), Operation::NodeUpdate);
    }
}
