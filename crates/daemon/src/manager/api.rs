use common::fs::{DirEntry, DiskUsage};
use common::node::{Node, NodeReport};

use crate::error::NodeError;
use crate::rpc::{Request, Response, RpcError};

/// The manager operation set, callable the same way whether the manager
/// is local, behind an RPC client, or picked per host by a dispatcher.
///
/// Implementors provide [`ManagerApi::call`]; the typed operations build
/// the request and unpack the matching response.
#[async_trait::async_trait]
pub trait ManagerApi: Send + Sync {
    async fn call(&self, request: Request) -> Result<Response, NodeError>;

    async fn list_nodes(&self) -> Result<Vec<NodeReport>, NodeError> {
        match self.call(Request::ListNodes).await? {
            Response::Nodes(nodes) => Ok(nodes),
            other => Err(unexpected("list_nodes", other)),
        }
    }

    async fn get_node(&self, hostname: &str) -> Result<Option<Node>, NodeError> {
        let request = Request::GetNode {
            hostname: hostname.to_string(),
        };
        match self.call(request).await? {
            Response::Node(node) => Ok(node),
            other => Err(unexpected("get_node", other)),
        }
    }

    async fn ls(&self, path: &str, show_all: bool) -> Result<Vec<DirEntry>, NodeError> {
        let request = Request::Ls {
            path: path.to_string(),
            show_all,
        };
        match self.call(request).await? {
            Response::Entries(entries) => Ok(entries),
            other => Err(unexpected("ls", other)),
        }
    }

    async fn mkdir(&self, path: &str) -> Result<(), NodeError> {
        let request = Request::Mkdir {
            path: path.to_string(),
        };
        done("mkdir", self.call(request).await?)
    }

    async fn rm(&self, path: &str, force: bool) -> Result<(), NodeError> {
        let request = Request::Rm {
            path: path.to_string(),
            force,
        };
        done("rm", self.call(request).await?)
    }

    async fn rename(&self, path: &str, new_name: &str) -> Result<(), NodeError> {
        let request = Request::Rename {
            path: path.to_string(),
            new_name: new_name.to_string(),
        };
        done("rename", self.call(request).await?)
    }

    async fn disk_usage(&self) -> Result<DiskUsage, NodeError> {
        match self.call(Request::DiskUsage).await? {
            Response::DiskUsage(usage) => Ok(usage),
            other => Err(unexpected("disk_usage", other)),
        }
    }

    async fn node_update(&self, node: Node) -> Result<(), NodeError> {
        done("node_update", self.call(Request::NodeUpdate { node }).await?)
    }

    async fn find(&self, pattern: &str) -> Result<Vec<DirEntry>, NodeError> {
        let request = Request::Find {
            pattern: pattern.to_string(),
        };
        match self.call(request).await? {
            Response::Entries(entries) => Ok(entries),
            other => Err(unexpected("find", other)),
        }
    }

    async fn get_search_history(&self) -> Result<Vec<String>, NodeError> {
        match self.call(Request::GetSearchHistory).await? {
            Response::History(history) => Ok(history),
            other => Err(unexpected("get_search_history", other)),
        }
    }

    async fn get_abs_path(&self, path: &str) -> Result<String, NodeError> {
        let request = Request::GetAbsPath {
            path: path.to_string(),
        };
        match self.call(request).await? {
            Response::Path(path) => Ok(path),
            other => Err(unexpected("get_abs_path", other)),
        }
    }

    async fn file_size(&self, path: &str) -> Result<u64, NodeError> {
        let request = Request::FileSize {
            path: path.to_string(),
        };
        match self.call(request).await? {
            Response::Size(size) => Ok(size),
            other => Err(unexpected("file_size", other)),
        }
    }

    async fn ensure_parent_dir(&self, path: &str) -> Result<(), NodeError> {
        let request = Request::EnsureParentDir {
            path: path.to_string(),
        };
        done("ensure_parent_dir", self.call(request).await?)
    }

    async fn is_file(&self, path: &str) -> Result<bool, NodeError> {
        let request = Request::IsFile {
            path: path.to_string(),
        };
        match self.call(request).await? {
            Response::Flag(flag) => Ok(flag),
            other => Err(unexpected("is_file", other)),
        }
    }

    async fn get_file_content(&self, path: &str) -> Result<String, NodeError> {
        let request = Request::GetFileContent {
            path: path.to_string(),
        };
        match self.call(request).await? {
            Response::Text(text) => Ok(text),
            other => Err(unexpected("get_file_content", other)),
        }
    }
}

fn done(operation: &'static str, response: Response) -> Result<(), NodeError> {
    match response {
        Response::Done => Ok(()),
        other => Err(unexpected(operation, other)),
    }
}

fn unexpected(operation: &'static str, response: Response) -> NodeError {
    NodeError::Rpc(RpcError::UnexpectedResponse {
        operation,
        response: response.variant().to_string(),
    })
}
