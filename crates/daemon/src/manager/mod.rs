//! The per-node manager: filesystem operations over the node root, the
//! search history, and on the master the node registry.

mod api;
mod heartbeat;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use common::error::Fault;
use common::fs::{self, DirEntry, DiskUsage, FsError, LogicalPath, SearchHistory};
use common::node::{Node, NodeRegistry, NodeReport, Role};

use crate::error::NodeError;
use crate::rpc::{Request, Response, RpcHandler};

pub use api::ManagerApi;
pub use heartbeat::{heartbeat_loop, HeartbeatConfig};

/// Explicitly constructed manager handle. Clones share state.
#[derive(Clone)]
pub struct NodeManager {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    identity: Node,
    transport: RwLock<Option<String>>,
    registry: Option<NodeRegistry>,
    history: Mutex<SearchHistory>,
    alive: Duration,
}

impl std::fmt::Debug for NodeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeManager")
            .field("hostname", &self.inner.identity.hostname)
            .field("role", &self.inner.identity.role)
            .field("root", &self.inner.root)
            .finish()
    }
}

impl NodeManager {
    /// Build a manager serving `root`. The root must be an existing
    /// directory; it is canonicalized once here. A master gets an empty
    /// registry.
    pub fn new(root: &Path, identity: Node, alive: Duration) -> Result<Self, NodeError> {
        let invalid = |reason: String| FsError::InvalidRoot {
            root: root.display().to_string(),
            reason,
        };
        let root = root.canonicalize().map_err(|e| invalid(e.to_string()))?;
        if !root.is_dir() {
            return Err(invalid("not a directory".to_string()).into());
        }

        let registry = match identity.role {
            Role::Master => Some(NodeRegistry::new()),
            Role::Slave => None,
        };
        let transport = identity.transport.clone();

        Ok(Self {
            inner: Arc::new(Inner {
                root,
                identity,
                transport: RwLock::new(transport),
                registry,
                history: Mutex::new(SearchHistory::default()),
                alive,
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn hostname(&self) -> &str {
        &self.inner.identity.hostname
    }

    pub fn role(&self) -> Role {
        self.inner.identity.role
    }

    pub fn alive_threshold(&self) -> Duration {
        self.inner.alive
    }

    pub fn registry(&self) -> Option<&NodeRegistry> {
        self.inner.registry.as_ref()
    }

    /// Record the address of this node's RPC server once it is bound.
    pub fn set_transport(&self, transport: &str) {
        *self.inner.transport.write() = Some(transport.to_string());
    }

    /// Current identity as sent in heartbeats.
    pub fn snapshot(&self) -> Node {
        let mut node = self.inner.identity.clone();
        node.transport = self.inner.transport.read().clone();
        node.last_heartbeat = None;
        node
    }

    fn path(&self, logical: &str) -> LogicalPath {
        LogicalPath::new(self.inner.root.clone(), logical)
    }

    fn master_registry(&self) -> Result<&NodeRegistry, NodeError> {
        self.inner
            .registry
            .as_ref()
            .ok_or_else(|| NodeError::NotMaster(self.hostname().to_string()))
    }

    pub fn ls(&self, path: &str, show_all: bool) -> Result<Vec<DirEntry>, NodeError> {
        Ok(self.path(path).list(show_all)?)
    }

    pub fn mkdir(&self, path: &str) -> Result<(), NodeError> {
        tracing::debug!(path, "mkdir");
        Ok(self.path(path).mkdir()?)
    }

    pub fn rm(&self, path: &str, force: bool) -> Result<(), NodeError> {
        tracing::debug!(path, force, "rm");
        Ok(self.path(path).delete(force)?)
    }

    pub fn rename(&self, path: &str, new_name: &str) -> Result<(), NodeError> {
        tracing::debug!(path, new_name, "rename");
        self.path(path).rename(new_name)?;
        Ok(())
    }

    pub fn disk_usage(&self) -> Result<DiskUsage, NodeError> {
        let usage = fs::disk_usage(&self.inner.root)?;
        tracing::debug!(?usage, "disk usage");
        Ok(usage)
    }

    /// Search the whole root; a successful search is remembered.
    pub fn find(&self, pattern: &str) -> Result<Vec<DirEntry>, NodeError> {
        let found = fs::find(&self.inner.root, pattern)?;
        self.inner.history.lock().append(pattern);
        Ok(found)
    }

    pub fn search_history(&self) -> Vec<String> {
        self.inner.history.lock().all()
    }

    pub fn abs_path(&self, path: &str) -> Result<String, NodeError> {
        let lp = self.path(path);
        Ok(lp.absolute_path()?.display().to_string())
    }

    pub fn file_size(&self, path: &str) -> Result<u64, NodeError> {
        Ok(self.path(path).size()?)
    }

    pub fn ensure_parent_dir(&self, path: &str) -> Result<(), NodeError> {
        Ok(self.path(path).ensure_parent_exists()?)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.path(path).is_file()
    }

    pub fn read_text(&self, path: &str) -> Result<String, NodeError> {
        Ok(self.path(path).read_text()?)
    }

    pub fn list_nodes(&self) -> Result<Vec<NodeReport>, NodeError> {
        Ok(self.master_registry()?.list(Utc::now(), self.inner.alive))
    }

    pub fn get_node(&self, hostname: &str) -> Result<Option<Node>, NodeError> {
        Ok(self.master_registry()?.get(hostname))
    }

    /// Heartbeat receipt.
    pub fn node_update(&self, node: Node) -> Result<(), NodeError> {
        let registry = self.master_registry()?;
        let hostname = node.hostname.clone();
        match registry.report_heartbeat(node) {
            Ok(_) => {
                tracing::debug!(hostname = %hostname, "heartbeat recorded");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(hostname = %hostname, error = %e, "rejected heartbeat");
                Err(e.into())
            }
        }
    }

    /// Drop nodes silent for longer than `window`. Master only; never
    /// evicts this node.
    pub fn evict_silent(&self, window: Duration) -> Vec<String> {
        match &self.inner.registry {
            Some(registry) => registry.evict_silent(Utc::now(), window, self.hostname()),
            None => Vec::new(),
        }
    }

    /// The operation table. Every remotely callable operation has exactly
    /// one arm here.
    pub fn execute_blocking(&self, request: Request) -> Result<Response, NodeError> {
        Ok(match request {
            Request::ListNodes => Response::Nodes(self.list_nodes()?),
            Request::GetNode { hostname } => Response::Node(self.get_node(&hostname)?),
            Request::Ls { path, show_all } => Response::Entries(self.ls(&path, show_all)?),
            Request::Mkdir { path } => {
                self.mkdir(&path)?;
                Response::Done
            }
            Request::Rm { path, force } => {
                self.rm(&path, force)?;
                Response::Done
            }
            Request::Rename { path, new_name } => {
                self.rename(&path, &new_name)?;
                Response::Done
            }
            Request::DiskUsage => Response::DiskUsage(self.disk_usage()?),
            Request::NodeUpdate { node } => {
                self.node_update(node)?;
                Response::Done
            }
            Request::Find { pattern } => Response::Entries(self.find(&pattern)?),
            Request::GetSearchHistory => Response::History(self.search_history()),
            Request::GetAbsPath { path } => Response::Path(self.abs_path(&path)?),
            Request::FileSize { path } => Response::Size(self.file_size(&path)?),
            Request::EnsureParentDir { path } => {
                self.ensure_parent_dir(&path)?;
                Response::Done
            }
            Request::IsFile { path } => Response::Flag(self.is_file(&path)),
            Request::GetFileContent { path } => Response::Text(self.read_text(&path)?),
        })
    }

    /// Run one operation on the blocking pool.
    pub async fn execute(&self, request: Request) -> Result<Response, NodeError> {
        let manager = self.clone();
        let operation = request.operation();
        tokio::task::spawn_blocking(move || manager.execute_blocking(request))
            .await
            .map_err(|e| NodeError::Internal(format!("{operation} task failed: {e}")))?
    }
}

#[async_trait::async_trait]
impl ManagerApi for NodeManager {
    async fn call(&self, request: Request) -> Result<Response, NodeError> {
        self.execute(request).await
    }
}

#[async_trait::async_trait]
impl RpcHandler for NodeManager {
    async fn handle(&self, request: Request) -> Result<Response, Fault> {
        let operation = request.operation();
        self.execute(request).await.map_err(|e| {
            tracing::debug!(%operation, error = %e, "operation failed");
            e.to_fault()
        })
    }
}
