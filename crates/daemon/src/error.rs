use common::error::{ErrorKind, Fault};
use common::fs::FsError;
use common::node::RegistryError;

use crate::rpc::RpcError;

/// Failure of a manager operation, local or forwarded.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("node inactive: {0}")]
    NodeInactive(String),
    #[error("{0} is not the master node")]
    NotMaster(String),
    #[error("remote call failed: {0}")]
    Rpc(#[from] RpcError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl NodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NodeError::Fs(e) => e.kind(),
            NodeError::Registry(e) => e.kind(),
            NodeError::NodeNotFound(_) => ErrorKind::NodeNotFound,
            NodeError::NodeInactive(_) => ErrorKind::NodeInactive,
            NodeError::NotMaster(_) => ErrorKind::NotMaster,
            NodeError::Rpc(_) => ErrorKind::RemoteCallFailed,
            NodeError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Kind reported by the remote side when a forwarded call faulted.
    pub fn remote_kind(&self) -> Option<ErrorKind> {
        match self {
            NodeError::Rpc(RpcError::Fault(fault)) => Some(fault.kind),
            _ => None,
        }
    }

    /// The kind that best describes what went wrong: the remote kind for
    /// forwarded faults, otherwise [`NodeError::kind`].
    pub fn effective_kind(&self) -> ErrorKind {
        self.remote_kind().unwrap_or_else(|| self.kind())
    }

    pub fn to_fault(&self) -> Fault {
        Fault::new(self.kind(), self.to_string())
    }
}

impl From<NodeError> for Fault {
    fn from(err: NodeError) -> Self {
        err.to_fault()
    }
}
