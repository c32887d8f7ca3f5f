//! Local-or-remote execution of manager operations by hostname.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use common::node::{NodeRegistry, NodeReport, NodeStatus};

use crate::error::NodeError;
use crate::manager::ManagerApi;
use crate::rpc::{ClientFactory, RemoteManager, Request, Response, RpcClient};

/// Where the dispatcher looks hosts up. A lookup returns the node with
/// its liveness as judged by the registry owner.
#[async_trait::async_trait]
pub trait NodeDirectory: Send + Sync {
    async fn lookup(
        &self,
        hostname: &str,
        alive: Duration,
    ) -> Result<Option<NodeReport>, NodeError>;
}

/// In-process registry: liveness is computed here, against `alive`.
#[async_trait::async_trait]
impl NodeDirectory for NodeRegistry {
    async fn lookup(
        &self,
        hostname: &str,
        alive: Duration,
    ) -> Result<Option<NodeReport>, NodeError> {
        Ok(self.get(hostname).map(|node| NodeReport {
            status: node.status(Utc::now(), alive),
            node,
        }))
    }
}

/// Lookups answered by the master over RPC. The status comes from the
/// master's own listing; the caller's `alive` plays no part.
#[async_trait::async_trait]
impl NodeDirectory for RemoteManager {
    async fn lookup(
        &self,
        hostname: &str,
        _alive: Duration,
    ) -> Result<Option<NodeReport>, NodeError> {
        Ok(self
            .list_nodes()
            .await?
            .into_iter()
            .find(|report| report.node.hostname == hostname))
    }
}

/// One RPC client per transport string, created on first use.
pub struct ClientCache {
    factory: ClientFactory,
    timeout: Duration,
    clients: Mutex<HashMap<String, Arc<dyn RpcClient>>>,
}

impl ClientCache {
    pub fn new(factory: ClientFactory, timeout: Duration) -> Self {
        Self {
            factory,
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_connect(&self, transport: &str) -> Result<Arc<dyn RpcClient>, NodeError> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(transport) {
            return Ok(client.clone());
        }
        tracing::debug!(transport, "creating rpc client");
        let client = (self.factory)(transport, self.timeout)?;
        clients.insert(transport.to_string(), client.clone());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}

/// Runs an operation on the local manager or forwards it to the named
/// host.
///
/// No retries: a failed forward is returned to the caller as is.
pub struct Dispatcher {
    hostname: Option<String>,
    local: Arc<dyn ManagerApi>,
    directory: Arc<dyn NodeDirectory>,
    clients: ClientCache,
    alive: Duration,
}

impl Dispatcher {
    /// `hostname` names the node `local` stands for; calls addressed to it
    /// (or to no host at all) never leave the process.
    pub fn new(
        hostname: Option<String>,
        local: Arc<dyn ManagerApi>,
        directory: Arc<dyn NodeDirectory>,
        clients: ClientCache,
        alive: Duration,
    ) -> Self {
        Self {
            hostname,
            local,
            directory,
            clients,
            alive,
        }
    }

    pub fn clients(&self) -> &ClientCache {
        &self.clients
    }

    fn is_local(&self, host: Option<&str>) -> bool {
        match host {
            None | Some("") => true,
            Some(host) => self.hostname.as_deref() == Some(host),
        }
    }

    #[tracing::instrument(skip(self, request), fields(op = %request.operation()))]
    pub async fn invoke(&self, host: Option<&str>, request: Request) -> Result<Response, NodeError> {
        let host = match host {
            Some(host) if !self.is_local(Some(host)) => host,
            _ => return self.local.call(request).await,
        };

        let report = self
            .directory
            .lookup(host, self.alive)
            .await?
            .ok_or_else(|| NodeError::NodeNotFound(host.to_string()))?;
        if report.status != NodeStatus::Active {
            return Err(NodeError::NodeInactive(host.to_string()));
        }
        let transport = report
            .node
            .transport
            .as_deref()
            .ok_or_else(|| NodeError::NodeInactive(format!("{host} has no transport")))?;

        let client = self.clients.get_or_connect(transport)?;
        tracing::debug!(host, transport, "forwarding call");
        Ok(client.call(request).await?)
    }

    /// Typed operations bound to `host`.
    pub fn on<'a>(&'a self, host: Option<&'a str>) -> HostCall<'a> {
        HostCall {
            dispatcher: self,
            host,
        }
    }
}

pub struct HostCall<'a> {
    dispatcher: &'a Dispatcher,
    host: Option<&'a str>,
}

#[async_trait::async_trait]
impl ManagerApi for HostCall<'_> {
    async fn call(&self, request: Request) -> Result<Response, NodeError> {
        self.dispatcher.invoke(self.host, request).await
    }
}
