//! Node startup and shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use common::node::Role;

use crate::error::NodeError;
use crate::manager::{heartbeat_loop, HeartbeatConfig, ManagerApi, NodeManager};
use crate::rpc::{advertise, DriverRegistry, RemoteManager, RpcError, RpcServer};
use crate::ServiceConfig;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("rpc server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

/// Cloneable trigger for stopping a running service from elsewhere.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// A node with its RPC server and heartbeat task running.
pub struct RunningService {
    manager: NodeManager,
    server: Arc<dyn RpcServer>,
    transport: String,
    server_task: Option<JoinHandle<Result<(), RpcError>>>,
    heartbeat: JoinHandle<()>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl RunningService {
    pub fn manager(&self) -> &NodeManager {
        &self.manager
    }

    /// The transport this node advertises in its heartbeats.
    pub fn transport(&self) -> &str {
        &self.transport
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown.clone(),
        }
    }

    /// Resolves once a [`ShutdownHandle`] fired.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.shutdown.subscribe();
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Stop the heartbeat, then the server, and wait for both. In-flight
    /// calls are allowed to finish.
    pub async fn shutdown(self) -> Result<(), ServiceError> {
        self.shutdown.send_replace(true);
        self.heartbeat.await?;

        self.server.stop();
        match self.server_task {
            Some(task) => task.await??,
            None => self.server.stopped().await,
        }
        tracing::info!(hostname = %self.manager.hostname(), "service stopped");
        Ok(())
    }
}

/// Build the manager, bind and start the RPC server, and start the
/// heartbeat task.
///
/// The master serves in the background and heartbeats into its own
/// registry. A slave runs its blocking server loop on a dedicated task
/// and heartbeats to `master_rpc`.
pub async fn start_service(
    config: &ServiceConfig,
    drivers: &DriverRegistry,
) -> Result<RunningService, ServiceError> {
    let manager = NodeManager::new(&config.root, config.identity(), config.heartbeat_alive)?;
    let server = drivers.server(
        &config.rpc_driver,
        Arc::new(manager.clone()),
        &config.rpc_host,
        config.rpc_port,
    )?;
    let transport = advertise(server.transport(), &config.rpc_host, &config.ip);
    manager.set_transport(&transport);
    tracing::info!(
        hostname = %manager.hostname(),
        role = %config.role,
        root = %manager.root().display(),
        transport = %transport,
        "starting node"
    );

    let (target, server_task): (Arc<dyn ManagerApi>, _) = match config.role {
        Role::Master => {
            server.start(true).await?;
            (Arc::new(manager.clone()) as Arc<dyn ManagerApi>, None)
        }
        Role::Slave => {
            let master = RemoteManager::connect(
                drivers,
                &config.rpc_driver,
                &config.master_rpc,
                config.rpc_timeout,
            )?;
            let serving = server.clone();
            let task = tokio::spawn(async move { serving.start(false).await });
            (Arc::new(master) as Arc<dyn ManagerApi>, Some(task))
        }
    };

    let shutdown = Arc::new(watch::channel(false).0);
    let heartbeat = tokio::spawn(heartbeat_loop(
        manager.clone(),
        target,
        HeartbeatConfig {
            interval: config.heartbeat_interval,
            evict_after: match config.role {
                Role::Master => config.node_evict_after,
                Role::Slave => None,
            },
        },
        shutdown.subscribe(),
    ));

    Ok(RunningService {
        manager,
        server,
        transport,
        server_task,
        heartbeat,
        shutdown,
    })
}

/// Run a node until SIGINT/SIGTERM.
pub async fn spawn_service(config: &ServiceConfig) -> Result<(), ServiceError> {
    let drivers = DriverRegistry::with_defaults();
    let service = start_service(config, &drivers).await?;

    tokio::select! {
        result = shutdown_signal() => result?,
        _ = service.wait_for_shutdown() => {}
    }
    tracing::info!("shutdown requested");
    service.shutdown().await
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<(), std::io::Error> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<(), std::io::Error> {
    tokio::signal::ctrl_c().await
}
