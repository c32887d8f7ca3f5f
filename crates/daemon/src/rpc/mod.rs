//! Pluggable RPC transport.
//!
//! A driver is a server/client pair registered under a name in the
//! [`DriverRegistry`]. Servers expose an [`RpcHandler`] (normally a
//! `NodeManager`) and advertise an opaque transport string; clients are
//! built from that string and speak the same [`Request`]/[`Response`]
//! table, so callers never depend on the wire format.

mod binary;
mod error;
mod json_http;
mod messages;
mod remote;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use common::error::Fault;

pub use binary::{BinaryRpcClient, BinaryRpcServer, BINRPC_DRIVER};
pub use error::RpcError;
pub use json_http::{HttpRpcClient, HttpRpcServer, JSONRPC_DRIVER};
pub use messages::{Operation, Request, Response};
pub use remote::RemoteManager;

pub const DEFAULT_DRIVER: &str = JSONRPC_DRIVER;

/// Executes one decoded request. Failures come back as a [`Fault`] so
/// they can cross the wire.
#[async_trait::async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Result<Response, Fault>;
}

#[async_trait::async_trait]
pub trait RpcServer: Send + Sync {
    /// Address a client needs to reach this server.
    fn transport(&self) -> &str;

    /// Serve requests. With `daemon` set the serve loop runs on a
    /// background task and this returns once it is spawned; otherwise it
    /// returns only after [`RpcServer::stop`] and the in-flight calls have
    /// finished.
    async fn start(&self, daemon: bool) -> Result<(), RpcError>;

    /// Ask the serve loop to stop accepting calls. Never blocks, may be
    /// called from any task or thread.
    fn stop(&self);

    /// Resolves once a started serve loop has fully returned.
    async fn stopped(&self);
}

#[async_trait::async_trait]
pub trait RpcClient: Send + Sync {
    fn transport(&self) -> &str;

    async fn call(&self, request: Request) -> Result<Response, RpcError>;
}

pub type ServerFactory =
    Arc<dyn Fn(Arc<dyn RpcHandler>, &str, u16) -> Result<Arc<dyn RpcServer>, RpcError> + Send + Sync>;
pub type ClientFactory =
    Arc<dyn Fn(&str, Duration) -> Result<Arc<dyn RpcClient>, RpcError> + Send + Sync>;

#[derive(Clone)]
struct Driver {
    server: ServerFactory,
    client: ClientFactory,
}

/// Named server/client factory pairs.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Driver>,
}

impl DriverRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `jsonrpc` (JSON over HTTP) and `binrpc` (bincode over TCP).
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(JSONRPC_DRIVER, Arc::new(http_server), Arc::new(http_client));
        registry.register(BINRPC_DRIVER, Arc::new(binary_server), Arc::new(binary_client));
        registry
    }

    pub fn register(&mut self, name: &str, server: ServerFactory, client: ClientFactory) {
        self.drivers
            .insert(name.to_string(), Driver { server, client });
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn driver(&self, name: &str) -> Result<&Driver, RpcError> {
        self.drivers
            .get(name)
            .ok_or_else(|| RpcError::UnknownDriver(name.to_string()))
    }

    pub fn server(
        &self,
        name: &str,
        handler: Arc<dyn RpcHandler>,
        host: &str,
        port: u16,
    ) -> Result<Arc<dyn RpcServer>, RpcError> {
        (self.driver(name)?.server)(handler, host, port)
    }

    pub fn client(
        &self,
        name: &str,
        transport: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn RpcClient>, RpcError> {
        (self.driver(name)?.client)(transport, timeout)
    }

    pub fn client_factory(&self, name: &str) -> Result<ClientFactory, RpcError> {
        Ok(self.driver(name)?.client.clone())
    }
}

fn http_server(
    handler: Arc<dyn RpcHandler>,
    host: &str,
    port: u16,
) -> Result<Arc<dyn RpcServer>, RpcError> {
    Ok(Arc::new(HttpRpcServer::bind(handler, host, port)?))
}

fn http_client(transport: &str, timeout: Duration) -> Result<Arc<dyn RpcClient>, RpcError> {
    Ok(Arc::new(HttpRpcClient::new(transport, timeout)?))
}

fn binary_server(
    handler: Arc<dyn RpcHandler>,
    host: &str,
    port: u16,
) -> Result<Arc<dyn RpcServer>, RpcError> {
    Ok(Arc::new(BinaryRpcServer::bind(handler, host, port)?))
}

fn binary_client(transport: &str, timeout: Duration) -> Result<Arc<dyn RpcClient>, RpcError> {
    Ok(Arc::new(BinaryRpcClient::new(transport, timeout)?))
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

/// Start/stop bookkeeping shared by the server implementations.
#[derive(Debug, Clone)]
pub(crate) struct Lifecycle {
    shutdown: Arc<watch::Sender<bool>>,
    finished: Arc<watch::Sender<bool>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            shutdown: Arc::new(watch::channel(false).0),
            finished: Arc::new(watch::channel(false).0),
        }
    }

    pub(crate) fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once `stop` has been called, even if it already was.
    pub(crate) fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.subscribe();
        async move {
            let _ = rx.wait_for(|stopped| *stopped).await;
        }
    }

    pub(crate) async fn run<F>(&self, daemon: bool, serve: F) -> Result<(), RpcError>
    where
        F: Future<Output = Result<(), RpcError>> + Send + 'static,
    {
        let finished = self.finished.clone();
        if daemon {
            tokio::spawn(async move {
                if let Err(e) = serve.await {
                    tracing::error!(error = %e, "rpc server exited with error");
                }
                finished.send_replace(true);
            });
            Ok(())
        } else {
            let result = serve.await;
            finished.send_replace(true);
            result
        }
    }

    pub(crate) async fn stopped(&self) {
        let mut rx = self.finished.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }
}

/// Split `scheme://host:port` into `host:port`.
pub(crate) fn authority<'a>(transport: &'a str, scheme: &str) -> Result<&'a str, RpcError> {
    let rest = transport
        .strip_prefix(scheme)
        .and_then(|rest| rest.strip_prefix("://"))
        .ok_or_else(|| RpcError::invalid_transport(transport, format!("expected {scheme}://host:port")))?;
    let authority = rest.trim_end_matches('/');
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(authority),
        _ => Err(RpcError::invalid_transport(transport, "missing host or port")),
    }
}

/// Host to put in an advertised transport string for a listener bound to
/// `host`.
pub(crate) fn advertised_host(host: &str, local: std::net::SocketAddr) -> String {
    let ip = local.ip();
    if ip.is_unspecified() {
        tracing::warn!(
            bind = %host,
            "rpc server bound to an unspecified address, reporting loopback"
        );
        return if ip.is_ipv4() {
            "127.0.0.1".to_string()
        } else {
            "[::1]".to_string()
        };
    }
    match ip {
        std::net::IpAddr::V6(v6) => format!("[{v6}]"),
        std::net::IpAddr::V4(v4) => v4.to_string(),
    }
}

/// Transport string other nodes should use for a server bound to
/// `bind_host`. A wildcard bind (`0.0.0.0`, `::`) has no reachable host of
/// its own, so the node's `ip` takes its place.
pub fn advertise(transport: &str, bind_host: &str, ip: &str) -> String {
    let wildcard = bind_host
        .trim_matches(|c| c == '[' || c == ']')
        .parse::<std::net::IpAddr>()
        .is_ok_and(|addr| addr.is_unspecified());
    if !wildcard {
        return transport.to_string();
    }
    let port = transport
        .split_once("://")
        .and_then(|(scheme, rest)| Some((scheme, rest.trim_end_matches('/').rsplit_once(':')?.1)));
    let Some((scheme, port)) = port else {
        return transport.to_string();
    };
    let host = match ip.parse::<std::net::IpAddr>() {
        Ok(std::net::IpAddr::V6(v6)) => format!("[{v6}]"),
        _ => ip.to_string(),
    };
    format!("{scheme}://{host}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertise_replaces_wildcard_host() {
        assert_eq!(
            advertise("http://127.0.0.1:9527", "0.0.0.0", "10.20.30.40"),
            "http://10.20.30.40:9527"
        );
        assert_eq!(
            advertise("tcp://[::1]:7000", "::", "fd00::7"),
            "tcp://[fd00::7]:7000"
        );
        assert_eq!(
            advertise("http://192.168.1.5:9527", "192.168.1.5", "10.20.30.40"),
            "http://192.168.1.5:9527"
        );
        assert_eq!(
            advertise("http://node-a:9527", "node-a", "10.20.30.40"),
            "http://node-a:9527"
        );
    }

    #[test]
    fn test_authority_parsing() {
        assert_eq!(authority("tcp://10.0.0.1:9527", "tcp").unwrap(), "10.0.0.1:9527");
        assert_eq!(authority("http://host:80/", "http").unwrap(), "host:80");
        assert!(authority("http://host:80", "tcp").is_err());
        assert!(authority("tcp://host", "tcp").is_err());
        assert!(authority("tcp://:80", "tcp").is_err());
    }

    #[test]
    fn test_default_drivers() {
        let registry = DriverRegistry::with_defaults();
        assert_eq!(registry.names(), vec![BINRPC_DRIVER, JSONRPC_DRIVER]);
        assert!(matches!(
            registry.client("smoke-signals", "x", Duration::from_secs(1)),
            Err(RpcError::UnknownDriver(_))
        ));
    }
}
