//! `binrpc` driver: bincode messages in length-delimited frames over one
//! persistent TCP connection per client.
//!
//! Each request frame holds a bincode [`Request`]; the reply frame holds a
//! bincode `Result<Response, Fault>`. Calls on one connection are strictly
//! sequential.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::task::TaskTracker;

use common::error::Fault;

use super::{
    advertised_host, authority, Lifecycle, Request, Response, RpcClient, RpcError, RpcHandler,
    RpcServer,
};

pub const BINRPC_DRIVER: &str = "binrpc";

/// Upper bound on a single frame (listings of large directories included).
const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

type Connection = Framed<TcpStream, LengthDelimitedCodec>;
type Reply = Result<Response, Fault>;

fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec()
}

pub struct BinaryRpcServer {
    transport: String,
    listener: Mutex<Option<std::net::TcpListener>>,
    handler: Arc<dyn RpcHandler>,
    lifecycle: Lifecycle,
}

impl BinaryRpcServer {
    pub fn bind(handler: Arc<dyn RpcHandler>, host: &str, port: u16) -> Result<Self, RpcError> {
        let addr = format!("{host}:{port}");
        let bind_err = |source| RpcError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = std::net::TcpListener::bind(&addr).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        let local = listener.local_addr().map_err(bind_err)?;

        Ok(Self {
            transport: format!("tcp://{}:{}", advertised_host(host, local), local.port()),
            listener: Mutex::new(Some(listener)),
            handler,
            lifecycle: Lifecycle::new(),
        })
    }
}

#[async_trait::async_trait]
impl RpcServer for BinaryRpcServer {
    fn transport(&self) -> &str {
        &self.transport
    }

    async fn start(&self, daemon: bool) -> Result<(), RpcError> {
        let listener = self.listener.lock().take().ok_or(RpcError::AlreadyStarted)?;
        let listener = TcpListener::from_std(listener).map_err(|source| RpcError::Bind {
            addr: self.transport.clone(),
            source,
        })?;

        let handler = self.handler.clone();
        let shutdown = self.lifecycle.shutdown_signal();
        let lifecycle = self.lifecycle.clone();
        let transport = self.transport.clone();
        tracing::info!(transport = %transport, daemon, "starting binrpc server");

        self.lifecycle
            .run(daemon, async move {
                let tracker = TaskTracker::new();
                tokio::pin!(shutdown);
                loop {
                    tokio::select! {
                        _ = &mut shutdown => break,
                        accepted = listener.accept() => {
                            let (stream, peer) = match accepted {
                                Ok(accepted) => accepted,
                                Err(e) => {
                                    tracing::warn!(error = %e, "failed to accept connection");
                                    continue;
                                }
                            };
                            tracing::debug!(%peer, "new binrpc connection");
                            tracker.spawn(serve_connection(
                                handler.clone(),
                                Framed::new(stream, codec()),
                                lifecycle.shutdown_signal(),
                            ));
                        }
                    }
                }

                // refuse new connections, let in-flight calls finish
                drop(listener);
                tracker.close();
                tracker.wait().await;
                tracing::info!(transport = %transport, "binrpc server stopped");
                Ok(())
            })
            .await
    }

    fn stop(&self) {
        self.lifecycle.stop();
    }

    async fn stopped(&self) {
        self.lifecycle.stopped().await
    }
}

async fn serve_connection(
    handler: Arc<dyn RpcHandler>,
    mut conn: Connection,
    shutdown: impl std::future::Future<Output = ()> + Send,
) {
    tokio::pin!(shutdown);
    loop {
        // A frame that already arrived is answered before shutdown wins.
        let frame = tokio::select! {
            biased;
            frame = conn.next() => frame,
            _ = &mut shutdown => break,
        };
        let bytes = match frame {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "failed to read binrpc frame");
                break;
            }
            None => break,
        };

        let reply: Reply = match bincode::deserialize::<Request>(&bytes) {
            Ok(request) => {
                tracing::debug!(op = %request.operation(), "binrpc call");
                handler.handle(request).await
            }
            Err(e) => {
                tracing::error!("Failed to deserialize request: {}", e);
                Err(Fault::new(
                    common::error::ErrorKind::Internal,
                    format!("malformed request: {e}"),
                ))
            }
        };

        let reply_bytes = match bincode::serialize(&reply) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to serialize reply: {}", e);
                break;
            }
        };
        if let Err(e) = conn.send(Bytes::from(reply_bytes)).await {
            tracing::warn!(error = %e, "failed to send binrpc reply");
            break;
        }
    }
}

pub struct BinaryRpcClient {
    transport: String,
    addr: String,
    timeout: Duration,
    conn: tokio::sync::Mutex<Option<Connection>>,
}

impl BinaryRpcClient {
    /// No connection is made until the first call.
    pub fn new(transport: &str, timeout: Duration) -> Result<Self, RpcError> {
        let addr = authority(transport, "tcp")?.to_string();
        Ok(Self {
            transport: transport.to_string(),
            addr,
            timeout,
            conn: tokio::sync::Mutex::new(None),
        })
    }

    /// Send one request and read its reply, connecting first if needed.
    async fn exchange(
        &self,
        slot: &mut Option<Connection>,
        request_bytes: Vec<u8>,
    ) -> Result<Bytes, RpcError> {
        if slot.is_none() {
            let stream = TcpStream::connect(&self.addr).await.map_err(|e| {
                RpcError::Transport(format!("failed to connect to {}: {e}", self.addr))
            })?;
            *slot = Some(Framed::new(stream, codec()));
        }
        let Some(conn) = slot.as_mut() else {
            return Err(RpcError::Transport("no connection".to_string()));
        };

        conn.send(Bytes::from(request_bytes))
            .await
            .map_err(|e| RpcError::Transport(format!("failed to write request: {e}")))?;
        match conn.next().await {
            Some(Ok(bytes)) => Ok(bytes.freeze()),
            Some(Err(e)) => Err(RpcError::Transport(format!("failed to read response: {e}"))),
            None => Err(RpcError::Transport("connection closed by peer".to_string())),
        }
    }
}

#[async_trait::async_trait]
impl RpcClient for BinaryRpcClient {
    fn transport(&self) -> &str {
        &self.transport
    }

    #[tracing::instrument(skip(self, request), fields(transport = %self.transport, op = %request.operation()))]
    async fn call(&self, request: Request) -> Result<Response, RpcError> {
        let request_bytes =
            bincode::serialize(&request).map_err(|e| RpcError::Encode(e.to_string()))?;

        let mut guard = self.conn.lock().await;
        let outcome =
            tokio::time::timeout(self.timeout, self.exchange(&mut guard, request_bytes)).await;
        let response_bytes = match outcome {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                *guard = None;
                return Err(e);
            }
            Err(_) => {
                // a late reply would desync the stream
                *guard = None;
                return Err(RpcError::Timeout(self.transport.clone()));
            }
        };

        let reply: Reply = bincode::deserialize(&response_bytes)?;
        reply.map_err(RpcError::Fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Slow {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RpcHandler for Slow {
        async fn handle(&self, request: Request) -> Result<Response, Fault> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match request {
                Request::FileSize { path } if path == "slow" => {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    Ok(Response::Size(1))
                }
                Request::FileSize { .. } => Ok(Response::Size(42)),
                _ => Err(Fault::new(ErrorKind::NotMaster, "no registry here")),
            }
        }
    }

    fn server() -> (Arc<Slow>, BinaryRpcServer) {
        let handler = Arc::new(Slow {
            calls: AtomicUsize::new(0),
        });
        let server = BinaryRpcServer::bind(handler.clone(), "127.0.0.1", 0).unwrap();
        (handler, server)
    }

    #[tokio::test]
    async fn test_calls_share_one_connection() {
        let (handler, server) = server();
        assert!(server.transport().starts_with("tcp://127.0.0.1:"));
        server.start(true).await.unwrap();

        let client = BinaryRpcClient::new(server.transport(), Duration::from_secs(5)).unwrap();
        for _ in 0..3 {
            let response = client
                .call(Request::FileSize { path: "a".into() })
                .await
                .unwrap();
            assert_eq!(response, Response::Size(42));
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);

        let err = client.call(Request::ListNodes).await.unwrap_err();
        assert!(matches!(err, RpcError::Fault(ref f) if f.kind == ErrorKind::NotMaster));

        server.stop();
        server.stopped().await;
    }

    #[tokio::test]
    async fn test_timeout_then_reconnect() {
        let (_handler, server) = server();
        server.start(true).await.unwrap();

        let client = BinaryRpcClient::new(server.transport(), Duration::from_millis(100)).unwrap();
        let err = client
            .call(Request::FileSize { path: "slow".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Timeout(_)));

        let response = client
            .call(Request::FileSize { path: "fast".into() })
            .await
            .unwrap();
        assert_eq!(response, Response::Size(42));

        server.stop();
        server.stopped().await;
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_call() {
        let (_handler, server) = server();
        let server = Arc::new(server);
        let serving = {
            let server = server.clone();
            tokio::spawn(async move { server.start(false).await })
        };

        let client = BinaryRpcClient::new(server.transport(), Duration::from_secs(5)).unwrap();
        let call = tokio::spawn(async move { client.call(Request::FileSize { path: "slow".into() }).await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        server.stop();
        serving.await.unwrap().unwrap();
        assert_eq!(call.await.unwrap().unwrap(), Response::Size(1));
    }

    #[tokio::test]
    async fn test_frame_queued_before_stop_is_answered() {
        let (handler, server) = server();
        server.start(true).await.unwrap();

        let addr = authority(server.transport(), "tcp").unwrap().to_string();
        let mut conn = Framed::new(TcpStream::connect(addr).await.unwrap(), codec());
        for path in ["slow", "queued"] {
            let bytes = bincode::serialize(&Request::FileSize { path: path.into() }).unwrap();
            conn.send(Bytes::from(bytes)).await.unwrap();
        }
        // stop while the first call is running and the second sits in the socket
        tokio::time::sleep(Duration::from_millis(100)).await;
        server.stop();

        let mut replies = Vec::new();
        while let Some(frame) = conn.next().await {
            let reply: Reply = bincode::deserialize(&frame.unwrap()).unwrap();
            replies.push(reply.unwrap());
        }
        assert_eq!(replies, vec![Response::Size(1), Response::Size(42)]);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        server.stopped().await;
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client =
            BinaryRpcClient::new(&format!("tcp://127.0.0.1:{port}"), Duration::from_secs(1)).unwrap();
        let err = client.call(Request::DiskUsage).await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
