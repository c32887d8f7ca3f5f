//! `jsonrpc` driver: one `POST /rpc/v0/{operation}` per call, JSON bodies,
//! faults returned with a status code and a [`Fault`] body.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::Router;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use tower_http::trace::TraceLayer;
use url::Url;

use common::error::{ErrorKind, Fault};

use super::{
    advertised_host, authority, Lifecycle, Operation, Request, Response, RpcClient, RpcError,
    RpcHandler, RpcServer,
};

pub const JSONRPC_DRIVER: &str = "jsonrpc";

const RPC_PREFIX: &str = "rpc/v0";

pub struct HttpRpcServer {
    transport: String,
    listener: Mutex<Option<std::net::TcpListener>>,
    handler: Arc<dyn RpcHandler>,
    lifecycle: Lifecycle,
}

impl HttpRpcServer {
    /// Bind the listening socket right away so `transport` reports the
    /// real port even when `port` is 0.
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
            transport: format!("http://{}:{}", advertised_host(host, local), local.port()),
            listener: Mutex::new(Some(listener)),
            handler,
            lifecycle: Lifecycle::new(),
        })
    }
}

#[async_trait::async_trait]
impl RpcServer for HttpRpcServer {
    fn transport(&self) -> &str {
        &self.transport
    }

    async fn start(&self, daemon: bool) -> Result<(), RpcError> {
        let listener = self.listener.lock().take().ok_or(RpcError::AlreadyStarted)?;
        let listener = tokio::net::TcpListener::from_std(listener).map_err(|source| {
            RpcError::Bind {
                addr: self.transport.clone(),
                source,
            }
        })?;

        let app = router(self.handler.clone());
        let shutdown = self.lifecycle.shutdown_signal();
        let transport = self.transport.clone();
        tracing::info!(transport = %transport, daemon, "starting jsonrpc server");

        self.lifecycle
            .run(daemon, async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await
                    .map_err(|e| RpcError::Transport(e.to_string()))?;
                tracing::info!(transport = %transport, "jsonrpc server stopped");
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

pub fn router(handler: Arc<dyn RpcHandler>) -> Router {
    Router::new()
        .route("/_status/livez", get(liveness))
        .route("/rpc/v0/:operation", post(dispatch))
        .with_state(handler)
        .layer(TraceLayer::new_for_http())
}

#[tracing::instrument]
async fn liveness() -> HttpResponse {
    let msg = serde_json::json!({"status": "ok"});
    (StatusCode::OK, Json(msg)).into_response()
}

#[tracing::instrument(skip(handler, request))]
async fn dispatch(
    State(handler): State<Arc<dyn RpcHandler>>,
    Path(operation): Path<String>,
    Json(request): Json<Request>,
) -> Result<Json<Response>, FaultResponse> {
    let expected: Operation = operation.parse().map_err(|e: String| FaultResponse {
        status: StatusCode::NOT_FOUND,
        fault: Fault::new(ErrorKind::Internal, e),
    })?;
    if request.operation() != expected {
        return Err(FaultResponse {
            status: StatusCode::BAD_REQUEST,
            fault: Fault::new(
                ErrorKind::Internal,
                format!("request body is {}, path says {expected}", request.operation()),
            ),
        });
    }

    let response = handler.handle(request).await.map_err(FaultResponse::from)?;
    Ok(Json(response))
}

/// A fault on its way out over HTTP.
#[derive(Debug)]
pub struct FaultResponse {
    status: StatusCode,
    fault: Fault,
}

impl From<Fault> for FaultResponse {
    fn from(fault: Fault) -> Self {
        let status = match fault.kind {
            ErrorKind::PathNotFound | ErrorKind::NodeNotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyExists | ErrorKind::ConflictingNode | ErrorKind::NotEmpty => {
                StatusCode::CONFLICT
            }
            ErrorKind::NotAFile
            | ErrorKind::InvalidPath
            | ErrorKind::InvalidPattern
            | ErrorKind::NotMaster => StatusCode::BAD_REQUEST,
            ErrorKind::NodeInactive => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::RemoteCallFailed => StatusCode::BAD_GATEWAY,
            ErrorKind::InvalidRoot | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, fault }
    }
}

impl IntoResponse for FaultResponse {
    fn into_response(self) -> HttpResponse {
        if self.status.is_server_error() {
            tracing::error!(fault = %self.fault, "rpc call failed");
        }
        (self.status, Json(self.fault)).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct HttpRpcClient {
    transport: String,
    remote: Url,
    client: Client,
}

impl HttpRpcClient {
    pub fn new(transport: &str, timeout: Duration) -> Result<Self, RpcError> {
        authority(transport, "http")?;
        let remote =
            Url::parse(transport).map_err(|e| RpcError::invalid_transport(transport, e.to_string()))?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            transport: transport.to_string(),
            remote,
            client,
        })
    }

    fn url_for(&self, operation: Operation) -> Result<Url, RpcError> {
        self.remote
            .join(&format!("/{RPC_PREFIX}/{}", operation.name()))
            .map_err(|e| RpcError::invalid_transport(&self.transport, e.to_string()))
    }
}

#[async_trait::async_trait]
impl RpcClient for HttpRpcClient {
    fn transport(&self) -> &str {
        &self.transport
    }

    #[tracing::instrument(skip(self, request), fields(transport = %self.transport, op = %request.operation()))]
    async fn call(&self, request: Request) -> Result<Response, RpcError> {
        let url = self.url_for(request.operation())?;
        let response = self.client.post(url).json(&request).send().await?;

        if response.status().is_success() {
            return Ok(response.json::<Response>().await?);
        }

        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<Fault>(&body) {
            Ok(fault) => Err(RpcError::Fault(fault)),
            Err(_) => Err(RpcError::Transport(format!("{status}: {body}"))),
        }
    }
}
