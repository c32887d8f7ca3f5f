use std::io;

use common::error::Fault;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("server already started")]
    AlreadyStarted,
    #[error("unknown rpc driver: {0}")]
    UnknownDriver(String),
    #[error("invalid transport {transport:?}: {reason}")]
    InvalidTransport { transport: String, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("call to {0} timed out")]
    Timeout(String),
    #[error("failed to encode message: {0}")]
    Encode(String),
    #[error("failed to decode message: {0}")]
    Decode(String),
    #[error("remote fault: {0}")]
    Fault(Fault),
    #[error("unexpected response to {operation}: {response}")]
    UnexpectedResponse {
        operation: &'static str,
        response: String,
    },
}

impl RpcError {
    pub fn invalid_transport(transport: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTransport {
            transport: transport.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            let target = err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "remote".to_string());
            RpcError::Timeout(target)
        } else if err.is_decode() {
            RpcError::Decode(err.to_string())
        } else {
            RpcError::Transport(err.to_string())
        }
    }
}

impl From<bincode::Error> for RpcError {
    fn from(err: bincode::Error) -> Self {
        RpcError::Decode(err.to_string())
    }
}
