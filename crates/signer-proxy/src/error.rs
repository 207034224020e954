use std::net::AddrParseError;

use alloy_primitives::Address;
use http::StatusCode;
use thiserror::Error;

use crate::jsonrpc::JsonRpcError;

pub type Result<T, E = ProxyError> = std::result::Result<T, E>;

/// Top level error type for the proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid JSON-RPC request: {0}")]
    InvalidRequest(String),
    #[error("invalid JSON-RPC parameters: {0}")]
    InvalidParams(String),
    #[error("from address {0} does not match an unlocked account")]
    SenderNotUnlocked(Address),
    #[error("failed to sign transaction: {0}")]
    Signing(String),
    #[error("failed to encode transaction: {0}")]
    Encoding(String),
    #[error("failed to resolve nonce: {0}")]
    NonceResolution(String),
    #[error("nonce conflicts unresolved after {0} submission attempts")]
    RetriesExhausted(u32),
    #[error("failed to connect to downstream node: {0}")]
    DownstreamConnect(String),
    #[error("connection to downstream node timed out")]
    DownstreamTimeout,
    #[error("downstream request error: {0}")]
    Downstream(String),
    #[error("bind or socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("address parse error: {0}")]
    AddrParse(#[from] AddrParseError),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProxyError {
    /// HTTP status and wire error reported to the caller for this failure.
    pub fn status_and_error(&self) -> (StatusCode, JsonRpcError) {
        match self {
            ProxyError::InvalidRequest(_)
            | ProxyError::InvalidParams(_)
            | ProxyError::SenderNotUnlocked(_) => {
                (StatusCode::BAD_REQUEST, JsonRpcError::InvalidParams)
            }
            ProxyError::RetriesExhausted(_) => {
                (StatusCode::BAD_REQUEST, JsonRpcError::InternalError)
            }
            ProxyError::DownstreamConnect(_) => {
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    JsonRpcError::FailedToConnectToDownstreamNode,
                )
            }
            ProxyError::DownstreamTimeout => {
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    JsonRpcError::ConnectionToDownstreamNodeTimedOut,
                )
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, JsonRpcError::InternalError),
        }
    }

    /// Label used for the downstream error counter.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ProxyError::DownstreamConnect(_) => "connect",
            ProxyError::DownstreamTimeout => "timeout",
            ProxyError::Downstream(_) => "other",
            ProxyError::NonceResolution(_) => "nonce",
            _ => "internal",
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::DownstreamTimeout
        } else if err.is_connect() {
            ProxyError::DownstreamConnect(err.to_string())
        } else {
            ProxyError::Downstream(err.to_string())
        }
    }
}
