//! Per-method request handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    response::Response,
};
use http::{
    HeaderMap,
    Method,
};

use crate::jsonrpc::JsonRpcRequest;

pub mod accounts;
pub mod passthrough;
pub mod send_transaction;

pub use accounts::EthAccountsHandler;
pub use passthrough::PassThroughHandler;
pub use send_transaction::SendTransactionHandler;

/// An inbound call: the raw HTTP parts plus the envelope parsed from `body`.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub rpc: JsonRpcRequest,
}

/// Produces the single response for an inbound call.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: InboundRequest) -> Response;
}

pub type SharedRequestHandler = Arc<dyn RequestHandler>;
