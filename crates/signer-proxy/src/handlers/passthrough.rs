use async_trait::async_trait;
use axum::response::Response;
use tracing::warn;

use crate::{
    downstream::DownstreamClient,
    handlers::{
        InboundRequest,
        RequestHandler,
    },
    response,
};

/// Forwards the call byte for byte and relays whatever the node answers.
#[derive(Debug, Clone)]
pub struct PassThroughHandler {
    downstream: DownstreamClient,
}

impl PassThroughHandler {
    pub fn new(downstream: DownstreamClient) -> Self {
        Self { downstream }
    }
}

#[async_trait]
impl RequestHandler for PassThroughHandler {
    async fn handle(&self, request: InboundRequest) -> Response {
        metrics::counter!("signer_proxy_passthrough_total").increment(1);
        match self
            .downstream
            .forward(request.method, &request.headers, request.body)
            .await
        {
            Ok(reply) => response::relay(reply),
            Err(err) => {
                warn!(%err, rpc_method = %request.rpc.method, "pass-through request failed");
                metrics::counter!("signer_proxy_downstream_errors_total", "kind" => err.kind())
                    .increment(1);
                response::from_proxy_error(request.rpc.id, &err)
            }
        }
    }
}
