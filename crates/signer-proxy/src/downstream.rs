//! HTTP transport to the Ethereum node.
//!
//! One pooled [`reqwest::Client`] is shared by every request. Calls the proxy
//! originates itself (nonce lookups, raw transaction submissions) carry ids
//! from a process-wide counter so they never reuse a caller's id.

use std::{
    sync::{
        Arc,
        atomic::{
            AtomicU64,
            Ordering,
        },
    },
    time::Duration,
};

use axum::body::Bytes;
use http::{
    HeaderMap,
    HeaderValue,
    Method,
    StatusCode,
    header,
};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::{
    error::Result,
    jsonrpc::{
        JsonRpcRequest,
        RequestId,
    },
};

/// Headers that describe one hop and must not be copied to the next.
pub(crate) const HOP_HEADERS: [header::HeaderName; 4] = [
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
];

/// Copies `headers`, minus the hop-by-hop ones.
pub(crate) fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let mut copied = headers.clone();
    for name in &HOP_HEADERS {
        copied.remove(name);
    }
    copied
}

/// A downstream reply, kept as raw bytes so it can be relayed unchanged.
#[derive(Debug, Clone)]
pub struct DownstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct DownstreamClient {
    http: Client,
    url: Url,
    request_id: Arc<AtomicU64>,
}

impl DownstreamClient {
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url,
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Next id for a request the proxy sends on its own behalf.
    pub fn next_request_id(&self) -> RequestId {
        RequestId::from(self.request_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Sends `body` to the node with the caller's headers and returns the
    /// reply as received.
    pub async fn forward(
        &self,
        method: Method,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<DownstreamResponse> {
        debug!(%method, url = %self.url, len = body.len(), "forwarding to downstream");
        let response = self
            .http
            .request(method, self.url.clone())
            .headers(end_to_end_headers(headers))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        debug!(%status, len = body.len(), "downstream responded");

        Ok(DownstreamResponse {
            status,
            headers,
            body,
        })
    }

    /// POSTs a JSON-RPC request, propagating `headers` from the inbound call.
    pub async fn send(
        &self,
        headers: &HeaderMap,
        request: &JsonRpcRequest,
    ) -> Result<DownstreamResponse> {
        let body = serde_json::to_vec(request)?;
        let mut headers = headers.clone();
        // The reply is parsed here, so it must come back uncompressed.
        headers.remove(header::ACCEPT_ENCODING);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.forward(Method::POST, &headers, Bytes::from(body)).await
    }

    /// POSTs a JSON-RPC request the proxy originates itself.
    pub async fn call(&self, request: &JsonRpcRequest) -> Result<DownstreamResponse> {
        self.send(&HeaderMap::new(), request).await
    }
}
