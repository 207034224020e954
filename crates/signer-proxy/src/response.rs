//! HTTP responses carrying JSON-RPC bodies.

use axum::{
    Json,
    body::{
        Body,
        Bytes,
    },
    response::{
        IntoResponse,
        Response,
    },
};
use http::StatusCode;
use serde_json::Value;

use crate::{
    downstream::{
        DownstreamResponse,
        end_to_end_headers,
    },
    error::ProxyError,
    jsonrpc::{
        JsonRpcError,
        JsonRpcErrorResponse,
        JsonRpcSuccessResponse,
        RequestId,
    },
};

pub fn error_response(id: RequestId, status: StatusCode, error: JsonRpcError) -> Response {
    (status, Json(JsonRpcErrorResponse::new(id, error))).into_response()
}

/// Error response for a failure the proxy detected itself.
pub fn from_proxy_error(id: RequestId, err: &ProxyError) -> Response {
    let (status, error) = err.status_and_error();
    error_response(id, status, error)
}

pub fn success_response(id: RequestId, result: Value) -> Response {
    (StatusCode::OK, Json(JsonRpcSuccessResponse::new(id, result))).into_response()
}

/// Relays a downstream reply unchanged, minus hop-by-hop headers.
pub fn relay(downstream: DownstreamResponse) -> Response {
    let mut response = Response::new(Body::from(downstream.body));
    *response.status_mut() = downstream.status;
    *response.headers_mut() = end_to_end_headers(&downstream.headers);
    response
}

/// Relays a downstream reply with its JSON-RPC id replaced by `id`.
///
/// Bodies that are not a JSON object are relayed as they are.
pub fn relay_with_id(mut downstream: DownstreamResponse, id: &RequestId) -> Response {
    if let Some(body) = rewrite_id(&downstream.body, id) {
        downstream.body = body;
    }
    relay(downstream)
}

fn rewrite_id(body: &[u8], id: &RequestId) -> Option<Bytes> {
    let Value::Object(mut object) = serde_json::from_slice::<Value>(body).ok()? else {
        return None;
    };
    object.insert("id".to_string(), id.to_value());
    serde_json::to_vec(&object).ok().map(Bytes::from)
}
