//! Routes parsed JSON-RPC calls to handlers by method name.

use std::{
    collections::HashMap,
    sync::Arc,
};

use axum::{
    body::Bytes,
    response::Response,
};
use http::{
    HeaderMap,
    Method,
    StatusCode,
};
use tokio::sync::Semaphore;
use tracing::{
    debug,
    error,
    warn,
};

use crate::{
    handlers::{
        InboundRequest,
        SharedRequestHandler,
    },
    jsonrpc::{
        JsonRpcError,
        JsonRpcRequest,
    },
    response,
};

/// Method label for calls served by the default handler.
const DEFAULT_METHOD_LABEL: &str = "passthrough";

pub struct RequestDispatcher {
    handlers: HashMap<String, SharedRequestHandler>,
    default_handler: SharedRequestHandler,
    limiter: Arc<Semaphore>,
}

impl RequestDispatcher {
    pub fn new(default_handler: SharedRequestHandler) -> Self {
        Self {
            handlers: HashMap::new(),
            default_handler,
            limiter: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
        }
    }

    /// Caps the number of handlers running at once; further calls wait.
    pub fn with_concurrency_limit(mut self, max_concurrent: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(max_concurrent));
        self
    }

    /// Stops admitting work. Calls still waiting for a slot, and any later
    /// ones, get `503`; handlers already running finish.
    pub fn close(&self) {
        self.limiter.close();
    }

    /// Registers `handler` for the exact method name `method`.
    pub fn add_handler(&mut self, method: impl Into<String>, handler: SharedRequestHandler) {
        self.handlers.insert(method.into(), handler);
    }

    /// Case-sensitive lookup, falling back to the default handler.
    pub fn handler_for(&self, method: &str) -> &SharedRequestHandler {
        self.handlers.get(method).unwrap_or(&self.default_handler)
    }

    /// Parses the envelope and lets the selected handler produce the response.
    ///
    /// The handler runs on its own task, so downstream work already started is
    /// finished even if the caller goes away. That task holds the concurrency
    /// slot until it completes.
    pub async fn dispatch(&self, method: Method, headers: HeaderMap, body: Bytes) -> Response {
        let rpc = match JsonRpcRequest::parse(&body) {
            Ok(rpc) => rpc,
            Err(invalid) => {
                debug!(reason = %invalid, id = %invalid.id, "rejecting malformed envelope");
                metrics::counter!("signer_proxy_requests_total", "method" => "invalid")
                    .increment(1);
                return response::error_response(
                    invalid.id,
                    StatusCode::BAD_REQUEST,
                    JsonRpcError::InvalidParams,
                );
            }
        };

        let (label, handler) = match self.handlers.get_key_value(rpc.method.as_str()) {
            Some((name, handler)) => (name.clone(), handler.clone()),
            None => (DEFAULT_METHOD_LABEL.to_string(), self.default_handler.clone()),
        };
        metrics::counter!("signer_proxy_requests_total", "method" => label).increment(1);
        debug!(rpc_method = %rpc.method, id = %rpc.id, "dispatching");

        let Ok(permit) = self.limiter.clone().acquire_owned().await else {
            warn!(id = %rpc.id, "dispatcher closed, rejecting request");
            return response::error_response(
                rpc.id,
                StatusCode::SERVICE_UNAVAILABLE,
                JsonRpcError::InternalError,
            );
        };

        let id = rpc.id.clone();
        let request = InboundRequest {
            method,
            headers,
            body,
            rpc,
        };
        let task = tokio::spawn(async move {
            let _permit = permit;
            handler.handle(request).await
        });
        match task.await {
            Ok(response) => response,
            Err(err) => {
                error!(%err, %id, "request handler panicked");
                response::error_response(
                    id,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    JsonRpcError::InternalError,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::RequestHandler;
    use async_trait::async_trait;
    use serde_json::{
        Value,
        json,
    };
    use std::{
        sync::{
            Mutex,
            atomic::{
                AtomicUsize,
                Ordering,
            },
        },
        time::Duration,
    };

    /// Answers with its name and records every method it saw.
    struct NamedHandler {
        name: &'static str,
        seen: Mutex<Vec<String>>,
    }

    impl NamedHandler {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RequestHandler for NamedHandler {
        async fn handle(&self, request: InboundRequest) -> Response {
            self.seen.lock().unwrap().push(request.rpc.method.clone());
            response::success_response(request.rpc.id, json!(self.name))
        }
    }

    struct PanickingHandler;

    /// Blocks every call until the test releases it.
    struct GatedHandler {
        started: AtomicUsize,
        gate: Semaphore,
    }

    impl GatedHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                started: AtomicUsize::new(0),
                gate: Semaphore::new(0),
            })
        }
    }

    #[async_trait]
    impl RequestHandler for GatedHandler {
        async fn handle(&self, request: InboundRequest) -> Response {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            response::success_response(request.rpc.id, json!("done"))
        }
    }

    #[async_trait]
    impl RequestHandler for PanickingHandler {
        async fn handle(&self, _request: InboundRequest) -> Response {
            panic!("handler bug");
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn dispatch(dispatcher: &RequestDispatcher, body: Value) -> Response {
        dispatcher
            .dispatch(
                Method::POST,
                HeaderMap::new(),
                Bytes::from(serde_json::to_vec(&body).unwrap()),
            )
            .await
    }

    #[tokio::test]
    async fn routes_by_exact_method_name() {
        let default = NamedHandler::new("default");
        let send = NamedHandler::new("send");
        let mut dispatcher = RequestDispatcher::new(default.clone());
        dispatcher.add_handler("eth_sendTransaction", send.clone());

        let response = dispatch(
            &dispatcher,
            json!({"jsonrpc": "2.0", "method": "eth_sendTransaction", "params": [], "id": 1}),
        )
        .await;
        assert_eq!(body_json(response).await["result"], "send");

        for method in ["eth_SendTransaction", "eth_blockNumber"] {
            let response = dispatch(
                &dispatcher,
                json!({"jsonrpc": "2.0", "method": method, "id": 2}),
            )
            .await;
            assert_eq!(body_json(response).await["result"], "default");
        }

        assert_eq!(*send.seen.lock().unwrap(), vec!["eth_sendTransaction"]);
        assert_eq!(
            *default.seen.lock().unwrap(),
            vec!["eth_SendTransaction", "eth_blockNumber"]
        );
    }

    #[tokio::test]
    async fn malformed_envelope_never_reaches_a_handler() {
        let default = NamedHandler::new("default");
        let dispatcher = RequestDispatcher::new(default.clone());

        let response = dispatch(&dispatcher, json!({"jsonrpc": "2.0", "id": "x"})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["id"], "x");
        assert_eq!(body["error"]["code"], -32602);

        let response = dispatcher
            .dispatch(Method::POST, HeaderMap::new(), Bytes::from_static(b"{oops"))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["id"], Value::Null);

        assert!(default.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn handler_panic_becomes_internal_error() {
        let dispatcher = RequestDispatcher::new(Arc::new(PanickingHandler));
        let response = dispatch(
            &dispatcher,
            json!({"jsonrpc": "2.0", "method": "eth_chainId", "id": 3}),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["id"], 3);
        assert_eq!(body["error"]["code"], -32603);
    }

    #[test]
    fn handler_for_falls_back_to_default() {
        let default: SharedRequestHandler = NamedHandler::new("default");
        let mut dispatcher = RequestDispatcher::new(default.clone());
        let accounts: SharedRequestHandler = NamedHandler::new("accounts");
        dispatcher.add_handler("eth_accounts", accounts.clone());

        assert!(Arc::ptr_eq(dispatcher.handler_for("eth_accounts"), &accounts));
        assert!(Arc::ptr_eq(dispatcher.handler_for("eth_chainId"), &default));
    }

    fn chain_id_call(id: u64) -> Value {
        json!({"jsonrpc": "2.0", "method": "eth_chainId", "id": id})
    }

    #[tokio::test]
    async fn abandoned_request_keeps_its_slot_until_done() {
        let handler = GatedHandler::new();
        let dispatcher =
            Arc::new(RequestDispatcher::new(handler.clone()).with_concurrency_limit(1));

        // The caller gives up while its handler is still running.
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), dispatch(&dispatcher, chain_id_call(1)))
                .await;
        assert!(abandoned.is_err());
        assert_eq!(handler.started.load(Ordering::SeqCst), 1);

        let waiting = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatch(&dispatcher, chain_id_call(2)).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.started.load(Ordering::SeqCst), 1);

        handler.gate.add_permits(2);
        let response = waiting.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], 2);
        assert_eq!(handler.started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn closed_dispatcher_is_service_unavailable() {
        let handler = NamedHandler::new("default");
        let dispatcher = RequestDispatcher::new(handler.clone()).with_concurrency_limit(4);
        dispatcher.close();

        let response = dispatch(&dispatcher, chain_id_call(8)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["id"], 8);
        assert_eq!(body["error"]["code"], -32603);
        assert!(handler.seen.lock().unwrap().is_empty());
    }
}
