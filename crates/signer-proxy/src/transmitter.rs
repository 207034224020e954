//! Submits signed transactions and relays the node's verdict.
//!
//! One [`TransactionTransmitter`] serves one client request. Each attempt
//! resolves a nonce (unless the caller fixed it), signs on the blocking pool,
//! and posts the raw transaction under an internal id. The reply goes to the
//! [`RetryMechanism`]; terminal replies are relayed with the caller's id put
//! back.

use axum::response::Response;
use http::HeaderMap;
use tracing::{
    debug,
    info,
    warn,
};

use crate::{
    downstream::{
        DownstreamClient,
        DownstreamResponse,
    },
    error::{
        ProxyError,
        Result,
    },
    jsonrpc::{
        JsonRpcError,
        RequestId,
        ResponseEnvelope,
    },
    nonce::NonceProvider,
    response,
    retry::{
        RetryMechanism,
        RetryState,
    },
    signing::TransactionSerializer,
    transaction::{
        Transaction,
        factory::SendMethod,
    },
};

/// State of one proxied `*_sendTransaction` call.
#[derive(Debug)]
pub struct SendTransactionContext {
    pub method: SendMethod,
    /// Inbound headers, propagated on submission.
    pub headers: HeaderMap,
    pub id: RequestId,
    /// Template for every attempt. Its nonce is only set when the caller gave
    /// one.
    pub transaction: Transaction,
    pub retry: RetryMechanism,
}

#[derive(Debug, Clone)]
pub struct TransactionTransmitter {
    downstream: DownstreamClient,
    nonce_provider: NonceProvider,
    serializer: TransactionSerializer,
    chain_id: u64,
}

impl TransactionTransmitter {
    pub fn new(
        downstream: DownstreamClient,
        nonce_provider: NonceProvider,
        serializer: TransactionSerializer,
        chain_id: u64,
    ) -> Self {
        Self {
            downstream,
            nonce_provider,
            serializer,
            chain_id,
        }
    }

    /// Runs the submission pipeline to completion. Always yields exactly one
    /// response, correlated to the caller's id.
    #[tracing::instrument(
        name = "submit",
        skip_all,
        fields(method = %context.method, id = %context.id, sender = %context.transaction.sender())
    )]
    pub async fn submit(&self, mut context: SendTransactionContext) -> Response {
        match self.run(&mut context).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    ProxyError::RetriesExhausted(attempts) => {
                        warn!(attempts, "nonce conflicts persisted, giving up");
                        metrics::counter!("signer_proxy_retry_exhausted_total").increment(1);
                    }
                    err => {
                        warn!(%err, "transaction submission failed");
                        metrics::counter!("signer_proxy_downstream_errors_total", "kind" => err.kind())
                            .increment(1);
                    }
                }
                response::from_proxy_error(context.id.clone(), &err)
            }
        }
    }

    async fn run(&self, context: &mut SendTransactionContext) -> Result<Response> {
        loop {
            let mut transaction = context.transaction.clone();
            if !transaction.is_nonce_user_specified() {
                let nonce = self.nonce_provider.resolve(&transaction).await?;
                transaction.update_nonce(nonce);
            }

            let raw = self.sign(transaction.clone()).await?;
            let request = transaction.send_raw_request(raw, self.downstream.next_request_id());

            context.retry.begin_attempt();
            debug!(
                attempt = context.retry.attempts_made(),
                nonce = ?transaction.nonce(),
                internal_id = %request.id,
                "submitting raw transaction"
            );
            let reply = self.downstream.send(&context.headers, &request).await?;

            match context.retry.evaluate(reply.status, &reply.body) {
                RetryState::Retry => {
                    info!(
                        attempt = context.retry.attempts_made(),
                        max_attempts = context.retry.max_attempts(),
                        "nonce too low, resubmitting with a fresh nonce"
                    );
                    metrics::counter!("signer_proxy_nonce_retries_total").increment(1);
                }
                RetryState::Exhausted => {
                    return Err(ProxyError::RetriesExhausted(context.retry.attempts_made()));
                }
                _ => {
                    self.warn_on_chain_mismatch(&reply);
                    metrics::counter!("signer_proxy_transactions_submitted_total").increment(1);
                    return Ok(response::relay_with_id(reply, &context.id));
                }
            }
        }
    }

    /// Serializes on the blocking pool so key operations stay off the I/O
    /// threads.
    async fn sign(&self, transaction: Transaction) -> Result<String> {
        let serializer = self.serializer.clone();
        let chain_id = self.chain_id;
        tokio::task::spawn_blocking(move || serializer.serialize(&transaction, chain_id))
            .await
            .map_err(|err| ProxyError::Signing(format!("signing task failed: {err}")))?
    }

    fn warn_on_chain_mismatch(&self, reply: &DownstreamResponse) {
        let Some(error) = ResponseEnvelope::parse(&reply.body).and_then(|envelope| envelope.error)
        else {
            return;
        };
        if matches!(
            JsonRpcError::from_parts(error.code, &error.message),
            Some(JsonRpcError::WrongChainId | JsonRpcError::ReplayProtectedSignaturesNotSupported)
        ) {
            warn!(
                chain_id = self.chain_id,
                mode = %self.serializer.mode(),
                node_error = %error.message,
                "node rejected the signature's chain id, check the configured chain id"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{
        LocalSigner,
        SigningMode,
        TransactionSigner,
    };
    use crate::transaction::factory::create_transaction;
    use http::StatusCode;
    use serde_json::{
        Value,
        json,
    };
    use std::{
        sync::Arc,
        time::Duration,
    };
    use url::Url;
    use wiremock::{
        Mock,
        MockServer,
        ResponseTemplate,
        matchers::{
            body_partial_json,
            method,
        },
    };

    const KEY: &str = "8f2a55949038a9610f50fb23b5883af3b4ecb3c3bb792cbcefbd1542c692be63";

    fn signer() -> Arc<dyn TransactionSigner> {
        Arc::new(LocalSigner::from_hex(KEY).unwrap())
    }

    fn transmitter(uri: &str, signer: Arc<dyn TransactionSigner>) -> TransactionTransmitter {
        transmitter_with_timeout(uri, signer, Duration::from_secs(5))
    }

    fn transmitter_with_timeout(
        uri: &str,
        signer: Arc<dyn TransactionSigner>,
        timeout: Duration,
    ) -> TransactionTransmitter {
        let downstream = DownstreamClient::new(Url::parse(uri).unwrap(), timeout).unwrap();
        TransactionTransmitter::new(
            downstream.clone(),
            NonceProvider::new(downstream),
            TransactionSerializer::new(signer, SigningMode::Eip155),
            2018,
        )
    }

    fn context(object: Value, id: RequestId, retry: RetryMechanism) -> SendTransactionContext {
        let transaction =
            create_transaction(SendMethod::EthSendTransaction, Some(&json!([object]))).unwrap();
        SendTransactionContext {
            method: SendMethod::EthSendTransaction,
            headers: HeaderMap::new(),
            id,
            transaction,
            retry,
        }
    }

    fn sender(signer: &Arc<dyn TransactionSigner>) -> String {
        format!("{:#x}", signer.address())
    }

    async fn mount_nonce(server: &MockServer, nonce: &str) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_getTransactionCount"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": nonce
            })))
            .mount(server)
            .await;
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn nonce_too_low() -> ResponseTemplate {
        ResponseTemplate::new(400).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32001, "message": "Nonce too low"}
        }))
    }

    #[tokio::test]
    async fn resolves_nonce_and_relays_with_caller_id() {
        let server = MockServer::start().await;
        let signer = signer();
        mount_nonce(&server, "0x5").await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_sendRawTransaction"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 999,
                "result": "0x4242"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = transmitter(&server.uri(), signer.clone())
            .submit(context(
                json!({"from": sender(&signer)}),
                RequestId::String("client".into()),
                RetryMechanism::new(3),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], "client");
        assert_eq!(body["result"], "0x4242");
    }

    #[tokio::test]
    async fn retries_until_budget_is_spent() {
        let server = MockServer::start().await;
        let signer = signer();
        mount_nonce(&server, "0x0").await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_sendRawTransaction"})))
            .respond_with(nonce_too_low())
            .expect(3)
            .mount(&server)
            .await;

        let response = transmitter(&server.uri(), signer.clone())
            .submit(context(
                json!({"from": sender(&signer)}),
                RequestId::from(8),
                RetryMechanism::new(3),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["id"], 8);
        assert_eq!(body["error"]["code"], -32603);
    }

    #[tokio::test]
    async fn caller_nonce_is_never_refreshed() {
        let server = MockServer::start().await;
        let signer = signer();
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_getTransactionCount"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_sendRawTransaction"})))
            .respond_with(nonce_too_low())
            .expect(1)
            .mount(&server)
            .await;

        let response = transmitter(&server.uri(), signer.clone())
            .submit(context(
                json!({"from": sender(&signer), "nonce": "0x1"}),
                RequestId::from(2),
                RetryMechanism::disabled(),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["id"], 2);
        assert_eq!(body["error"]["message"], "Nonce too low");
    }

    #[tokio::test]
    async fn nonce_failure_is_internal_error_without_submission() {
        let server = MockServer::start().await;
        let signer = signer();
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_getTransactionCount"})))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_sendRawTransaction"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let response = transmitter(&server.uri(), signer.clone())
            .submit(context(
                json!({"from": sender(&signer)}),
                RequestId::Null,
                RetryMechanism::new(3),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["id"], Value::Null);
        assert_eq!(body["error"]["code"], -32603);
    }

    #[tokio::test]
    async fn chain_mismatch_is_relayed() {
        let server = MockServer::start().await;
        let signer = signer();
        mount_nonce(&server, "0x0").await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_sendRawTransaction"})))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "Wrong chainId"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = transmitter(&server.uri(), signer.clone())
            .submit(context(
                json!({"from": sender(&signer)}),
                RequestId::from(3),
                RetryMechanism::new(3),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["message"], "Wrong chainId");
    }

    #[tokio::test]
    async fn submission_timeout_is_gateway_timeout() {
        let server = MockServer::start().await;
        let signer = signer();
        mount_nonce(&server, "0x0").await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_sendRawTransaction"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": "0x1"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let transmitter =
            transmitter_with_timeout(&server.uri(), signer.clone(), Duration::from_millis(200));
        let response = transmitter
            .submit(context(
                json!({"from": sender(&signer)}),
                RequestId::from(11),
                RetryMechanism::new(3),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["id"], 11);
        assert_eq!(body["error"]["message"], "Connection to downstream node timed out");

        // The nonce lookup answered; only the submission hung, and it was not repeated.
        let methods: Vec<Value> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|request| {
                serde_json::from_slice::<Value>(&request.body).unwrap()["method"].clone()
            })
            .collect();
        assert_eq!(
            methods,
            vec![json!("eth_getTransactionCount"), json!("eth_sendRawTransaction")]
        );
    }

    #[tokio::test]
    async fn nonce_conflict_with_server_error_is_relayed() {
        let server = MockServer::start().await;
        let signer = signer();
        mount_nonce(&server, "0x0").await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_sendRawTransaction"})))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32001, "message": "Nonce too low"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = transmitter(&server.uri(), signer.clone())
            .submit(context(
                json!({"from": sender(&signer)}),
                RequestId::from(12),
                RetryMechanism::new(3),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["id"], 12);
        assert_eq!(body["error"]["message"], "Nonce too low");
    }
}
