use async_trait::async_trait;
use axum::response::Response;
use http::StatusCode;
use serde_json::Value;

use crate::{
    handlers::{
        InboundRequest,
        RequestHandler,
    },
    jsonrpc::JsonRpcError,
    response,
    signing::SharedSignerProvider,
    transaction::hex_address,
};

/// Answers `eth_accounts` locally with the addresses the proxy can sign for.
#[derive(Debug, Clone)]
pub struct EthAccountsHandler {
    signers: SharedSignerProvider,
}

impl EthAccountsHandler {
    pub fn new(signers: SharedSignerProvider) -> Self {
        Self { signers }
    }
}

#[async_trait]
impl RequestHandler for EthAccountsHandler {
    async fn handle(&self, request: InboundRequest) -> Response {
        let no_params = match &request.rpc.params {
            None => true,
            Some(Value::Array(params)) => params.is_empty(),
            Some(_) => false,
        };
        if !no_params {
            return response::error_response(
                request.rpc.id,
                StatusCode::BAD_REQUEST,
                JsonRpcError::InvalidParams,
            );
        }

        let mut addresses = self.signers.addresses();
        addresses.sort();
        let accounts = addresses.iter().map(hex_address).map(Value::String).collect();
        response::success_response(request.rpc.id, Value::Array(accounts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        jsonrpc::JsonRpcRequest,
        signing::{
            LocalSigner,
            MultiSignerProvider,
            TransactionSigner,
        },
    };
    use axum::body::Bytes;
    use http::{
        HeaderMap,
        Method,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn handler() -> EthAccountsHandler {
        let signers: Vec<Arc<dyn TransactionSigner>> = [
            "8f2a55949038a9610f50fb23b5883af3b4ecb3c3bb792cbcefbd1542c692be63",
            "4646464646464646464646464646464646464646464646464646464646464646",
        ]
        .into_iter()
        .map(|key| Arc::new(LocalSigner::from_hex(key).unwrap()) as Arc<dyn TransactionSigner>)
        .collect();
        EthAccountsHandler::new(Arc::new(MultiSignerProvider::new(signers)))
    }

    fn inbound(request: Value) -> InboundRequest {
        let body = serde_json::to_vec(&request).unwrap();
        InboundRequest {
            method: Method::POST,
            headers: HeaderMap::new(),
            rpc: JsonRpcRequest::parse(&body).unwrap(),
            body: Bytes::from(body),
        }
    }

    async fn call(request: Value) -> (StatusCode, Value) {
        let response = handler().handle(inbound(request)).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn lists_sorted_lowercase_addresses() {
        for params in [json!([]), Value::Null] {
            let (status, body) = call(json!({
                "jsonrpc": "2.0",
                "method": "eth_accounts",
                "params": params,
                "id": "acc"
            }))
            .await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["id"], "acc");
            let accounts = body["result"].as_array().unwrap();
            assert_eq!(accounts.len(), 2);
            assert_eq!(accounts[0], "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f");
            assert!(accounts[0].as_str() < accounts[1].as_str());
            assert_eq!(
                accounts[1].as_str().unwrap(),
                accounts[1].as_str().unwrap().to_lowercase()
            );
        }
    }

    #[tokio::test]
    async fn params_are_rejected() {
        let (status, body) = call(json!({
            "jsonrpc": "2.0",
            "method": "eth_accounts",
            "params": ["0x1"],
            "id": 1
        }))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32602);
        assert_eq!(body["id"], 1);
    }
}
