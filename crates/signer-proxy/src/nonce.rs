//! Looks up the next nonce for a transaction's sender.

use alloy_primitives::U256;
use base64::{
    Engine as _,
    engine::general_purpose::STANDARD,
};
use serde_json::{
    Value,
    json,
};
use tracing::debug;

use crate::{
    downstream::DownstreamClient,
    error::{
        ProxyError,
        Result,
    },
    jsonrpc::{
        JsonRpcRequest,
        ResponseEnvelope,
    },
    transaction::{
        PrivacyTarget,
        Transaction,
        hex_address,
    },
};

/// Asks the node for transaction counts. Every failure is a
/// [`ProxyError::NonceResolution`]; nothing here is retried.
#[derive(Debug, Clone)]
pub struct NonceProvider {
    downstream: DownstreamClient,
}

impl NonceProvider {
    pub fn new(downstream: DownstreamClient) -> Self {
        Self { downstream }
    }

    /// The transaction-count request for `transaction`'s sender and, for
    /// private transactions, its privacy group.
    pub fn request_for(&self, transaction: &Transaction) -> JsonRpcRequest {
        let sender = hex_address(&transaction.sender());
        let (method, params) = match transaction {
            Transaction::Public(_) => ("eth_getTransactionCount", json!([sender, "latest"])),
            Transaction::Private(tx) => {
                match &tx.target {
                    PrivacyTarget::Participants(participants) => {
                        let private_for: Vec<String> = participants
                            .iter()
                            .map(|key| STANDARD.encode(key))
                            .collect();
                        (
                            "priv_getEeaTransactionCount",
                            json!([sender, STANDARD.encode(&tx.private_from), private_for]),
                        )
                    }
                    PrivacyTarget::Group(group_id) => {
                        (
                            "priv_getTransactionCount",
                            json!([sender, STANDARD.encode(group_id)]),
                        )
                    }
                }
            }
        };
        JsonRpcRequest::new(method, params, self.downstream.next_request_id())
    }

    pub async fn resolve(&self, transaction: &Transaction) -> Result<U256> {
        let request = self.request_for(transaction);
        let method = request.method.clone();

        let response = self
            .downstream
            .call(&request)
            .await
            .map_err(|err| ProxyError::NonceResolution(format!("{method}: {err}")))?;

        if !response.status.is_success() {
            return Err(ProxyError::NonceResolution(format!(
                "{method} returned status {}",
                response.status
            )));
        }

        let envelope = ResponseEnvelope::parse(&response.body).ok_or_else(|| {
            ProxyError::NonceResolution(format!("{method} returned a malformed body"))
        })?;
        if let Some(error) = envelope.error {
            return Err(ProxyError::NonceResolution(format!(
                "{method} failed: {} ({})",
                error.message, error.code
            )));
        }

        let nonce = match envelope.result {
            Some(Value::String(quantity)) => parse_quantity(&quantity),
            _ => None,
        }
        .ok_or_else(|| {
            ProxyError::NonceResolution(format!("{method} did not return a hex quantity"))
        })?;

        debug!(sender = %transaction.sender(), %nonce, %method, "resolved nonce");
        Ok(nonce)
    }
}

fn parse_quantity(quantity: &str) -> Option<U256> {
    let digits = quantity.strip_prefix("0x")?;
    if digits.is_empty() {
        return None;
    }
    U256::from_str_radix(digits, 16).ok()
}
