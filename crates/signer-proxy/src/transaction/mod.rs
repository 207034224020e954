//! Signable transactions and their RLP encoding.
//!
//! A [`Transaction`] is built from `eth_sendTransaction` or
//! `eea_sendTransaction` parameters by [`factory::create_transaction`]. Its nonce
//! stays unresolved until the caller supplied one or the nonce provider filled
//! it in; encoding an unresolved transaction is an error.

pub mod factory;
pub mod privacy;
mod private;
mod public;

pub use private::{
    PrivacyTarget,
    PrivateTransaction,
    Restriction,
};
pub use public::PublicTransaction;

use alloy_primitives::{
    Address,
    Bytes,
    U256,
    hex,
};
use alloy_rlp::{
    EMPTY_STRING_CODE,
    Encodable,
    Header,
};
use serde_json::json;

use crate::{
    error::{
        ProxyError,
        Result,
    },
    jsonrpc::{
        JsonRpcRequest,
        RequestId,
    },
};

pub const DEFAULT_GAS: u64 = 90_000;
pub const DEFAULT_GAS_PRICE: u64 = 0;
pub const DEFAULT_VALUE: u64 = 0;

/// The `v`, `r`, `s` triple as it is placed in the RLP list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureData {
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

impl SignatureData {
    /// Placeholder signature that embeds the chain id before signing (EIP-155).
    pub fn replay_protection(chain_id: u64) -> Self {
        Self {
            v: U256::from(chain_id),
            r: U256::ZERO,
            s: U256::ZERO,
        }
    }
}

/// Fields every transaction variant carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFields {
    pub sender: Address,
    pub nonce: Option<U256>,
    pub gas_price: U256,
    pub gas_limit: U256,
    /// `None` deploys a contract.
    pub recipient: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

impl TransactionFields {
    /// Appends `nonce, gasPrice, gasLimit, to, value, data` and, when given, `v, r, s`.
    fn encode_standard(&self, signature: Option<&SignatureData>, out: &mut Vec<u8>) -> Result<()> {
        let nonce = self
            .nonce
            .ok_or_else(|| ProxyError::Encoding("nonce has not been resolved".into()))?;

        nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        match &self.recipient {
            Some(recipient) => recipient.encode(out),
            None => out.push(EMPTY_STRING_CODE),
        }
        self.value.encode(out);
        self.data.encode(out);

        if let Some(signature) = signature {
            signature.v.encode(out);
            signature.r.encode(out);
            signature.s.encode(out);
        }

        Ok(())
    }
}

/// Wraps an already encoded payload in an RLP list header.
fn rlp_list(payload: Vec<u8>) -> Vec<u8> {
    let header = Header {
        list: true,
        payload_length: payload.len(),
    };
    let mut out: Vec<u8> = Vec::with_capacity(header.length() + payload.len());
    header.encode(&mut out);
    out.extend_from_slice(&payload);
    out
}

/// Lowercase `0x`-prefixed address, the form sent to the node.
pub(crate) fn hex_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Public(PublicTransaction),
    Private(PrivateTransaction),
}

impl Transaction {
    fn fields(&self) -> &TransactionFields {
        match self {
            Transaction::Public(tx) => &tx.fields,
            Transaction::Private(tx) => &tx.fields,
        }
    }

    pub fn sender(&self) -> Address {
        self.fields().sender
    }

    pub fn nonce(&self) -> Option<U256> {
        self.fields().nonce
    }

    pub fn is_nonce_user_specified(&self) -> bool {
        self.fields().nonce.is_some()
    }

    pub fn update_nonce(&mut self, nonce: U256) {
        match self {
            Transaction::Public(tx) => tx.fields.nonce = Some(nonce),
            Transaction::Private(tx) => tx.fields.nonce = Some(nonce),
        }
    }

    /// RLP encoding of the transaction. Without a signature this is the payload
    /// that gets signed.
    pub fn rlp_encode(&self, signature: Option<&SignatureData>) -> Result<Vec<u8>> {
        match self {
            Transaction::Public(tx) => tx.rlp_encode(signature),
            Transaction::Private(tx) => tx.rlp_encode(signature),
        }
    }

    /// Method used to submit the signed transaction.
    pub fn raw_method(&self) -> &'static str {
        match self {
            Transaction::Public(_) => "eth_sendRawTransaction",
            Transaction::Private(_) => "eea_sendRawTransaction",
        }
    }

    pub fn send_raw_request(&self, signed_hex: String, id: RequestId) -> JsonRpcRequest {
        JsonRpcRequest::new(self.raw_method(), json!([signed_hex]), id)
    }
}
