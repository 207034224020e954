use std::{
    fmt,
    str::FromStr,
    sync::Arc,
};

use alloy_primitives::{
    U256,
    hex,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    error::Result,
    signing::TransactionSigner,
    transaction::{
        SignatureData,
        Transaction,
    },
};

/// How the signature `v` value is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    /// Chain id folded into `v`, as in EIP-155.
    #[default]
    Eip155,
    /// GoQuorum private transactions: the chain id is not signed and `v` is 37
    /// or 38.
    GoQuorum,
}

impl SigningMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            SigningMode::Eip155 => "eip155",
            SigningMode::GoQuorum => "goquorum",
        }
    }
}

impl fmt::Display for SigningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eip155" => Ok(SigningMode::Eip155),
            "goquorum" => Ok(SigningMode::GoQuorum),
            other => Err(format!("unknown signing mode {other:?}, expected eip155 or goquorum")),
        }
    }
}

/// `v = recoveryId + chainId * 2 + 35`.
pub fn eip155_v(raw_v: u8, chain_id: u64) -> U256 {
    let recovery_id = U256::from(raw_v.saturating_sub(27));
    recovery_id + U256::from(chain_id) * U256::from(2) + U256::from(35)
}

pub fn goquorum_v(raw_v: u8) -> U256 {
    if raw_v == 28 {
        U256::from(38)
    } else {
        U256::from(37)
    }
}

/// Turns a resolved [`Transaction`] into a signed `0x`-prefixed raw
/// transaction.
#[derive(Debug, Clone)]
pub struct TransactionSerializer {
    signer: Arc<dyn TransactionSigner>,
    mode: SigningMode,
}

impl TransactionSerializer {
    pub fn new(signer: Arc<dyn TransactionSigner>, mode: SigningMode) -> Self {
        Self { signer, mode }
    }

    pub fn mode(&self) -> SigningMode {
        self.mode
    }

    pub fn serialize(&self, transaction: &Transaction, chain_id: u64) -> Result<String> {
        let replay_protection = match self.mode {
            SigningMode::Eip155 => Some(SignatureData::replay_protection(chain_id)),
            SigningMode::GoQuorum => None,
        };
        let payload = transaction.rlp_encode(replay_protection.as_ref())?;
        let signature = self.signer.sign(&payload)?;

        let v = match self.mode {
            SigningMode::Eip155 => eip155_v(signature.v, chain_id),
            SigningMode::GoQuorum => goquorum_v(signature.v),
        };
        let signed = transaction.rlp_encode(Some(&SignatureData {
            v,
            r: signature.r,
            s: signature.s,
        }))?;

        Ok(format!("0x{}", hex::encode(signed)))
    }
}
