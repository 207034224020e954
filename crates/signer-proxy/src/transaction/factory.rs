//! Builds [`Transaction`]s from `*_sendTransaction` parameters.

use std::fmt;

use alloy_primitives::{
    Address,
    Bytes,
    U256,
    hex,
};
use base64::{
    Engine as _,
    engine::general_purpose::STANDARD,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{
        ProxyError,
        Result,
    },
    transaction::{
        DEFAULT_GAS,
        DEFAULT_GAS_PRICE,
        DEFAULT_VALUE,
        PrivacyTarget,
        PrivateTransaction,
        PublicTransaction,
        Restriction,
        Transaction,
        TransactionFields,
    },
};

/// Enclave public keys are 32 bytes.
const PRIVACY_KEY_LEN: usize = 32;

/// Methods that are turned into signed raw transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendMethod {
    EthSendTransaction,
    EeaSendTransaction,
}

impl SendMethod {
    pub const ALL: [SendMethod; 2] = [SendMethod::EthSendTransaction, SendMethod::EeaSendTransaction];

    pub const fn name(self) -> &'static str {
        match self {
            SendMethod::EthSendTransaction => "eth_sendTransaction",
            SendMethod::EeaSendTransaction => "eea_sendTransaction",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }
}

impl fmt::Display for SendMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendTransactionParams {
    from: Option<String>,
    nonce: Option<String>,
    gas_price: Option<String>,
    gas: Option<String>,
    to: Option<String>,
    value: Option<String>,
    data: Option<String>,
    private_from: Option<String>,
    private_for: Option<Vec<String>>,
    privacy_group_id: Option<String>,
    restriction: Option<String>,
}

/// Parses the single transaction object in `params` into the variant `method`
/// submits.
pub fn create_transaction(method: SendMethod, params: Option<&Value>) -> Result<Transaction> {
    let object = match params {
        Some(Value::Array(values)) if values.len() == 1 => &values[0],
        _ => {
            return Err(ProxyError::InvalidParams(format!(
                "{method} expects a single transaction object"
            )));
        }
    };
    let params = SendTransactionParams::deserialize(object)
        .map_err(|err| ProxyError::InvalidParams(format!("malformed transaction object: {err}")))?;

    let fields = parse_fields(&params)?;
    match method {
        SendMethod::EthSendTransaction => Ok(Transaction::Public(PublicTransaction::new(fields))),
        SendMethod::EeaSendTransaction => parse_private(fields, &params).map(Transaction::Private),
    }
}

fn parse_fields(params: &SendTransactionParams) -> Result<TransactionFields> {
    let sender = params
        .from
        .as_deref()
        .ok_or_else(|| ProxyError::InvalidParams("missing 'from'".into()))
        .and_then(|from| parse_address("from", from))?;

    let recipient = match params.to.as_deref() {
        None | Some("") => None,
        Some(to) => Some(parse_address("to", to)?),
    };

    Ok(TransactionFields {
        sender,
        nonce: params
            .nonce
            .as_deref()
            .map(|nonce| parse_quantity("nonce", nonce))
            .transpose()?,
        gas_price: optional_quantity("gasPrice", params.gas_price.as_deref(), DEFAULT_GAS_PRICE)?,
        gas_limit: optional_quantity("gas", params.gas.as_deref(), DEFAULT_GAS)?,
        recipient,
        value: optional_quantity("value", params.value.as_deref(), DEFAULT_VALUE)?,
        data: params
            .data
            .as_deref()
            .map(|data| parse_data("data", data))
            .transpose()?
            .unwrap_or_default(),
    })
}

fn parse_private(
    fields: TransactionFields,
    params: &SendTransactionParams,
) -> Result<PrivateTransaction> {
    let private_from = params
        .private_from
        .as_deref()
        .ok_or_else(|| ProxyError::InvalidParams("missing 'privateFrom'".into()))
        .and_then(|key| parse_privacy_key("privateFrom", key))?;

    let target = match (&params.private_for, &params.privacy_group_id) {
        (Some(_), Some(_)) => {
            return Err(ProxyError::InvalidParams(
                "'privateFor' and 'privacyGroupId' are mutually exclusive".into(),
            ));
        }
        (Some(private_for), None) => {
            if private_for.is_empty() {
                return Err(ProxyError::InvalidParams("'privateFor' must not be empty".into()));
            }
            let participants = private_for
                .iter()
                .map(|key| parse_privacy_key("privateFor", key))
                .collect::<Result<Vec<_>>>()?;
            PrivacyTarget::Participants(participants)
        }
        (None, Some(group_id)) => {
            PrivacyTarget::Group(parse_privacy_key("privacyGroupId", group_id)?)
        }
        (None, None) => {
            return Err(ProxyError::InvalidParams(
                "one of 'privateFor' or 'privacyGroupId' is required".into(),
            ));
        }
    };

    let restriction = match params.restriction.as_deref() {
        None => Restriction::default(),
        Some(restriction) => restriction.parse().map_err(ProxyError::InvalidParams)?,
    };

    Ok(PrivateTransaction::new(
        fields,
        private_from,
        target,
        restriction,
    ))
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    value
        .parse()
        .map_err(|err| ProxyError::InvalidParams(format!("invalid '{field}' address: {err}")))
}

/// Parses a `0x`-prefixed hex quantity that must fit in 256 bits.
fn parse_quantity(field: &str, value: &str) -> Result<U256> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .filter(|digits| !digits.is_empty())
        .ok_or_else(|| {
            ProxyError::InvalidParams(format!("'{field}' must be a 0x-prefixed hex quantity"))
        })?;
    U256::from_str_radix(digits, 16)
        .map_err(|err| ProxyError::InvalidParams(format!("invalid '{field}' quantity: {err}")))
}

fn optional_quantity(field: &str, value: Option<&str>, default: u64) -> Result<U256> {
    match value {
        Some(value) => parse_quantity(field, value),
        None => Ok(U256::from(default)),
    }
}

fn parse_data(field: &str, value: &str) -> Result<Bytes> {
    hex::decode(value)
        .map(Bytes::from)
        .map_err(|err| ProxyError::InvalidParams(format!("invalid '{field}' hex: {err}")))
}

fn parse_privacy_key(field: &str, value: &str) -> Result<Bytes> {
    let decoded = STANDARD
        .decode(value)
        .map_err(|err| ProxyError::InvalidParams(format!("invalid '{field}' base64: {err}")))?;
    if decoded.len() != PRIVACY_KEY_LEN {
        return Err(ProxyError::InvalidParams(format!(
            "'{field}' must decode to {PRIVACY_KEY_LEN} bytes, got {}",
            decoded.len()
        )));
    }
    Ok(decoded.into())
}
