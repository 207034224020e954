//! JSON-RPC 2.0 envelope types shared by the inbound and downstream sides.

use std::fmt;

use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    de,
};
use serde_json::{
    Number,
    Value,
};

pub const JSON_RPC_VERSION: &str = "2.0";

/// A JSON-RPC request id.
///
/// Responses must carry the id exactly as it arrived. `serde_json` is built
/// with `arbitrary_precision`, so a [`Number`] keeps its source digits (a
/// 30-digit integer or `1e3` is written back unchanged).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(Number),
    String(String),
    Null,
}

impl RequestId {
    /// Accepts the id shapes JSON-RPC allows. Objects, arrays and booleans are
    /// rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => Some(RequestId::Number(number.clone())),
            Value::String(string) => Some(RequestId::String(string.clone())),
            Value::Null => Some(RequestId::Null),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestId::Number(number) => Value::Number(number.clone()),
            RequestId::String(string) => Value::String(string.clone()),
            RequestId::Null => Value::Null,
        }
    }
}

// Untagged enums buffer their input, which loses arbitrary-precision numbers.
impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RequestId::from_value(&value)
            .ok_or_else(|| de::Error::custom("id must be a number, string or null"))
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        RequestId::Number(id.into())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(number) => write!(f, "{number}"),
            RequestId::String(string) => write!(f, "{string:?}"),
            RequestId::Null => f.write_str("null"),
        }
    }
}

/// Errors the proxy emits or recognises on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcError {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    NonceTooLow,
    EthSendTxAlreadyKnown,
    PrivateNonceTooLow,
    WrongChainId,
    ReplayProtectedSignaturesNotSupported,
    FailedToConnectToDownstreamNode,
    ConnectionToDownstreamNodeTimedOut,
}

impl JsonRpcError {
    const ALL: [JsonRpcError; 12] = [
        JsonRpcError::ParseError,
        JsonRpcError::InvalidRequest,
        JsonRpcError::MethodNotFound,
        JsonRpcError::InvalidParams,
        JsonRpcError::InternalError,
        JsonRpcError::NonceTooLow,
        JsonRpcError::EthSendTxAlreadyKnown,
        JsonRpcError::PrivateNonceTooLow,
        JsonRpcError::WrongChainId,
        JsonRpcError::ReplayProtectedSignaturesNotSupported,
        JsonRpcError::FailedToConnectToDownstreamNode,
        JsonRpcError::ConnectionToDownstreamNodeTimedOut,
    ];

    pub const fn code(self) -> i32 {
        match self {
            JsonRpcError::ParseError => -32700,
            JsonRpcError::InvalidRequest => -32600,
            JsonRpcError::MethodNotFound => -32601,
            JsonRpcError::InvalidParams => -32602,
            JsonRpcError::InternalError => -32603,
            JsonRpcError::NonceTooLow => -32001,
            JsonRpcError::PrivateNonceTooLow => -50100,
            JsonRpcError::EthSendTxAlreadyKnown
            | JsonRpcError::WrongChainId
            | JsonRpcError::ReplayProtectedSignaturesNotSupported
            | JsonRpcError::FailedToConnectToDownstreamNode
            | JsonRpcError::ConnectionToDownstreamNodeTimedOut => -32000,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            JsonRpcError::ParseError => "Parse error",
            JsonRpcError::InvalidRequest => "Invalid Request",
            JsonRpcError::MethodNotFound => "Method not found",
            JsonRpcError::InvalidParams => "Invalid params",
            JsonRpcError::InternalError => "Internal error",
            JsonRpcError::NonceTooLow => "Nonce too low",
            JsonRpcError::EthSendTxAlreadyKnown => "Known transaction",
            JsonRpcError::PrivateNonceTooLow => "Private transaction nonce too low",
            JsonRpcError::WrongChainId => "Wrong chainId",
            JsonRpcError::ReplayProtectedSignaturesNotSupported => "ChainId not supported",
            JsonRpcError::FailedToConnectToDownstreamNode => {
                "Failed to connect to downstream node"
            }
            JsonRpcError::ConnectionToDownstreamNodeTimedOut => {
                "Connection to downstream node timed out"
            }
        }
    }

    /// Looks up a known error by its wire code and message.
    pub fn from_parts(code: i64, message: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|error| i64::from(error.code()) == code && error.message() == message)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// `error` member of a JSON-RPC error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

impl From<JsonRpcError> for ErrorObject {
    fn from(error: JsonRpcError) -> Self {
        Self {
            code: i64::from(error.code()),
            message: error.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub error: ErrorObject,
}

impl JsonRpcErrorResponse {
    pub fn new(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION,
            id,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcSuccessResponse {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub result: Value,
}

impl JsonRpcSuccessResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION,
            id,
            result,
        }
    }
}

/// Loose view of a response body, used to inspect node replies.
#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

impl ResponseEnvelope {
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}

/// Validated JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

/// Reason an inbound envelope was rejected, along with whatever id could be
/// recovered from it.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidEnvelope {
    pub id: RequestId,
    pub reason: &'static str,
}

impl fmt::Display for InvalidEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason)
    }
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
            id,
        }
    }

    /// Parses and validates a request body.
    pub fn parse(body: &[u8]) -> Result<Self, InvalidEnvelope> {
        let json: Value = serde_json::from_slice(body).map_err(|_| {
            InvalidEnvelope {
                id: RequestId::Null,
                reason: "Request body is not valid JSON",
            }
        })?;
        Self::validate(json)
    }

    /// Validates a JSON-RPC request from a raw JSON value.
    pub fn validate(json: Value) -> Result<Self, InvalidEnvelope> {
        let obj = json.as_object().ok_or(InvalidEnvelope {
            id: RequestId::Null,
            reason: "Request must be a JSON object",
        })?;

        // Recover the id first so every later rejection can still be correlated.
        let id = match obj.get("id") {
            None => RequestId::Null,
            Some(value) => {
                RequestId::from_value(value).ok_or(InvalidEnvelope {
                    id: RequestId::Null,
                    reason: "Id must be a number, string or null",
                })?
            }
        };

        let jsonrpc = obj.get("jsonrpc").and_then(Value::as_str).ok_or_else(|| {
            InvalidEnvelope {
                id: id.clone(),
                reason: "Missing or invalid 'jsonrpc' field",
            }
        })?;

        if jsonrpc != JSON_RPC_VERSION {
            return Err(InvalidEnvelope {
                id,
                reason: "JSON-RPC version must be 2.0",
            });
        }

        let method = obj
            .get("method")
            .and_then(Value::as_str)
            .filter(|method| !method.is_empty())
            .ok_or_else(|| {
                InvalidEnvelope {
                    id: id.clone(),
                    reason: "Missing or invalid 'method' field",
                }
            })?;

        let params = match obj.get("params") {
            None | Some(Value::Null) => None,
            Some(params @ (Value::Array(_) | Value::Object(_))) => Some(params.clone()),
            Some(_) => {
                return Err(InvalidEnvelope {
                    id,
                    reason: "Params must be an array, object or null",
                });
            }
        };

        Ok(JsonRpcRequest {
            jsonrpc: jsonrpc.to_string(),
            method: method.to_string(),
            params,
            id,
        })
    }
}
