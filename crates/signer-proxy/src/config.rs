use std::{
    net::SocketAddr,
    time::Duration,
};

use serde::{
    Deserialize,
    Serialize,
};
use url::Url;

use crate::{
    error::{
        ProxyError,
        Result,
    },
    signing::SigningMode,
};

/// Path of the liveness probe; reserved, so it cannot be the RPC path.
pub const UPCHECK_PATH: &str = "/upcheck";

/// Runtime configuration for the signing proxy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Address the HTTP server listens on (e.g. `127.0.0.1:8545`).
    pub bind_addr: SocketAddr,
    /// Path JSON-RPC calls are accepted on.
    pub rpc_path: String,
    /// Ethereum node every call is ultimately sent to.
    pub downstream_http: Url,
    /// Timeout for each downstream round trip, nonce lookups included.
    #[serde(default = "default_downstream_timeout_ms")]
    pub downstream_timeout_ms: u64,
    /// Chain id folded into signatures.
    pub chain_id: u64,
    #[serde(default)]
    pub signing_mode: SigningMode,
    /// Submissions allowed per request while the node keeps answering
    /// nonce-too-low.
    #[serde(default = "default_max_submission_attempts")]
    pub max_submission_attempts: u32,
    /// Maximum number of inbound requests handled at once; the rest wait.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_downstream_timeout_ms() -> u64 {
    5_000
}

fn default_max_submission_attempts() -> u32 {
    10
}

fn default_max_concurrent_requests() -> usize {
    1000
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8545)),
            rpc_path: "/".into(),
            downstream_http: Url::parse("http://127.0.0.1:8590").expect("static URL"),
            downstream_timeout_ms: default_downstream_timeout_ms(),
            chain_id: 1,
            signing_mode: SigningMode::default(),
            max_submission_attempts: default_max_submission_attempts(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl ProxyConfig {
    /// Validates a configuration loaded from CLI flags or disk.
    pub fn validate(self) -> Result<Self> {
        if self.rpc_path.is_empty() || !self.rpc_path.starts_with('/') {
            return Err(ProxyError::InvalidConfig(
                "rpc_path must start with '/'".to_string(),
            ));
        }
        if self.rpc_path == UPCHECK_PATH {
            return Err(ProxyError::InvalidConfig(format!(
                "rpc_path cannot be {UPCHECK_PATH}"
            )));
        }
        if !matches!(self.downstream_http.scheme(), "http" | "https") {
            return Err(ProxyError::InvalidConfig(format!(
                "downstream_http must be an http(s) URL, got {}",
                self.downstream_http
            )));
        }
        if self.downstream_timeout_ms == 0 {
            return Err(ProxyError::InvalidConfig(
                "downstream_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.chain_id == 0 {
            return Err(ProxyError::InvalidConfig(
                "chain_id must be greater than zero".to_string(),
            ));
        }
        if self.max_submission_attempts == 0 {
            return Err(ProxyError::InvalidConfig(
                "max_submission_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ProxyError::InvalidConfig(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }

        Ok(self)
    }

    pub fn downstream_timeout(&self) -> Duration {
        Duration::from_millis(self.downstream_timeout_ms)
    }
}
