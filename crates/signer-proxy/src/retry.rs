//! Decides whether a submission rejected for a stale nonce is sent again.
//!
//! A fresh [`RetryMechanism`] is created per client request. Each submission
//! calls [`RetryMechanism::begin_attempt`] and hands the node's reply to
//! [`RetryMechanism::evaluate`]:
//!
//! ```text
//! Idle -> Evaluating -> Accepted    success, or any error that is not nonce-too-low
//!                    -> Retry       nonce-too-low, budget left
//!                    -> Exhausted   nonce-too-low, budget spent
//! ```

use http::StatusCode;

use crate::jsonrpc::{
    JsonRpcError,
    ResponseEnvelope,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Evaluating,
    Retry,
    Exhausted,
    Accepted,
}

#[derive(Debug, Clone)]
pub struct RetryMechanism {
    attempts_made: u32,
    max_attempts: u32,
    enabled: bool,
    state: RetryState,
}

impl RetryMechanism {
    /// Allows up to `max_attempts` submissions in total.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts_made: 0,
            max_attempts,
            enabled: true,
            state: RetryState::Idle,
        }
    }

    /// Never retries; nonce-too-low replies are accepted and relayed. Used when
    /// the caller picked the nonce.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(1)
        }
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Records a submission about to be sent.
    pub fn begin_attempt(&mut self) {
        self.attempts_made += 1;
        self.state = RetryState::Evaluating;
    }

    /// Classifies the reply to the latest submission.
    pub fn evaluate(&mut self, status: StatusCode, body: &[u8]) -> RetryState {
        self.state = if !self.enabled || !is_nonce_too_low(status, body) {
            RetryState::Accepted
        } else if self.attempts_made < self.max_attempts {
            RetryState::Retry
        } else {
            RetryState::Exhausted
        };
        self.state
    }
}

/// Whether a reply says the submitted nonce was already used. Only a 400
/// counts; other statuses are relayed whatever their body says.
pub fn is_nonce_too_low(status: StatusCode, body: &[u8]) -> bool {
    if status != StatusCode::BAD_REQUEST {
        return false;
    }
    let Some(error) = ResponseEnvelope::parse(body).and_then(|envelope| envelope.error) else {
        return false;
    };

    matches!(
        JsonRpcError::from_parts(error.code, &error.message),
        Some(
            JsonRpcError::NonceTooLow
                | JsonRpcError::EthSendTxAlreadyKnown
                | JsonRpcError::PrivateNonceTooLow
        )
    ) || error.message.to_ascii_lowercase().contains("nonce too low")
}
