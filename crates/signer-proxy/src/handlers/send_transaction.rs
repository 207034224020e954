use async_trait::async_trait;
use axum::response::Response;
use tracing::{
    debug,
    info,
    warn,
};

use crate::{
    config::ProxyConfig,
    downstream::DownstreamClient,
    error::ProxyError,
    handlers::{
        InboundRequest,
        RequestHandler,
    },
    nonce::NonceProvider,
    response,
    retry::RetryMechanism,
    signing::{
        SharedSignerProvider,
        SigningMode,
        TransactionSerializer,
    },
    transaction::{
        Transaction,
        factory::{
            SendMethod,
            create_transaction,
        },
    },
    transmitter::{
        SendTransactionContext,
        TransactionTransmitter,
    },
};

/// Signing parameters shared by every submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionSettings {
    pub chain_id: u64,
    pub signing_mode: SigningMode,
    pub max_submission_attempts: u32,
}

impl From<&ProxyConfig> for SubmissionSettings {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            signing_mode: config.signing_mode,
            max_submission_attempts: config.max_submission_attempts,
        }
    }
}

/// Signs `eth_sendTransaction` / `eea_sendTransaction` calls and submits them
/// as raw transactions.
#[derive(Debug, Clone)]
pub struct SendTransactionHandler {
    method: SendMethod,
    signers: SharedSignerProvider,
    downstream: DownstreamClient,
    nonce_provider: NonceProvider,
    settings: SubmissionSettings,
}

impl SendTransactionHandler {
    pub fn new(
        method: SendMethod,
        signers: SharedSignerProvider,
        downstream: DownstreamClient,
        settings: SubmissionSettings,
    ) -> Self {
        Self {
            method,
            signers,
            nonce_provider: NonceProvider::new(downstream.clone()),
            downstream,
            settings,
        }
    }
}

#[async_trait]
impl RequestHandler for SendTransactionHandler {
    async fn handle(&self, request: InboundRequest) -> Response {
        let id = request.rpc.id;
        let transaction = match create_transaction(self.method, request.rpc.params.as_ref()) {
            Ok(transaction) => transaction,
            Err(err) => {
                debug!(%err, method = %self.method, %id, "rejecting transaction parameters");
                return response::from_proxy_error(id, &err);
            }
        };

        let sender = transaction.sender();
        let Some(signer) = self.signers.signer(&sender) else {
            let err = ProxyError::SenderNotUnlocked(sender);
            warn!(%err, method = %self.method, %id, "refusing to sign");
            return response::from_proxy_error(id, &err);
        };

        if let Transaction::Private(private) = &transaction {
            info!(
                %sender,
                privacy_group_id = %private.privacy_group_id(),
                restriction = %private.restriction,
                "signing private transaction"
            );
        }

        // A caller-chosen nonce is submitted as is; conflicts are the caller's.
        let retry = if transaction.is_nonce_user_specified() {
            RetryMechanism::disabled()
        } else {
            RetryMechanism::new(self.settings.max_submission_attempts)
        };

        let transmitter = TransactionTransmitter::new(
            self.downstream.clone(),
            self.nonce_provider.clone(),
            TransactionSerializer::new(signer, self.settings.signing_mode),
            self.settings.chain_id,
        );
        transmitter
            .submit(SendTransactionContext {
                method: self.method,
                headers: request.headers,
                id,
                transaction,
                retry,
            })
            .await
    }
}
