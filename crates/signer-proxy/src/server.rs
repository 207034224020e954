use std::{
    future::Future,
    sync::Arc,
};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    response::Response,
    routing::{
        get,
        post,
    },
};
use http::{
    HeaderMap,
    Method,
};
use tokio::{
    net::TcpListener,
    signal,
};
use tracing::{
    info,
    warn,
};

use crate::{
    config::{
        ProxyConfig,
        UPCHECK_PATH,
    },
    dispatcher::RequestDispatcher,
    downstream::DownstreamClient,
    error::{
        ProxyError,
        Result,
    },
    handlers::{
        EthAccountsHandler,
        PassThroughHandler,
        SendTransactionHandler,
        send_transaction::SubmissionSettings,
    },
    signing::SharedSignerProvider,
    transaction::factory::SendMethod,
};

/// Builder that wires configuration, signers and the dispatcher together.
pub struct SignerProxyBuilder {
    config: ProxyConfig,
    signer_provider: Option<SharedSignerProvider>,
}

impl SignerProxyBuilder {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            config,
            signer_provider: None,
        }
    }

    pub fn with_signer_provider(mut self, provider: SharedSignerProvider) -> Self {
        self.signer_provider = Some(provider);
        self
    }

    pub fn build(self) -> Result<SignerProxy> {
        let config = self.config.validate()?;
        let signers = self
            .signer_provider
            .ok_or_else(|| ProxyError::InvalidConfig("no signer configured".to_string()))?;

        let downstream =
            DownstreamClient::new(config.downstream_http.clone(), config.downstream_timeout())?;
        let dispatcher = build_dispatcher(&config, signers, downstream);
        let state = ProxyState {
            dispatcher: Arc::new(dispatcher),
        };

        Ok(SignerProxy { config, state })
    }
}

fn build_dispatcher(
    config: &ProxyConfig,
    signers: SharedSignerProvider,
    downstream: DownstreamClient,
) -> RequestDispatcher {
    let settings = SubmissionSettings::from(config);
    let mut dispatcher =
        RequestDispatcher::new(Arc::new(PassThroughHandler::new(downstream.clone())))
            .with_concurrency_limit(config.max_concurrent_requests);

    for method in SendMethod::ALL {
        dispatcher.add_handler(
            method.name(),
            Arc::new(SendTransactionHandler::new(
                method,
                signers.clone(),
                downstream.clone(),
                settings,
            )),
        );
    }
    dispatcher.add_handler("eth_accounts", Arc::new(EthAccountsHandler::new(signers)));

    dispatcher
}

pub struct SignerProxy {
    config: ProxyConfig,
    state: ProxyState,
}

impl SignerProxy {
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The axum router serving the RPC path and `/upcheck`.
    pub fn router(&self) -> Router {
        Router::new()
            .route(UPCHECK_PATH, get(upcheck))
            .route(&self.config.rpc_path, post(handle_rpc))
            .with_state(self.state.clone())
    }

    /// Binds the configured address and serves until Ctrl-C.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr).await?;
        self.serve_with_listener(listener, shutdown_signal()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves. From then
    /// on, requests still waiting for a concurrency slot get `503`.
    pub async fn serve_with_listener(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let addr = listener.local_addr()?;
        let path = self.config.rpc_path.clone();
        info!(
            %addr,
            %path,
            downstream = %self.config.downstream_http,
            chain_id = self.config.chain_id,
            signing_mode = %self.config.signing_mode,
            "signer proxy listening"
        );

        let dispatcher = self.state.dispatcher.clone();
        let shutdown = async move {
            shutdown.await;
            dispatcher.close();
        };
        axum::serve(listener, self.router().into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("signer proxy shutdown complete");

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(%err, "failed to listen for shutdown signal");
    }
}

#[derive(Clone)]
struct ProxyState {
    dispatcher: Arc<RequestDispatcher>,
}

async fn upcheck() -> &'static str {
    "I'm up!"
}

#[tracing::instrument(name = "rpc", skip_all, fields(method = %method, len = body.len()))]
async fn handle_rpc(
    State(state): State<ProxyState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.dispatcher.dispatch(method, headers, body).await
}
