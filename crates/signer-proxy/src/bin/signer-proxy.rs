use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use clap::Parser;
use signer_proxy::{
    ProxyConfig,
    SignerProxyBuilder,
    signing::{
        LocalSigner,
        MultiSignerProvider,
        SharedSignerProvider,
        SignerProvider,
        SigningMode,
        SingleSignerProvider,
        TransactionSigner,
    },
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use url::Url;

#[derive(Debug, Parser)]
#[command(author, version, about = "Transaction-signing JSON-RPC proxy", long_about = None)]
struct Cli {
    /// Address for the proxy HTTP server (e.g. 0.0.0.0:8545)
    #[arg(long = "listen", env = "SIGNER_LISTEN_ADDR", default_value = "127.0.0.1:8545")]
    listen_addr: SocketAddr,
    /// JSON-RPC path exposed by the proxy
    #[arg(long = "rpc-path", env = "SIGNER_RPC_PATH", default_value = "/")]
    rpc_path: String,
    /// Ethereum node HTTP endpoint
    #[arg(long = "downstream", env = "SIGNER_DOWNSTREAM", default_value = "http://127.0.0.1:8590")]
    downstream: String,
    /// Timeout for each downstream request, in milliseconds
    #[arg(long = "downstream-timeout-ms", env = "SIGNER_DOWNSTREAM_TIMEOUT_MS", default_value = "5000")]
    downstream_timeout_ms: u64,
    /// Chain id signed into every transaction
    #[arg(long = "chain-id", env = "SIGNER_CHAIN_ID")]
    chain_id: u64,
    /// Signature scheme: eip155 or goquorum
    #[arg(long = "signing-mode", env = "SIGNER_SIGNING_MODE", default_value = "eip155")]
    signing_mode: SigningMode,
    /// Submissions per request while the node reports nonce too low
    #[arg(long = "max-submission-attempts", env = "SIGNER_MAX_SUBMISSION_ATTEMPTS", default_value = "10")]
    max_submission_attempts: u32,
    /// Inbound requests handled concurrently
    #[arg(long = "max-concurrent-requests", env = "SIGNER_MAX_CONCURRENT_REQUESTS", default_value = "1000")]
    max_concurrent_requests: usize,
    /// Hex private key used for signing
    #[arg(long = "private-key", env = "SIGNER_PRIVATE_KEY", hide_env_values = true, conflicts_with = "key_file")]
    private_key: Option<String>,
    /// File containing a hex private key; repeat to sign for several senders
    #[arg(long = "key-file", env = "SIGNER_KEY_FILES", value_delimiter = ',')]
    key_file: Vec<PathBuf>,
    /// Log level, used when RUST_LOG is unset
    #[arg(long = "log-level", env = "SIGNER_LOG_LEVEL", default_value = "info")]
    log_level: LevelFilter,
}

impl Cli {
    fn signers(&self) -> anyhow::Result<SharedSignerProvider> {
        match (&self.private_key, self.key_file.as_slice()) {
            (Some(key), []) => {
                let signer: Arc<dyn TransactionSigner> = Arc::new(LocalSigner::from_hex(key)?);
                Ok(Arc::new(SingleSignerProvider::new(signer)))
            }
            (None, paths) if !paths.is_empty() => {
                let provider = MultiSignerProvider::from_key_files(paths)
                    .context("failed to load key files")?;
                Ok(Arc::new(provider))
            }
            _ => anyhow::bail!("either --private-key or at least one --key-file is required"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(cli.log_level.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let signers = cli.signers()?;
    for address in signers.addresses() {
        tracing::info!(%address, "loaded signing key");
    }

    let config = ProxyConfig {
        bind_addr: cli.listen_addr,
        rpc_path: cli.rpc_path,
        downstream_http: Url::parse(&cli.downstream)?,
        downstream_timeout_ms: cli.downstream_timeout_ms,
        chain_id: cli.chain_id,
        signing_mode: cli.signing_mode,
        max_submission_attempts: cli.max_submission_attempts,
        max_concurrent_requests: cli.max_concurrent_requests,
    }
    .validate()?;

    SignerProxyBuilder::new(config)
        .with_signer_provider(signers)
        .build()?
        .serve()
        .await?;
    Ok(())
}
