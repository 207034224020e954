//! Transaction-signing JSON-RPC proxy.
//!
//! The proxy sits between a JSON-RPC client and an Ethereum node. Calls to
//! `eth_sendTransaction` and `eea_sendTransaction` are turned into signed raw
//! transactions with a locally held key and submitted as
//! `eth_sendRawTransaction` / `eea_sendRawTransaction`. Every other call is
//! forwarded to the node untouched.
//!
//! Two integration surfaces are exposed:
//!
//! - [`SignerProxy`], the server the `signer-proxy` binary runs.
//! - The pipeline pieces ([`transaction`], [`signing`], [`nonce`], [`retry`],
//!   [`transmitter`]) for embedding the signing flow elsewhere.

pub mod config;
pub mod dispatcher;
pub mod downstream;
pub mod error;
pub mod handlers;
pub mod jsonrpc;
pub mod nonce;
pub mod response;
pub mod retry;
pub mod server;
pub mod signing;
pub mod transaction;
pub mod transmitter;

pub use config::ProxyConfig;
pub use error::{
    ProxyError,
    Result,
};
pub use server::{
    SignerProxy,
    SignerProxyBuilder,
};
