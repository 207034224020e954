//! Signing collaborators and the raw-transaction serializer.
//!
//! The proxy never touches key material directly. It asks a [`SignerProvider`]
//! for the [`TransactionSigner`] owning a sender address and hands it the
//! bytes to sign. Key storage backends plug in behind these traits.

mod local;
mod serializer;

use std::{
    collections::HashMap,
    fmt::Debug,
    path::Path,
    sync::Arc,
};

use alloy_primitives::{
    Address,
    U256,
};

pub use local::LocalSigner;
pub use serializer::{
    SigningMode,
    TransactionSerializer,
    eip155_v,
    goquorum_v,
};

use crate::error::{
    ProxyError,
    Result,
};

/// Recoverable secp256k1 signature. `v` is the raw recovery byte (27 or 28).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub v: u8,
    pub r: U256,
    pub s: U256,
}

/// Signs payloads on behalf of a single address.
pub trait TransactionSigner: Send + Sync + Debug {
    /// Signs `keccak256(payload)`.
    fn sign(&self, payload: &[u8]) -> Result<Signature>;

    fn address(&self) -> Address;
}

/// Resolves the signer responsible for a sender address.
pub trait SignerProvider: Send + Sync + Debug {
    fn signer(&self, address: &Address) -> Option<Arc<dyn TransactionSigner>>;

    /// Every address this provider can sign for.
    fn addresses(&self) -> Vec<Address>;
}

pub type SharedSignerProvider = Arc<dyn SignerProvider>;

/// Provider backed by one signer.
#[derive(Debug, Clone)]
pub struct SingleSignerProvider {
    signer: Arc<dyn TransactionSigner>,
}

impl SingleSignerProvider {
    pub fn new(signer: Arc<dyn TransactionSigner>) -> Self {
        Self { signer }
    }
}

impl SignerProvider for SingleSignerProvider {
    fn signer(&self, address: &Address) -> Option<Arc<dyn TransactionSigner>> {
        (self.signer.address() == *address).then(|| self.signer.clone())
    }

    fn addresses(&self) -> Vec<Address> {
        vec![self.signer.address()]
    }
}

/// Provider holding several signers keyed by their address.
#[derive(Debug, Clone, Default)]
pub struct MultiSignerProvider {
    signers: HashMap<Address, Arc<dyn TransactionSigner>>,
}

impl MultiSignerProvider {
    pub fn new(signers: impl IntoIterator<Item = Arc<dyn TransactionSigner>>) -> Self {
        Self {
            signers: signers
                .into_iter()
                .map(|signer| (signer.address(), signer))
                .collect(),
        }
    }

    /// Loads one [`LocalSigner`] per key file. Two files holding the same key
    /// are rejected.
    pub fn from_key_files<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self> {
        let mut signers: HashMap<Address, Arc<dyn TransactionSigner>> = HashMap::new();
        for path in paths {
            let path = path.as_ref();
            let signer = LocalSigner::from_key_file(path)?;
            let address = signer.address();
            if signers.insert(address, Arc::new(signer)).is_some() {
                return Err(ProxyError::InvalidConfig(format!(
                    "{} holds the key for {address}, which is already loaded",
                    path.display()
                )));
            }
        }
        if signers.is_empty() {
            return Err(ProxyError::InvalidConfig("no key files given".to_string()));
        }
        Ok(Self { signers })
    }
}

impl SignerProvider for MultiSignerProvider {
    fn signer(&self, address: &Address) -> Option<Arc<dyn TransactionSigner>> {
        self.signers.get(address).cloned()
    }

    fn addresses(&self) -> Vec<Address> {
        self.signers.keys().copied().collect()
    }
}
