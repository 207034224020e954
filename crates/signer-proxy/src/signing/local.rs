use std::{
    fmt,
    path::Path,
};

use alloy_primitives::{
    Address,
    B256,
    keccak256,
};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

use crate::{
    error::{
        ProxyError,
        Result,
    },
    signing::{
        Signature,
        TransactionSigner,
    },
};

/// Signer backed by an in-memory secp256k1 key.
#[derive(Clone)]
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    pub fn new(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }

    /// Parses a hex private key, with or without `0x`.
    pub fn from_hex(key: &str) -> Result<Self> {
        let bytes: B256 = key
            .trim()
            .parse()
            .map_err(|err| ProxyError::InvalidConfig(format!("invalid private key hex: {err}")))?;
        let inner = PrivateKeySigner::from_bytes(&bytes)
            .map_err(|err| ProxyError::InvalidConfig(format!("invalid private key: {err}")))?;
        Ok(Self::new(inner))
    }

    /// Reads a hex private key from `path`.
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_hex(&contents)
    }
}

// Never print key material.
impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.inner.address())
            .finish()
    }
}

impl TransactionSigner for LocalSigner {
    fn sign(&self, payload: &[u8]) -> Result<Signature> {
        let signature = self
            .inner
            .sign_hash_sync(&keccak256(payload))
            .map_err(|err| ProxyError::Signing(err.to_string()))?;
        Ok(Signature {
            v: 27 + u8::from(signature.v()),
            r: signature.r(),
            s: signature.s(),
        })
    }

    fn address(&self) -> Address {
        self.inner.address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use std::io::Write;

    const KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";

    #[test]
    fn derives_address_from_key() {
        let signer = LocalSigner::from_hex(KEY).unwrap();
        assert_eq!(
            signer.address(),
            address!("9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F")
        );
        assert_eq!(
            LocalSigner::from_hex(KEY.trim_start_matches("0x"))
                .unwrap()
                .address(),
            signer.address()
        );
    }

    #[test]
    fn rejects_malformed_keys() {
        let zero_key = format!("0x{}", "00".repeat(32));
        for key in ["", "0x1234", "not a key", zero_key.as_str()] {
            assert!(matches!(
                LocalSigner::from_hex(key),
                Err(ProxyError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn loads_key_file_with_trailing_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{KEY}").unwrap();

        let signer = LocalSigner::from_key_file(file.path()).unwrap();
        assert_eq!(
            signer.address(),
            address!("9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F")
        );
    }

    #[test]
    fn missing_key_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LocalSigner::from_key_file(&dir.path().join("missing.key")),
            Err(ProxyError::Io(_))
        ));
    }

    #[test]
    fn signature_has_raw_recovery_byte() {
        let signer = LocalSigner::from_hex(KEY).unwrap();
        let signature = signer.sign(b"payload").unwrap();
        assert!(signature.v == 27 || signature.v == 28);
        assert!(!signature.r.is_zero());
        assert!(!signature.s.is_zero());
    }

    #[test]
    fn debug_hides_key() {
        let signer = LocalSigner::from_hex(KEY).unwrap();
        let debug = format!("{signer:?}");
        assert!(!debug.contains("4646464646"));
    }
}
