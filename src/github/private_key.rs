//! Loading of the GitHub App private key.
//!
//! GitHub hands out App keys as PEM files holding a PKCS#1 `RSA PRIVATE KEY`
//! block. The key is parsed once and shared read-only by every signer.

use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs1v15;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::{Error, Result};
use super::until_cancelled;

/// RSA private key used to sign App assertions.
///
/// Keys below 2048 bits are accepted too, though GitHub issues 2048-bit keys.
#[derive(Clone)]
pub struct SigningKey {
    signer: Arc<pkcs1v15::SigningKey<Sha256>>,
    public_key_der: Arc<[u8]>,
    size: usize,
}

impl SigningKey {
    /// Size of the public modulus in bytes (256 for a 2048-bit key).
    pub fn size(&self) -> usize {
        self.size
    }

    /// DER-encoded PKCS#1 `RSAPublicKey` for verifying assertions.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    pub(crate) fn signer(&self) -> &pkcs1v15::SigningKey<Sha256> {
        &self.signer
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("bits", &(self.size() * 8))
            .finish_non_exhaustive()
    }
}

/// Parse a PEM-encoded PKCS#1 RSA private key.
pub fn parse_private_key(pem_bytes: &[u8]) -> Result<SigningKey> {
    let block = pem::parse(pem_bytes)
        .map_err(|e| Error::Format(format!("no pem block found: {}", e)))?;

    let private_key = RsaPrivateKey::from_pkcs1_der(block.contents())
        .map_err(|e| Error::Format(format!("not a pkcs#1 rsa key: {}", e)))?;
    let public_key_der = private_key
        .to_public_key()
        .to_pkcs1_der()
        .map_err(|e| Error::Format(format!("could not encode public key: {}", e)))?;

    Ok(SigningKey {
        size: private_key.size(),
        public_key_der: Arc::from(public_key_der.as_bytes()),
        signer: Arc::new(pkcs1v15::SigningKey::new(private_key)),
    })
}

/// Read the private key file and parse it.
pub async fn load_private_key(path: impl AsRef<Path>) -> Result<SigningKey> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading GitHub App private key");

    let bytes = tokio::fs::read(path).await.map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_private_key(&bytes)
}

/// Same as [`load_private_key`], aborting with [`Error::Cancelled`] once
/// `cancel` fires.
pub async fn load_private_key_with_cancel(
    path: impl AsRef<Path>,
    cancel: &CancellationToken,
) -> Result<SigningKey> {
    until_cancelled(cancel, load_private_key(path)).await
}
