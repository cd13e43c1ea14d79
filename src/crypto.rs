//! Platform certificate decryption
//!
//! The platform returns its certificates encrypted with AEAD_AES_256_GCM under
//! the merchant's APIv3 key. The ciphertext carries the 16 byte authentication
//! tag at its end; the nonce and associated data travel next to it.
//!
//! The APIv3 key is turned into a cipher once, on first use, and shared by
//! every later decryption. See [`ApiV3Key`].

use crate::{Result, WxPayError};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;
use zeroize::Zeroizing;

/// Length of the APIv3 key in bytes.
pub const API_V3_KEY_LEN: usize = 32;

/// Length of the GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// An AES-256-GCM key ready for decryption. The raw key bytes are not
/// reachable from outside.
pub struct SymmetricKey {
    cipher: Aes256Gcm,
}

impl SymmetricKey {
    /// Build the cipher from the 32 byte APIv3 key.
    pub fn derive(secret: &[u8]) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(secret).map_err(|_| {
            WxPayError::crypto(format!(
                "APIv3 key must be {} bytes, got {}",
                API_V3_KEY_LEN,
                secret.len()
            ))
        })?;
        Ok(Self { cipher })
    }

    /// Authenticate and decrypt an envelope.
    pub fn decrypt(&self, envelope: &EncryptedCertificateEnvelope) -> Result<Vec<u8>> {
        if envelope.nonce.len() != NONCE_LEN {
            return Err(WxPayError::crypto(format!(
                "nonce must be {} bytes, got {}",
                NONCE_LEN,
                envelope.nonce.len()
            )));
        }
        if envelope.ciphertext.len() < TAG_LEN {
            return Err(WxPayError::crypto(format!(
                "ciphertext is {} bytes, shorter than the {} byte tag",
                envelope.ciphertext.len(),
                TAG_LEN
            )));
        }

        self.cipher
            .decrypt(
                Nonce::from_slice(&envelope.nonce),
                Payload {
                    msg: &envelope.ciphertext,
                    aad: &envelope.associated_data,
                },
            )
            .map_err(|_| {
                WxPayError::integrity(
                    "authentication tag mismatch; ciphertext, nonce or associated data altered",
                )
            })
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Turn an APIv3 key secret into a [`SymmetricKey`].
pub fn derive_symmetric_key(secret: &[u8]) -> Result<SymmetricKey> {
    SymmetricKey::derive(secret)
}

/// Decoded encrypted certificate: raw ciphertext (tag included), nonce and
/// associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedCertificateEnvelope {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub associated_data: Vec<u8>,
}

type Deriver = Arc<dyn Fn(&[u8]) -> Result<SymmetricKey> + Send + Sync>;

/// The merchant's APIv3 key with its derived cipher memoized.
///
/// The first caller of [`ApiV3Key::get`] runs the derivation. Callers that
/// arrive while it is in flight wait for it and receive the same
/// `Arc<SymmetricKey>`; nobody derives twice.
pub struct ApiV3Key {
    secret: Zeroizing<Vec<u8>>,
    derived: OnceCell<Arc<SymmetricKey>>,
    deriver: Deriver,
}

impl ApiV3Key {
    /// Wrap a secret. Its length is checked here so that a wrong key fails
    /// when the client is built rather than on the first certificate fetch.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = Zeroizing::new(secret.into());
        if secret.len() != API_V3_KEY_LEN {
            return Err(WxPayError::crypto(format!(
                "APIv3 key must be {} bytes, got {}",
                API_V3_KEY_LEN,
                secret.len()
            )));
        }
        Ok(Self::with_deriver(secret, Arc::new(derive_symmetric_key)))
    }

    fn with_deriver(secret: Zeroizing<Vec<u8>>, deriver: Deriver) -> Self {
        Self {
            secret,
            derived: OnceCell::new(),
            deriver,
        }
    }

    /// The derived key, deriving it on first use.
    pub async fn get(&self) -> Result<Arc<SymmetricKey>> {
        self.derived
            .get_or_try_init(|| async {
                let key = (self.deriver)(&self.secret)?;
                debug!("derived APIv3 symmetric key");
                Ok::<_, WxPayError>(Arc::new(key))
            })
            .await
            .map(Arc::clone)
    }

    /// Whether the derivation has already completed.
    pub fn is_derived(&self) -> bool {
        self.derived.initialized()
    }
}

impl fmt::Debug for ApiV3Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiV3Key")
            .field("secret", &"<redacted>")
            .field("derived", &self.is_derived())
            .finish()
    }
}

/// Capability to decrypt platform certificates. Obtained from
/// [`WxPayClient::certificate_decryptor`](crate::WxPayClient::certificate_decryptor).
#[derive(Debug, Clone)]
pub struct CertificateDecryptor {
    key: Arc<SymmetricKey>,
}

impl CertificateDecryptor {
    pub fn new(key: Arc<SymmetricKey>) -> Self {
        Self { key }
    }

    pub fn decrypt(&self, envelope: &EncryptedCertificateEnvelope) -> Result<Vec<u8>> {
        self.key.decrypt(envelope)
    }

    /// Decrypt and interpret the plaintext as UTF-8 certificate text.
    pub fn decrypt_to_string(&self, envelope: &EncryptedCertificateEnvelope) -> Result<String> {
        Ok(String::from_utf8(self.decrypt(envelope)?)?)
    }
}
