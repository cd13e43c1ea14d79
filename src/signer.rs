//! Request signing for the WeChat Pay API v3
//!
//! Every request carries an `Authorization` header whose signature covers a
//! canonical text of five newline-terminated lines:
//!
//! ```text
//! HTTP method\n
//! URL path with query string\n
//! timestamp\n
//! nonce\n
//! request body\n
//! ```
//!
//! The text is signed with RSASSA-PKCS1-v1_5 over SHA-256 using the merchant's
//! private key. The platform rebuilds the same text and verifies the signature
//! with the public key registered under `serial_no`.

use crate::header::AuthorizationHeader;
use crate::{Result, WxPayError};
use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};
use uuid::Uuid;

/// Modulus size the platform expects for merchant keys, in bits.
pub const RSA_KEY_BITS: usize = 2048;

/// Source of wall-clock time, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Whole seconds from a millisecond reading, truncated toward zero.
pub fn timestamp_from_millis(millis: i64) -> i64 {
    millis / 1000
}

/// A fresh request nonce: 32 lowercase hex digits of a random UUID.
pub fn generate_nonce() -> String {
    format!("{:x}", Uuid::new_v4().simple())
}

/// Everything that enters a request signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    method: String,
    path: String,
    body: Vec<u8>,
    timestamp: i64,
    nonce: String,
}

impl SigningContext {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        body: impl Into<Vec<u8>>,
        timestamp: i64,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            body: body.into(),
            timestamp,
            nonce: nonce.into(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// The exact bytes that get signed.
    pub fn canonical_text(&self) -> Vec<u8> {
        let timestamp = self.timestamp.to_string();
        let mut text = Vec::with_capacity(
            self.method.len()
                + self.path.len()
                + timestamp.len()
                + self.nonce.len()
                + self.body.len()
                + 5,
        );
        for line in [
            self.method.as_bytes(),
            self.path.as_bytes(),
            timestamp.as_bytes(),
            self.nonce.as_bytes(),
            self.body.as_slice(),
        ] {
            text.extend_from_slice(line);
            text.push(b'\n');
        }
        text
    }
}

/// Merchant identity and signing key.
///
/// The private key never leaves this type; `Debug` output is redacted.
#[derive(Clone)]
pub struct Credentials {
    merchant_id: String,
    serial_no: String,
    signing_key: Arc<SigningKey<Sha256>>,
}

impl Credentials {
    /// Load credentials from a PEM private key (PKCS#8 `PRIVATE KEY` or
    /// PKCS#1 `RSA PRIVATE KEY`).
    pub fn from_pem(
        merchant_id: impl Into<String>,
        serial_no: impl Into<String>,
        private_key_pem: &str,
    ) -> Result<Self> {
        let private_key = parse_private_key(private_key_pem)?;
        Ok(Self::from_private_key(merchant_id, serial_no, private_key))
    }

    pub fn from_private_key(
        merchant_id: impl Into<String>,
        serial_no: impl Into<String>,
        private_key: RsaPrivateKey,
    ) -> Self {
        if private_key.size() * 8 != RSA_KEY_BITS {
            warn!(
                bits = private_key.size() * 8,
                "merchant key is not {} bits, the platform will reject its signatures",
                RSA_KEY_BITS
            );
        }
        Self {
            merchant_id: merchant_id.into(),
            serial_no: serial_no.into(),
            signing_key: Arc::new(SigningKey::<Sha256>::new(private_key)),
        }
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    pub fn serial_no(&self) -> &str {
        &self.serial_no
    }

    /// Sign a context and render the resulting header.
    fn authorize(&self, context: &SigningContext) -> Result<AuthorizationHeader> {
        let signature = self
            .signing_key
            .try_sign(&context.canonical_text())
            .map_err(|e| WxPayError::crypto(format!("RSA signing failed: {}", e)))?;

        Ok(AuthorizationHeader {
            merchant_id: self.merchant_id.clone(),
            nonce: context.nonce.clone(),
            signature: base64::engine::general_purpose::STANDARD.encode(signature.to_vec()),
            timestamp: context.timestamp,
            serial_no: self.serial_no.clone(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("merchant_id", &self.merchant_id)
            .field("serial_no", &self.serial_no)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey> {
    let pem = pem.trim();
    if pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| WxPayError::crypto(format!("Failed to parse PKCS#1 private key: {}", e)))
    } else {
        RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| WxPayError::crypto(format!("Failed to parse PKCS#8 private key: {}", e)))
    }
}

/// Produces `Authorization` headers for outgoing requests.
#[derive(Clone)]
pub struct Signer {
    credentials: Credentials,
    clock: Arc<dyn Clock>,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock used for timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn merchant_id(&self) -> &str {
        self.credentials.merchant_id()
    }

    /// Build a context with a fresh nonce and the current timestamp.
    pub fn context(&self, method: &str, path: &str, body: &[u8]) -> SigningContext {
        SigningContext::new(
            method,
            path,
            body,
            timestamp_from_millis(self.clock.now_millis()),
            generate_nonce(),
        )
    }

    /// Sign `method`, `path` and `body` with a fresh nonce and timestamp.
    pub async fn compute_header(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
    ) -> Result<AuthorizationHeader> {
        self.sign_context(self.context(method, path, body)).await
    }

    /// Sign an explicit context on the blocking pool.
    ///
    /// Must be polled inside a Tokio runtime; otherwise this returns a
    /// configuration error instead of signing.
    pub async fn sign_context(&self, context: SigningContext) -> Result<AuthorizationHeader> {
        trace!(
            method = context.method(),
            path = context.path(),
            timestamp = context.timestamp(),
            "signing request"
        );
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| WxPayError::config(format!("signing requires a Tokio runtime: {}", e)))?;
        let credentials = self.credentials.clone();
        runtime
            .spawn_blocking(move || credentials.authorize(&context))
            .await
            .map_err(|e| WxPayError::crypto(format!("signing task failed: {}", e)))?
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
