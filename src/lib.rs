//! # wxpay - WeChat Pay API v3 client core
//!
//! Request authentication and platform certificate decryption for the
//! WeChat Pay API v3.
//!
//! - [`Signer`] builds the canonical request text, signs it with the
//!   merchant's RSA key and renders the `Authorization` header.
//! - [`CertificateDecryptor`] recovers platform certificates encrypted with the
//!   merchant's APIv3 key.
//! - [`WxPayClient`] wires both into a `reqwest` client and exposes the
//!   prepay, query, refund and certificate endpoints.
//!
//! ```no_run
//! use wxpay::{WxPayClient, WxPayConfig};
//!
//! # async fn run() -> wxpay::Result<()> {
//! let config = WxPayConfig::builder()
//!     .merchant_id("1900009191".to_string())
//!     .serial_no("1DDE55AD98ED71D6EDD4A4A16996DE7B47773A8C".to_string())
//!     .private_key(std::fs::read_to_string("apiclient_key.pem").unwrap())
//!     .api_v3_key("0123456789abcdef0123456789abcdef".to_string())
//!     .build()?;
//!
//! let client = WxPayClient::new(config)?;
//! for cert in client.get_certificates().await? {
//!     println!("{} valid until {}", cert.serial_no, cert.expire_time);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod header;
pub mod middleware;
pub mod signer;
pub mod types;

// Re-exports for convenience
pub use client::WxPayClient;
pub use config::WxPayConfig;
pub use crypto::{
    derive_symmetric_key, ApiV3Key, CertificateDecryptor, EncryptedCertificateEnvelope,
    SymmetricKey,
};
pub use error::{Result, WxPayError};
pub use header::{AuthorizationHeader, AUTH_SCHEME};
pub use middleware::WxPayAuth;
pub use signer::{Clock, Credentials, Signer, SigningContext, SystemClock};
pub use types::*;

/// Current version of the wxpay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
