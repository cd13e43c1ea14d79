//! Wire types exchanged with the WeChat Pay API v3

use crate::crypto::EncryptedCertificateEnvelope;
use crate::{Result, WxPayError};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// The only algorithm the platform uses for encrypted resources.
pub const AEAD_AES_256_GCM: &str = "AEAD_AES_256_GCM";

/// Response of a JSAPI prepay order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepayResponse {
    /// Prepay session id handed to the JSAPI bridge
    pub prepay_id: String,
}

/// Encrypted certificate as sent by `GET /v3/certificates`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptCertificate {
    /// Encryption algorithm, always `AEAD_AES_256_GCM`
    pub algorithm: String,
    /// GCM nonce, used as raw UTF-8 bytes
    pub nonce: String,
    /// Associated data, used as raw UTF-8 bytes
    #[serde(default)]
    pub associated_data: String,
    /// Standard base64 of ciphertext followed by the tag
    pub ciphertext: String,
}

impl EncryptCertificate {
    /// Decode into an envelope ready for decryption.
    pub fn to_envelope(&self) -> Result<EncryptedCertificateEnvelope> {
        if self.algorithm != AEAD_AES_256_GCM {
            return Err(WxPayError::crypto(format!(
                "unsupported certificate algorithm: {}",
                self.algorithm
            )));
        }
        Ok(EncryptedCertificateEnvelope {
            ciphertext: base64::engine::general_purpose::STANDARD.decode(&self.ciphertext)?,
            nonce: self.nonce.as_bytes().to_vec(),
            associated_data: self.associated_data.as_bytes().to_vec(),
        })
    }
}

/// One entry of the platform certificate list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Platform certificate serial number
    pub serial_no: String,
    /// Start of validity, RFC 3339
    pub effective_time: String,
    /// End of validity, RFC 3339
    pub expire_time: String,
    pub encrypt_certificate: EncryptCertificate,
}

/// Body of `GET /v3/certificates`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateList {
    pub data: Vec<Certificate>,
}

/// A platform certificate with its PEM text recovered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedCertificate {
    pub serial_no: String,
    pub effective_time: String,
    pub expire_time: String,
    /// Decrypted certificate PEM
    pub certificate: String,
}
