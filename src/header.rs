//! The `Authorization` header value sent with every API v3 request

use crate::{Result, WxPayError};
use base64::Engine;
use http::HeaderValue;
use std::fmt;
use std::str::FromStr;

/// Authentication scheme announced in front of the header fields.
pub const AUTH_SCHEME: &str = "WECHATPAY2-SHA256-RSA2048";

/// Wire order of the header fields. The platform reads them by key, but the
/// reference SDKs always emit this order and so do we.
const FIELDS: [&str; 5] = ["mchid", "nonce_str", "signature", "timestamp", "serial_no"];

/// A signed authorization header, rendered with [`fmt::Display`] and parsed
/// back with [`FromStr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHeader {
    /// Merchant id (`mchid`)
    pub merchant_id: String,
    /// Single-use request nonce (`nonce_str`)
    pub nonce: String,
    /// Base64 encoded RSA signature
    pub signature: String,
    /// Whole seconds since the Unix epoch
    pub timestamp: i64,
    /// Serial number of the merchant API certificate (`serial_no`)
    pub serial_no: String,
}

impl AuthorizationHeader {
    /// Decode the base64 signature into raw bytes.
    pub fn signature_bytes(&self) -> Result<Vec<u8>> {
        Ok(base64::engine::general_purpose::STANDARD.decode(&self.signature)?)
    }

    /// Render as an HTTP header value.
    pub fn to_header_value(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&self.to_string()).map_err(|e| {
            WxPayError::invalid_authorization(format!("not a valid header value: {}", e))
        })
    }
}

impl fmt::Display for AuthorizationHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mchid=\"{}\",nonce_str=\"{}\",signature=\"{}\",timestamp=\"{}\",serial_no=\"{}\"",
            AUTH_SCHEME,
            self.merchant_id,
            self.nonce,
            self.signature,
            self.timestamp,
            self.serial_no
        )
    }
}

impl FromStr for AuthorizationHeader {
    type Err = WxPayError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(AUTH_SCHEME)
            .and_then(|rest| rest.strip_prefix(' '))
            .ok_or_else(|| {
                WxPayError::invalid_authorization(format!("expected scheme {}", AUTH_SCHEME))
            })?;

        let parts: Vec<&str> = rest.split(',').collect();
        if parts.len() != FIELDS.len() {
            return Err(WxPayError::invalid_authorization(format!(
                "expected {} fields, found {}",
                FIELDS.len(),
                parts.len()
            )));
        }

        let mut values = [""; 5];
        for (slot, (part, key)) in values.iter_mut().zip(parts.iter().zip(FIELDS)) {
            *slot = field_value(part, key)?;
        }
        let [merchant_id, nonce, signature, timestamp, serial_no] = values;

        let timestamp = timestamp.parse::<i64>().map_err(|e| {
            WxPayError::invalid_authorization(format!("timestamp is not an integer: {}", e))
        })?;

        Ok(Self {
            merchant_id: merchant_id.to_string(),
            nonce: nonce.to_string(),
            signature: signature.to_string(),
            timestamp,
            serial_no: serial_no.to_string(),
        })
    }
}

fn field_value<'a>(part: &'a str, key: &str) -> Result<&'a str> {
    part.strip_prefix(key)
        .and_then(|rest| rest.strip_prefix("=\""))
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|value| !value.contains('"'))
        .ok_or_else(|| {
            WxPayError::invalid_authorization(format!("expected {}=\"...\", found {}", key, part))
        })
}
