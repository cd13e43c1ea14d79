//! Error types for the wxpay library

use thiserror::Error;

/// Result type alias for wxpay operations
pub type Result<T> = std::result::Result<T, WxPayError>;

/// Main error type for wxpay operations
#[derive(Error, Debug)]
pub enum WxPayError {
    /// Required secret material is missing or the configuration is unusable
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A signing or decryption primitive rejected its input
    #[error("Cryptographic error: {message}")]
    Crypto { message: String },

    /// AEAD authentication failed: the payload was tampered with or does not
    /// match its nonce and associated data
    #[error("Integrity check failed: {message}")]
    Integrity { message: String },

    /// Authorization header could not be parsed
    #[error("Invalid authorization: {message}")]
    InvalidAuthorization { message: String },

    /// The platform answered with a non-success status
    #[error("API error: {status} {body}")]
    Api { status: u16, body: String },

    /// The platform answered with a body of an unexpected shape
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error raised inside the middleware chain
    #[error("Middleware error: {0}")]
    Middleware(reqwest_middleware::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 encoding/decoding error
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decrypted payload is not valid UTF-8
    #[error("UTF8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl WxPayError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a cryptographic error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create an integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Create an invalid authorization error
    pub fn invalid_authorization(message: impl Into<String>) -> Self {
        Self::InvalidAuthorization {
            message: message.into(),
        }
    }

    /// Create an unexpected response error
    pub fn unexpected_response(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
        }
    }

    /// True for configuration errors.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// True for every failure raised by a cryptographic primitive, integrity
    /// failures included.
    pub fn is_cryptographic(&self) -> bool {
        matches!(self, Self::Crypto { .. } | Self::Integrity { .. })
    }

    /// True only when authenticated decryption rejected the payload.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }
}

impl From<reqwest_middleware::Error> for WxPayError {
    /// Errors the signing middleware raised come back as themselves, so a
    /// signing failure stays a cryptographic error.
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => Self::Http(e),
            reqwest_middleware::Error::Middleware(e) => match e.downcast::<WxPayError>() {
                Ok(inner) => inner,
                Err(other) => Self::Middleware(reqwest_middleware::Error::Middleware(other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_is_a_cryptographic_error() {
        let err = WxPayError::integrity("tag mismatch");
        assert!(err.is_cryptographic());
        assert!(err.is_integrity());
        assert!(!err.is_config());
    }

    #[test]
    fn crypto_is_not_integrity() {
        let err = WxPayError::crypto("bad key");
        assert!(err.is_cryptographic());
        assert!(!err.is_integrity());
    }

    #[test]
    fn middleware_errors_keep_their_kind() {
        let wrapped = reqwest_middleware::Error::middleware(WxPayError::crypto("bad key"));
        let err = WxPayError::from(wrapped);
        assert!(matches!(err, WxPayError::Crypto { .. }));
    }

    #[test]
    fn config_is_not_cryptographic() {
        let err = WxPayError::config("missing key");
        assert!(err.is_config());
        assert!(!err.is_cryptographic());
    }
}
