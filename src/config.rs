//! Client configuration

use crate::{Result, WxPayError};
use bon::bon;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use zeroize::Zeroizing;

/// Production API host.
pub const DEFAULT_ENDPOINT: &str = "https://api.mch.weixin.qq.com";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_MCHID: &str = "WXPAY_MCHID";
const ENV_SERIAL_NO: &str = "WXPAY_SERIAL_NO";
const ENV_PRIVATE_KEY: &str = "WXPAY_PRIVATE_KEY";
const ENV_PRIVATE_KEY_PATH: &str = "WXPAY_PRIVATE_KEY_PATH";
const ENV_API_V3_KEY: &str = "WXPAY_API_V3_KEY";
const ENV_ENDPOINT: &str = "WXPAY_ENDPOINT";

/// Configuration for a [`WxPayClient`](crate::WxPayClient).
///
/// Secrets are held in zeroizing buffers and left out of `Debug` output.
#[derive(Clone)]
pub struct WxPayConfig {
    /// Merchant id (`mchid`)
    pub merchant_id: String,
    /// Serial number of the merchant API certificate
    pub serial_no: String,
    /// API host, without a trailing path
    pub endpoint: String,
    /// `User-Agent` sent with every request
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Log request and response summaries
    pub debug: bool,
    private_key: Zeroizing<String>,
    api_v3_key: Option<Zeroizing<String>>,
}

#[bon]
impl WxPayConfig {
    #[builder]
    pub fn new(
        /// Merchant id, falls back to `WXPAY_MCHID`
        merchant_id: Option<String>,
        /// Certificate serial number, falls back to `WXPAY_SERIAL_NO`
        serial_no: Option<String>,
        /// PEM private key, falls back to `WXPAY_PRIVATE_KEY`
        private_key: Option<String>,
        /// File holding the PEM private key, falls back to `WXPAY_PRIVATE_KEY_PATH`
        private_key_path: Option<PathBuf>,
        /// APIv3 key enabling certificate decryption, falls back to `WXPAY_API_V3_KEY`
        api_v3_key: Option<String>,
        /// API host, falls back to `WXPAY_ENDPOINT`
        endpoint: Option<String>,
        /// `User-Agent` header value
        user_agent: Option<String>,
        /// Per-request timeout in seconds
        timeout_secs: Option<u64>,
        /// Whether to enable debugging
        debug: Option<bool>,
        /// Fill unset fields from `WXPAY_*` environment variables (default `true`)
        from_env: Option<bool>,
    ) -> Result<Self> {
        use std::env;

        let from_env = from_env.unwrap_or(true);
        let env_var = |name: &str| if from_env { env::var(name).ok() } else { None };

        let merchant_id = merchant_id
            .or_else(|| env_var(ENV_MCHID))
            .ok_or_else(|| missing("merchant id", ENV_MCHID))?;

        let serial_no = serial_no
            .or_else(|| env_var(ENV_SERIAL_NO))
            .ok_or_else(|| missing("certificate serial number", ENV_SERIAL_NO))?;

        let private_key = match private_key.or_else(|| env_var(ENV_PRIVATE_KEY)) {
            Some(pem) => pem,
            None => {
                let path = private_key_path
                    .or_else(|| {
                        from_env
                            .then(|| env::var_os(ENV_PRIVATE_KEY_PATH))
                            .flatten()
                            .map(PathBuf::from)
                    })
                    .ok_or_else(|| missing("private key", ENV_PRIVATE_KEY))?;
                std::fs::read_to_string(&path).map_err(|e| {
                    WxPayError::config(format!(
                        "Failed to read private key from {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
        };

        let api_v3_key = api_v3_key.or_else(|| env_var(ENV_API_V3_KEY));

        let endpoint = endpoint
            .or_else(|| env_var(ENV_ENDPOINT))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(WxPayConfig {
            merchant_id,
            serial_no,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            user_agent: user_agent
                .unwrap_or_else(|| format!("wxpay-rs/{}", crate::VERSION)),
            timeout: Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            debug: debug.unwrap_or(false),
            private_key: Zeroizing::new(private_key),
            api_v3_key: api_v3_key.map(Zeroizing::new),
        })
    }

    pub(crate) fn private_key_pem(&self) -> &str {
        &self.private_key
    }

    pub(crate) fn api_v3_key(&self) -> Option<&str> {
        self.api_v3_key.as_deref().map(String::as_str)
    }

    /// Whether an APIv3 key was supplied.
    pub fn has_api_v3_key(&self) -> bool {
        self.api_v3_key.is_some()
    }
}

impl fmt::Debug for WxPayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WxPayConfig")
            .field("merchant_id", &self.merchant_id)
            .field("serial_no", &self.serial_no)
            .field("endpoint", &self.endpoint)
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .field("private_key", &"<redacted>")
            .field("api_v3_key", &self.api_v3_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn missing(what: &str, var: &str) -> WxPayError {
    WxPayError::config(format!(
        "Missing required WeChat Pay {} configuration.\n\n\
         Set it as an environment variable ({}) or pass it to WxPayConfig::builder().",
        what, var
    ))
}
