//! HTTP client for the WeChat Pay API v3

use crate::config::WxPayConfig;
use crate::crypto::{ApiV3Key, CertificateDecryptor};
use crate::middleware::WxPayAuth;
use crate::signer::{Credentials, Signer};
use crate::types::{CertificateList, DecryptedCertificate, PrepayResponse};
use crate::{Result, WxPayError};
use http::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use http::Method;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

/// Characters left alone when a caller-supplied id becomes a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// WeChat Pay API v3 client.
///
/// Holds the merchant credentials and the optional APIv3 key. Every request
/// goes through [`WxPayAuth`], which signs it just before it is sent.
#[derive(Debug, Clone)]
pub struct WxPayClient {
    merchant_id: String,
    endpoint: String,
    user_agent: String,
    debug: bool,
    signer: Arc<Signer>,
    api_v3_key: Option<Arc<ApiV3Key>>,
    http: ClientWithMiddleware,
}

impl WxPayClient {
    /// Build a client. Fails on an unparsable private key, an APIv3 key of
    /// the wrong length, or an invalid endpoint.
    pub fn new(config: WxPayConfig) -> Result<Self> {
        let credentials = Credentials::from_pem(
            config.merchant_id.clone(),
            config.serial_no.clone(),
            config.private_key_pem(),
        )?;
        Self::with_signer(config, Signer::new(credentials))
    }

    /// Build a client around an existing signer, e.g. one with a custom clock.
    pub fn with_signer(config: WxPayConfig, signer: Signer) -> Result<Self> {
        url::Url::parse(&config.endpoint).map_err(|e| {
            WxPayError::config(format!("Invalid endpoint {}: {}", config.endpoint, e))
        })?;

        let api_v3_key = config
            .api_v3_key()
            .map(|key| ApiV3Key::new(key.as_bytes().to_vec()).map(Arc::new))
            .transpose()?;

        let signer = Arc::new(signer);
        let inner = reqwest::Client::builder().timeout(config.timeout).build()?;
        let http = ClientBuilder::new(inner)
            .with(WxPayAuth::new(Arc::clone(&signer)).with_debug(config.debug))
            .build();

        Ok(Self {
            merchant_id: config.merchant_id,
            endpoint: config.endpoint,
            user_agent: config.user_agent,
            debug: config.debug,
            signer,
            api_v3_key,
            http,
        })
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `Authorization` header value for a request the caller sends itself.
    pub async fn authorization_header(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
    ) -> Result<String> {
        Ok(self
            .signer
            .compute_header(method, path, body)
            .await?
            .to_string())
    }

    /// Capability to decrypt platform certificates.
    ///
    /// Fails with a configuration error when no APIv3 key was configured.
    pub async fn certificate_decryptor(&self) -> Result<CertificateDecryptor> {
        let key = self.api_v3_key.as_ref().ok_or_else(|| {
            WxPayError::config(
                "APIv3 key is not set; certificate decryption was never enabled for this client",
            )
        })?;
        Ok(CertificateDecryptor::new(key.get().await?))
    }

    /// Send a signed request. JSON responses come back parsed; any other body
    /// comes back as a JSON string.
    pub async fn request<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        self.request_with_headers(method, path, body, &HeaderMap::new()).await
    }

    /// Like [`request`](Self::request), with extra headers such as
    /// `Wechatpay-Serial`.
    ///
    /// Caller headers replace the default `User-Agent`. `Accept`,
    /// `Accept-Language`, `Content-Type` and `Authorization` are always set by
    /// the client.
    pub async fn request_with_headers<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        headers: &HeaderMap,
    ) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let mut request_headers = HeaderMap::new();
        request_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| WxPayError::config(format!("Invalid user agent: {}", e)))?,
        );
        for name in headers.keys() {
            request_headers.remove(name);
        }
        for (name, value) in headers {
            request_headers.append(name.clone(), value.clone());
        }
        request_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        request_headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN"));
        request_headers.remove(CONTENT_TYPE);

        let payload = body.map(serde_json::to_vec).transpose()?;
        if payload.is_some() {
            request_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let url = format!("{}{}", self.endpoint, path);
        let mut builder = self
            .http
            .request(method.clone(), url.as_str())
            .headers(request_headers);
        if let Some(payload) = payload {
            builder = builder.body(payload);
        }

        let response = builder.send().await?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        let text = response.text().await?;

        if self.debug {
            debug!(%method, path, status = status.as_u16(), "wxpay response");
        }

        if status.as_u16() >= 300 {
            return Err(WxPayError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Ok(Value::String(text))
        }
    }

    /// JSAPI prepay order.
    pub async fn prepay<P>(&self, params: &P) -> Result<PrepayResponse>
    where
        P: Serialize + ?Sized,
    {
        let res = self
            .request(Method::POST, "/v3/pay/transactions/jsapi", Some(params))
            .await?;
        decode(res)
    }

    /// Query a transaction by the platform's transaction id.
    pub async fn query_by_id(&self, transaction_id: &str) -> Result<Value> {
        let path = format!(
            "/v3/pay/transactions/id/{}?{}",
            utf8_percent_encode(transaction_id, PATH_SEGMENT),
            self.mchid_query()
        );
        let res = self.request::<()>(Method::GET, &path, None).await?;
        decode(res)
    }

    /// Query a transaction by the merchant's own order number.
    pub async fn query_by_out_trade_no(&self, out_trade_no: &str) -> Result<Value> {
        let path = format!(
            "/v3/pay/transactions/out-trade-no/{}?{}",
            utf8_percent_encode(out_trade_no, PATH_SEGMENT),
            self.mchid_query()
        );
        let res = self.request::<()>(Method::GET, &path, None).await?;
        decode(res)
    }

    /// Request a refund.
    pub async fn refunds<P>(&self, params: &P) -> Result<Value>
    where
        P: Serialize + ?Sized,
    {
        let res = self
            .request(Method::POST, "/v3/refund/domestic/refunds", Some(params))
            .await?;
        decode(res)
    }

    /// Download and decrypt the platform certificates.
    ///
    /// The APIv3 key is checked before anything goes over the network.
    pub async fn get_certificates(&self) -> Result<Vec<DecryptedCertificate>> {
        let decryptor = self.certificate_decryptor().await?;

        let res = self
            .request::<()>(Method::GET, "/v3/certificates", None)
            .await?;
        let list: CertificateList = decode(res).map_err(|e| {
            WxPayError::unexpected_response(format!("certificate list: {}", e))
        })?;

        list.data
            .into_iter()
            .map(|entry| {
                let envelope = entry.encrypt_certificate.to_envelope()?;
                Ok(DecryptedCertificate {
                    certificate: decryptor.decrypt_to_string(&envelope)?,
                    serial_no: entry.serial_no,
                    effective_time: entry.effective_time,
                    expire_time: entry.expire_time,
                })
            })
            .collect()
    }

    fn mchid_query(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("mchid", &self.merchant_id)
            .finish()
    }
}

/// Deserialize a response value. Text bodies are parsed as JSON first.
fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    match value {
        Value::String(text) => Ok(serde_json::from_str(&text)?),
        other => Ok(serde_json::from_value(other)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEST_KEY: &str = include_str!("../tests/fixtures/apiclient_key.pem");

    fn config(api_v3_key: Option<&str>) -> WxPayConfig {
        WxPayConfig::builder()
            .merchant_id("1900009191".to_string())
            .serial_no("SERIAL".to_string())
            .private_key(TEST_KEY.to_string())
            .maybe_api_v3_key(api_v3_key.map(str::to_string))
            .endpoint("https://api.mch.weixin.qq.com".to_string())
            .from_env(false)
            .build()
            .unwrap()
    }

    #[test]
    fn decode_accepts_parsed_and_text_bodies() {
        let parsed: PrepayResponse = decode(json!({"prepay_id": "wx2016"})).unwrap();
        let text: PrepayResponse =
            decode(Value::String(r#"{"prepay_id":"wx2016"}"#.to_string())).unwrap();
        assert_eq!(parsed, text);
    }

    #[test]
    fn mchid_query_is_form_encoded() {
        let client = WxPayClient::new(config(None)).unwrap();
        assert_eq!(client.mchid_query(), "mchid=1900009191");
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        assert_eq!(
            utf8_percent_encode("order/1 2", PATH_SEGMENT).to_string(),
            "order%2F1%202"
        );
        assert_eq!(
            utf8_percent_encode("1217752501201407033233368018", PATH_SEGMENT).to_string(),
            "1217752501201407033233368018"
        );
    }

    #[test]
    fn wrong_length_api_v3_key_fails_at_construction() {
        let err = WxPayClient::new(config(Some("short"))).unwrap_err();
        assert!(err.is_cryptographic());
    }

    #[test]
    fn invalid_endpoint_is_a_config_error() {
        let mut config = config(None);
        config.endpoint = "not a url".to_string();
        assert!(WxPayClient::new(config).unwrap_err().is_config());
    }

    #[tokio::test]
    async fn decryptor_requires_api_v3_key() {
        let client = WxPayClient::new(config(None)).unwrap();
        let err = client.certificate_decryptor().await.unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("never enabled"));
    }

    #[tokio::test]
    async fn decryptor_shares_one_derived_key() {
        let client = WxPayClient::new(config(Some("0123456789abcdef0123456789abcdef"))).unwrap();
        let cloned = client.clone();
        client.certificate_decryptor().await.unwrap();
        cloned.certificate_decryptor().await.unwrap();
        assert!(client.api_v3_key.as_ref().unwrap().is_derived());
        assert!(Arc::ptr_eq(
            client.api_v3_key.as_ref().unwrap(),
            cloned.api_v3_key.as_ref().unwrap()
        ));
    }
}
