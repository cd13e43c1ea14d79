//! `reqwest-middleware` layer that signs every outgoing request

use crate::signer::Signer;
use crate::{Result, WxPayError};
use http::header::AUTHORIZATION;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Attaches a freshly signed `Authorization` header to each request.
///
/// The signature covers the method as sent, the path and query exactly as
/// they appear in the request URL, and the buffered body bytes.
#[derive(Debug, Clone)]
pub struct WxPayAuth {
    signer: Arc<Signer>,
    debug: bool,
}

impl WxPayAuth {
    pub fn new(signer: Arc<Signer>) -> Self {
        Self {
            signer,
            debug: false,
        }
    }

    /// Log request and response summaries.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Path plus `?query` as it enters the signature.
pub fn signing_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Method, path with query and body bytes of an outgoing request.
///
/// Streaming bodies have no bytes to sign and are rejected.
fn signing_input(req: &Request) -> Result<(String, String, Vec<u8>)> {
    let body = match req.body() {
        None => Vec::new(),
        Some(body) => body
            .as_bytes()
            .ok_or_else(|| WxPayError::crypto("streaming request bodies cannot be signed"))?
            .to_vec(),
    };
    Ok((req.method().as_str().to_string(), signing_path(req.url()), body))
}

#[async_trait::async_trait]
impl Middleware for WxPayAuth {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let (method, path, body) =
            signing_input(&req).map_err(reqwest_middleware::Error::middleware)?;

        let header = self
            .signer
            .compute_header(&method, &path, &body)
            .await
            .map_err(reqwest_middleware::Error::middleware)?;

        req.headers_mut().insert(
            AUTHORIZATION,
            header
                .to_header_value()
                .map_err(reqwest_middleware::Error::middleware)?,
        );

        if self.debug {
            debug!(
                %method,
                url = %req.url(),
                nonce = %header.nonce,
                timestamp = header.timestamp,
                "sending signed request"
            );
        }

        let response = next.run(req, extensions).await;

        if self.debug {
            if let Ok(ref resp) = response {
                debug!(
                    status = resp.status().as_u16(),
                    request_id = resp
                        .headers()
                        .get("Request-ID")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or(""),
                    "received response"
                );
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn request(method: Method, url: &str) -> Request {
        Request::new(method, Url::parse(url).unwrap())
    }

    #[test]
    fn method_is_signed_as_sent() {
        let req = request(
            Method::from_bytes(b"patch").unwrap(),
            "https://api.mch.weixin.qq.com/v3/merchant/media",
        );
        let (method, path, body) = signing_input(&req).unwrap();
        assert_eq!(method, "patch");
        assert_eq!(path, "/v3/merchant/media");
        assert!(body.is_empty());
    }

    #[test]
    fn buffered_body_is_signed() {
        let mut req = request(
            Method::POST,
            "https://api.mch.weixin.qq.com/v3/refund/domestic/refunds",
        );
        *req.body_mut() = Some(reqwest::Body::from(r#"{"out_refund_no":"1"}"#));
        let (method, _, body) = signing_input(&req).unwrap();
        assert_eq!(method, "POST");
        assert_eq!(body, br#"{"out_refund_no":"1"}"#);
    }

    #[test]
    fn streaming_body_is_rejected() {
        let chunks: Vec<std::result::Result<&'static [u8], std::io::Error>> = vec![Ok(&b"{}"[..])];
        let mut req = request(
            Method::POST,
            "https://api.mch.weixin.qq.com/v3/refund/domestic/refunds",
        );
        *req.body_mut() = Some(reqwest::Body::wrap_stream(futures::stream::iter(chunks)));
        let err = signing_input(&req).unwrap_err();
        assert!(err.is_cryptographic());
        assert!(err.to_string().contains("streaming"));
    }

    #[test]
    fn signing_path_keeps_query_string() {
        let url = Url::parse(
            "https://api.mch.weixin.qq.com/v3/pay/transactions/id/4200000985?mchid=1900009191",
        )
        .unwrap();
        assert_eq!(
            signing_path(&url),
            "/v3/pay/transactions/id/4200000985?mchid=1900009191"
        );
    }

    #[test]
    fn signing_path_without_query() {
        let url = Url::parse("https://api.mch.weixin.qq.com/v3/certificates").unwrap();
        assert_eq!(signing_path(&url), "/v3/certificates");
    }

    #[test]
    fn signing_path_keeps_empty_query_marker() {
        let url = Url::parse("https://api.mch.weixin.qq.com/v3/certificates?").unwrap();
        assert_eq!(signing_path(&url), "/v3/certificates?");
    }
}
