//! Shared fixtures for the integration tests

#![allow(dead_code)]

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use rsa::pkcs1v15::VerifyingKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha2::Sha256;
use wxpay::{Clock, WxPayConfig};

pub const MCHID: &str = "1900009191";
pub const SERIAL_NO: &str = "1DDE55AD98ED71D6EDD4A4A16996DE7B47773A8C";
pub const API_V3_KEY: &str = "0123456789abcdef0123456789abcdef";
pub const TEST_KEY: &str = include_str!("../fixtures/apiclient_key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/apiclient_pub.pem");

/// Regex matching a header produced for the test merchant.
pub const HEADER_PATTERN: &str = concat!(
    r#"^WECHATPAY2-SHA256-RSA2048 mchid="1900009191","#,
    r#"nonce_str="[0-9a-f]{32}","#,
    r#"signature="[A-Za-z0-9+/]+={0,2}","#,
    r#"timestamp="\d+","#,
    r#"serial_no="1DDE55AD98ED71D6EDD4A4A16996DE7B47773A8C"$"#,
);

pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn config(endpoint: &str, api_v3_key: Option<&str>) -> WxPayConfig {
    WxPayConfig::builder()
        .merchant_id(MCHID.to_string())
        .serial_no(SERIAL_NO.to_string())
        .private_key(TEST_KEY.to_string())
        .maybe_api_v3_key(api_v3_key.map(str::to_string))
        .endpoint(endpoint.to_string())
        .debug(true)
        .from_env(false)
        .build()
        .unwrap()
}

pub fn verifying_key() -> VerifyingKey<Sha256> {
    VerifyingKey::<Sha256>::new(RsaPublicKey::from_public_key_pem(TEST_PUBLIC_KEY).unwrap())
}

/// Encrypt the way the platform does: AES-256-GCM, tag appended, base64.
pub fn seal_certificate(plaintext: &str, nonce: &str, associated_data: &str) -> String {
    let cipher = Aes256Gcm::new_from_slice(API_V3_KEY.as_bytes()).unwrap();
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: plaintext.as_bytes(),
                aad: associated_data.as_bytes(),
            },
        )
        .unwrap();
    base64::engine::general_purpose::STANDARD.encode(sealed)
}
