//! Download and decrypt the platform certificates.
//!
//! Reads `WXPAY_MCHID`, `WXPAY_SERIAL_NO`, `WXPAY_PRIVATE_KEY` (or
//! `WXPAY_PRIVATE_KEY_PATH`) and `WXPAY_API_V3_KEY` from the environment.
//!
//! ```bash
//! WXPAY_MCHID=1900009191 \
//! WXPAY_SERIAL_NO=1DDE55AD98ED71D6EDD4A4A16996DE7B47773A8C \
//! WXPAY_PRIVATE_KEY_PATH=apiclient_key.pem \
//! WXPAY_API_V3_KEY=... \
//! cargo run --example certificates
//! ```

use wxpay::{WxPayClient, WxPayConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = WxPayConfig::builder().debug(true).build()?;
    let client = WxPayClient::new(config)?;

    for cert in client.get_certificates().await? {
        println!(
            "{} valid {} .. {}",
            cert.serial_no, cert.effective_time, cert.expire_time
        );
        println!("{}", cert.certificate);
    }

    Ok(())
}
