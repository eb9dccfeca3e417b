use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a Paddle `paddle-signature` header (`ts=<unix>;h1=<hex>`): the
/// signed payload is `"{ts}:{raw_body}"` under HMAC-SHA256.
pub fn verify_paddle(secret: &str, header: &str, body: &[u8]) -> Result<(), WebhookError> {
    let mut ts = None;
    let mut h1 = None;
    for part in header.split(';') {
        match part.split_once('=') {
            Some(("ts", value)) => ts = Some(value),
            Some(("h1", value)) => h1 = Some(value),
            _ => {}
        }
    }
    let (ts, h1) = match (ts, h1) {
        (Some(ts), Some(h1)) => (ts, h1),
        _ => return Err(WebhookError::BadSignature),
    };

    let expected = hex::decode(h1).map_err(|_| WebhookError::BadSignature)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::BadSignature)?;
    mac.update(ts.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::BadSignature)
}

/// Computes a Paddle signature header value for a payload. Used by tests and
/// local tooling; the verify path never calls this.
pub fn sign_paddle(secret: &str, ts: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(ts.as_bytes());
    mac.update(b":");
    mac.update(body);
    format!("ts={};h1={}", ts, hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a Gumroad `X-Gumroad-Signature` header: hex HMAC-SHA256 of the
/// raw body.
pub fn verify_gumroad(secret: &str, header: &str, body: &[u8]) -> Result<(), WebhookError> {
    let expected = hex::decode(header).map_err(|_| WebhookError::BadSignature)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::BadSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::BadSignature)
}

pub fn sign_gumroad(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
