use hmac::{Hmac, Mac};
use log::debug;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Calculates the HMAC-SHA256 of `body` under `secret`, hex-encoded. This is the value the marketplace puts in the
/// `X-Hub-Signature-256` header (prefixed with `sha256=`).
pub fn calculate_hmac(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a webhook signature header against the raw request body. The comparison runs in constant time via
/// `Mac::verify_slice`. A missing or malformed header fails verification; whether to require one at all is the
/// caller's decision (a secret must be configured for this to be called).
pub fn verify_webhook_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(signature) = header else {
        debug!("🔐️ No signature header on request");
        return false;
    };
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(signature) = hex::decode(signature) else {
        debug!("🔐️ Signature header is not valid hex");
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}
