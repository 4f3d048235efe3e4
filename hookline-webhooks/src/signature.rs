//! Webhook signature generation and verification

use crate::{Result, WebhookError};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer for webhook payloads.
///
/// Signatures have the form `t={unix_timestamp},v1={hex_hmac}` where the
/// signed content is `{timestamp}.{payload}`.
#[derive(Debug, Clone)]
pub struct WebhookSignature {
    secret: String,
}

impl WebhookSignature {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign the payload with the current timestamp
    pub fn sign(&self, payload: &[u8]) -> String {
        self.sign_with_timestamp(payload, &chrono::Utc::now().timestamp().to_string())
    }

    pub fn sign_with_timestamp(&self, payload: &[u8], timestamp: &str) -> String {
        let signature = self.compute(timestamp, payload);
        format!("t={},v1={}", timestamp, signature)
    }

    /// Verify a signature, rejecting timestamps older than `tolerance_secs`
    pub fn verify(&self, payload: &[u8], signature: &str, tolerance_secs: u64) -> Result<bool> {
        let parts = SignatureParts::parse(signature)?;

        let timestamp: i64 = parts
            .timestamp
            .parse()
            .map_err(|_| WebhookError::TimestampInvalid("Invalid timestamp format".to_string()))?;

        let age = (chrono::Utc::now().timestamp() - timestamp).unsigned_abs();
        if age > tolerance_secs {
            return Err(WebhookError::TimestampInvalid(format!(
                "Timestamp too old: {} seconds (tolerance: {} seconds)",
                age, tolerance_secs
            )));
        }

        let expected = self.compute(parts.timestamp, payload);
        Ok(constant_time_compare(parts.signature, &expected))
    }

    fn compute(&self, timestamp: &str, payload: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC can take any size key");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}

struct SignatureParts<'a> {
    timestamp: &'a str,
    signature: &'a str,
}

impl<'a> SignatureParts<'a> {
    fn parse(signature: &'a str) -> Result<Self> {
        let mut timestamp = None;
        let mut sig = None;

        for part in signature.split(',') {
            match part.split_once('=') {
                Some(("t", t)) => timestamp = Some(t),
                Some(("v1", v)) => sig = Some(v),
                _ => {}
            }
        }

        match (timestamp, sig) {
            (Some(timestamp), Some(signature)) => Ok(Self {
                timestamp,
                signature,
            }),
            _ => Err(WebhookError::SignatureInvalid(
                "Missing timestamp or signature".to_string(),
            )),
        }
    }
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
