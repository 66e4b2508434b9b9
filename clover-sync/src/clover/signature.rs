//! Webhook signature verification
//!
//! Clover signs each delivery with HMAC-SHA256 over the raw request body.
//! Depending on the app platform version the digest header arrives hex- or
//! base64-encoded, so both encodings are accepted. Comparison goes through
//! `Mac::verify_slice`, which is constant-time.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// Header value is not a decodable digest (neither hex nor base64)
    #[error("signature header is not a valid digest")]
    Malformed,
    /// Digest decoded but does not match the payload
    #[error("signature does not match payload")]
    Mismatch,
}

/// Verify the webhook digest against the raw payload bytes.
///
/// The digest must be computed over the exact bytes received; any
/// re-serialization of the JSON would break verification.
pub fn verify_webhook_signature(payload: &[u8], digest: &str, secret: &str) -> Result<(), SignatureError> {
    let digest = digest.trim();
    if digest.is_empty() {
        return Err(SignatureError::Malformed);
    }

    let mut candidates: Vec<Vec<u8>> = Vec::with_capacity(2);
    if let Ok(bytes) = hex::decode(digest) {
        candidates.push(bytes);
    }
    if let Ok(bytes) = BASE64.decode(digest) {
        candidates.push(bytes);
    }
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }

    for candidate in candidates {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
        mac.update(payload);
        if mac.verify_slice(&candidate).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}
