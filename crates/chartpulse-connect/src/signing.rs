//! Request signing and webhook verification for the fingerprint provider.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Build the `signature` field of an identification request.
///
/// # Security
/// HMAC-SHA1 is used here because the identification API *requires* it for
/// request signing. This is NOT a security choice — it is a protocol
/// requirement. The string to sign is the newline-joined request fields:
/// `method\nuri\naccess_key\ndata_type\nsignature_version\ntimestamp`.
pub fn identify_signature(
    method: &str,
    uri: &str,
    access_key: &str,
    data_type: &str,
    signature_version: &str,
    timestamp: i64,
    access_secret: &str,
) -> Result<String, String> {
    let string_to_sign =
        format!("{method}\n{uri}\n{access_key}\n{data_type}\n{signature_version}\n{timestamp}");

    let mut mac = HmacSha1::new_from_slice(access_secret.as_bytes())
        .map_err(|e| format!("HMAC key init failed: {e}"))?;
    mac.update(string_to_sign.as_bytes());

    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verify an inbound webhook body against its `x-acrcloud-signature` header.
///
/// The signature is hex HMAC-SHA256 over the raw request body. Comparison is
/// constant-time via `Mac::verify_slice`.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let expected = match hex::decode(signature_hex.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_body(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_identify_signature_is_deterministic() {
        let a = identify_signature("POST", "/v1/identify", "key", "audio", "1", 1700000000, "sec")
            .unwrap();
        let b = identify_signature("POST", "/v1/identify", "key", "audio", "1", 1700000000, "sec")
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_identify_signature_shape() {
        let sig = identify_signature("POST", "/v1/identify", "key", "audio", "1", 1700000000, "sec")
            .unwrap();
        // base64 of a 20-byte SHA-1 HMAC
        assert_eq!(sig.len(), 28);
    }

    #[test]
    fn test_identify_signature_depends_on_secret_and_timestamp() {
        let base = identify_signature("POST", "/v1/identify", "key", "audio", "1", 1700000000, "sec")
            .unwrap();
        let other_secret =
            identify_signature("POST", "/v1/identify", "key", "audio", "1", 1700000000, "other")
                .unwrap();
        let other_ts =
            identify_signature("POST", "/v1/identify", "key", "audio", "1", 1700000001, "sec")
                .unwrap();
        assert_ne!(base, other_secret);
        assert_ne!(base, other_ts);
    }

    #[test]
    fn test_webhook_signature_valid() {
        let body = br#"{"file_id":42,"state":1}"#;
        let sig = sign_body("hook-secret", body);
        assert!(verify_webhook_signature("hook-secret", body, &sig));
    }

    #[test]
    fn test_webhook_signature_tampered_body() {
        let sig = sign_body("hook-secret", br#"{"file_id":42,"state":1}"#);
        assert!(!verify_webhook_signature(
            "hook-secret",
            br#"{"file_id":43,"state":1}"#,
            &sig
        ));
    }

    #[test]
    fn test_webhook_signature_wrong_secret() {
        let body = br#"{"file_id":42}"#;
        let sig = sign_body("hook-secret", body);
        assert!(!verify_webhook_signature("other-secret", body, &sig));
    }

    #[test]
    fn test_webhook_signature_garbage_hex() {
        assert!(!verify_webhook_signature("s", b"body", "not hex at all"));
        assert!(!verify_webhook_signature("s", b"body", ""));
    }
}
