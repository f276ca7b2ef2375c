//! Provider credential storage and resolution.
//!
//! API credentials for the chart and fingerprint providers can come from the
//! environment or from `service_settings` rows managed in the admin UI.
//! Environment variables always win, so deployments can keep credentials out
//! of the database entirely. Stored secrets are encrypted with AES-256-GCM
//! under a key derived from `jwt_secret`.

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use chartpulse_connect::{FileScanConfig, IdentifyConfig, SoundchartsConfig};
use chartpulse_db::entities::service_setting;
use chartpulse_db::AppState;

// SECURITY: These are HKDF domain-separation parameters (salt and info), NOT secret keys.
// They ensure the derived encryption key is unique to the "stored service credential"
// use-case. The actual secret input to HKDF is `jwt_secret`, sourced from the
// JWT_SECRET environment variable.
const HKDF_SALT: &[u8] = b"chartpulse-settings";
const HKDF_INFO: &[u8] = b"service-credentials";

/// Encrypt a credential value for storage using AES-256-GCM.
///
/// The encryption key is derived from `jwt_secret` via HKDF-SHA256.
/// Returns base64-encoded `nonce || ciphertext`.
pub fn encrypt_setting(value: &str, jwt_secret: &str) -> Result<String, String> {
    use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
    use hkdf::Hkdf;
    use sha2::Sha256;

    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), jwt_secret.as_bytes());
    let mut derived = [0u8; 32];
    hk.expand(HKDF_INFO, &mut derived)
        .map_err(|e| format!("HKDF expand failed: {e}"))?;

    let cipher =
        Aes256Gcm::new_from_slice(&derived).map_err(|e| format!("AES-GCM key init failed: {e}"))?;

    let nonce_bytes: [u8; 12] = rand::random();
    #[allow(deprecated)]
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, value.as_bytes())
        .map_err(|e| format!("Encryption failed: {e}"))?;

    let mut combined = Vec::with_capacity(12 + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    use base64::Engine;
    Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
}

/// Decrypt a stored credential value.
pub fn decrypt_setting(encrypted: &str, jwt_secret: &str) -> Result<String, String> {
    use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
    use hkdf::Hkdf;
    use sha2::Sha256;

    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), jwt_secret.as_bytes());
    let mut derived = [0u8; 32];
    hk.expand(HKDF_INFO, &mut derived)
        .map_err(|e| format!("HKDF expand failed: {e}"))?;

    let cipher =
        Aes256Gcm::new_from_slice(&derived).map_err(|e| format!("AES-GCM key init failed: {e}"))?;

    use base64::Engine;
    let combined = base64::engine::general_purpose::STANDARD
        .decode(encrypted)
        .map_err(|e| format!("Base64 decode failed: {e}"))?;

    if combined.len() < 12 {
        return Err("Ciphertext too short".to_string());
    }

    let (nonce_bytes, ciphertext) = combined.split_at(12);
    #[allow(deprecated)]
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| format!("Decryption failed: {e}"))?;

    String::from_utf8(plaintext).map_err(|e| format!("UTF-8 decode failed: {e}"))
}

/// Read a raw settings row.
async fn read_setting(
    db: &sea_orm::DatabaseConnection,
    key: &str,
) -> Option<service_setting::Model> {
    service_setting::Entity::find()
        .filter(service_setting::Column::Key.eq(key))
        .one(db)
        .await
        .ok()
        .flatten()
}

/// Resolve a credential: environment variable first, then stored setting.
/// Encrypted settings are decrypted transparently; empty values count as unset.
pub async fn resolve(state: &AppState, env_var: &str, setting_key: &str) -> Option<String> {
    if let Ok(v) = std::env::var(env_var) {
        if !v.trim().is_empty() {
            return Some(v);
        }
    }

    let row = read_setting(&state.db, setting_key).await?;
    let value = if row.is_secret {
        match decrypt_setting(&row.value, &state.jwt_secret) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = setting_key, "failed to decrypt stored setting: {e}");
                return None;
            }
        }
    } else {
        row.value
    };

    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Upsert a settings row, encrypting the value when it is marked secret.
pub async fn set_setting(
    state: &AppState,
    key: &str,
    value: &str,
    is_secret: bool,
) -> Result<(), String> {
    let stored = if is_secret {
        encrypt_setting(value, &state.jwt_secret)?
    } else {
        value.to_string()
    };

    let existing = read_setting(&state.db, key).await;
    match existing {
        Some(row) => {
            let mut update: service_setting::ActiveModel = row.into();
            update.value = Set(stored);
            update.is_secret = Set(is_secret);
            update.updated_at = Set(chrono::Utc::now().into());
            update
                .update(&state.db)
                .await
                .map_err(|e| format!("DB error: {e}"))?;
        }
        None => {
            service_setting::ActiveModel {
                id: Set(Uuid::new_v4()),
                key: Set(key.to_string()),
                value: Set(stored),
                is_secret: Set(is_secret),
                updated_at: Set(chrono::Utc::now().into()),
            }
            .insert(&state.db)
            .await
            .map_err(|e| format!("DB error: {e}"))?;
        }
    }
    Ok(())
}

// ─── Provider configs ──────────────────────────────────────────────

/// Chart provider credentials, `None` until both values are configured.
pub async fn soundcharts_config(state: &AppState) -> Option<SoundchartsConfig> {
    let app_id = resolve(state, "SOUNDCHARTS_APP_ID", "soundcharts_app_id").await?;
    let api_key = resolve(state, "SOUNDCHARTS_API_KEY", "soundcharts_api_key").await?;

    let mut config = SoundchartsConfig::new(app_id, api_key);
    if let Some(base_url) = resolve(state, "SOUNDCHARTS_BASE_URL", "soundcharts_base_url").await {
        config = config.with_base_url(base_url);
    }
    Some(config)
}

/// Fingerprint identification credentials.
pub async fn identify_config(state: &AppState) -> Option<IdentifyConfig> {
    let host = resolve(state, "ACR_IDENTIFY_HOST", "acr_identify_host").await?;
    let access_key = resolve(state, "ACR_ACCESS_KEY", "acr_access_key").await?;
    let access_secret = resolve(state, "ACR_ACCESS_SECRET", "acr_access_secret").await?;
    Some(IdentifyConfig {
        host,
        access_key,
        access_secret,
    })
}

/// File scanning credentials.
pub async fn file_scan_config(state: &AppState) -> Option<FileScanConfig> {
    let token = resolve(state, "ACR_FS_TOKEN", "acr_fs_token").await?;
    let container_id = resolve(state, "ACR_FS_CONTAINER_ID", "acr_fs_container_id").await?;

    let mut config = FileScanConfig::new(token, container_id);
    if let Some(base_url) = resolve(state, "ACR_FS_BASE_URL", "acr_fs_base_url").await {
        config = config.with_base_url(base_url);
    }
    Some(config)
}

/// Shared secret for webhook signature verification, if configured.
pub async fn webhook_secret(state: &AppState) -> Option<String> {
    resolve(state, "ACR_WEBHOOK_SECRET", "acr_webhook_secret").await
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-jwt-secret-for-credentials";

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let encrypted = encrypt_setting("sk-very-secret-token", SECRET).unwrap();
        assert_ne!(encrypted, "sk-very-secret-token");
        let decrypted = decrypt_setting(&encrypted, SECRET).unwrap();
        assert_eq!(decrypted, "sk-very-secret-token");
    }

    #[test]
    fn test_encryption_is_randomized() {
        // Fresh nonce per call, so the same plaintext never repeats
        let a = encrypt_setting("same-value", SECRET).unwrap();
        let b = encrypt_setting("same-value", SECRET).unwrap();
        assert_ne!(a, b);
        assert_eq!(decrypt_setting(&a, SECRET).unwrap(), "same-value");
        assert_eq!(decrypt_setting(&b, SECRET).unwrap(), "same-value");
    }

    #[test]
    fn test_decrypt_with_wrong_secret_fails() {
        let encrypted = encrypt_setting("token", SECRET).unwrap();
        assert!(decrypt_setting(&encrypted, "different-secret").is_err());
    }

    #[test]
    fn test_decrypt_tampered_ciphertext_fails() {
        let encrypted = encrypt_setting("token", SECRET).unwrap();
        let mut tampered = encrypted.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(decrypt_setting(&tampered, SECRET).is_err());
    }

    #[test]
    fn test_decrypt_garbage_fails() {
        assert!(decrypt_setting("not base64!!!", SECRET).is_err());
        // valid base64 but too short to contain a nonce
        assert!(decrypt_setting("aGVsbG8=", SECRET).is_err());
    }

    #[test]
    fn test_empty_value_roundtrip() {
        let encrypted = encrypt_setting("", SECRET).unwrap();
        assert_eq!(decrypt_setting(&encrypted, SECRET).unwrap(), "");
    }
}
