//! Upload spool — where audio files wait between upload and scanning.
//!
//! Uploads are keyed by scan id so paths never collide across scans. The
//! worker reads a file back from the spool when it ships it to the
//! scanning provider, and deletes it once the scan reaches a final state.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("S3 error: {0}")]
    S3(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

#[async_trait]
pub trait UploadSpool: Send + Sync {
    /// Store an upload, returning the spool path to persist on the scan row.
    async fn store(
        &self,
        scan_id: Uuid,
        filename: &str,
        data: &[u8],
    ) -> Result<String, SpoolError>;

    async fn read(&self, spool_path: &str) -> Result<Vec<u8>, SpoolError>;

    async fn exists(&self, spool_path: &str) -> bool;

    async fn delete(&self, spool_path: &str) -> Result<(), SpoolError>;
}

// ─── Local Filesystem Spool ────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LocalSpool {
    root: PathBuf,
}

impl LocalSpool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        let root = std::env::var("SCAN_SPOOL_PATH").unwrap_or_else(|_| "./data/spool".to_string());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, spool_path: &str) -> PathBuf {
        self.root.join(spool_path)
    }
}

#[async_trait]
impl UploadSpool for LocalSpool {
    async fn store(
        &self,
        scan_id: Uuid,
        filename: &str,
        data: &[u8],
    ) -> Result<String, SpoolError> {
        let name = sanitize_filename(filename);
        let dir = self.root.join(scan_id.to_string());
        fs::create_dir_all(&dir).await?;

        let path = dir.join(&name);
        fs::write(&path, data).await?;

        Ok(format!("{scan_id}/{name}"))
    }

    async fn read(&self, spool_path: &str) -> Result<Vec<u8>, SpoolError> {
        let path = self.full_path(spool_path);
        fs::read(&path)
            .await
            .map_err(|_| SpoolError::NotFound(spool_path.to_string()))
    }

    async fn exists(&self, spool_path: &str) -> bool {
        fs::metadata(self.full_path(spool_path)).await.is_ok()
    }

    async fn delete(&self, spool_path: &str) -> Result<(), SpoolError> {
        let path = self.full_path(spool_path);
        if path.exists() {
            fs::remove_file(&path).await?;
            // drop the per-scan directory if it is now empty
            if let Some(parent) = path.parent() {
                let _ = fs::remove_dir(parent).await;
            }
        }
        Ok(())
    }
}

// ─── S3 Spool ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct S3Spool {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Spool {
    pub async fn from_config(
        endpoint: Option<&str>,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        prefix: &str,
    ) -> Result<Self, SpoolError> {
        let creds =
            aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "chartpulse");

        let mut config_builder = aws_sdk_s3::Config::builder()
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .credentials_provider(creds)
            .behavior_version_latest();

        if let Some(ep) = endpoint {
            config_builder = config_builder.endpoint_url(ep).force_path_style(true);
        }

        let config = config_builder.build();
        let client = aws_sdk_s3::Client::from_conf(config);

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }

    fn s3_key(&self, spool_path: &str) -> String {
        if self.prefix.is_empty() {
            spool_path.to_string()
        } else {
            format!("{}/{}", self.prefix.trim_end_matches('/'), spool_path)
        }
    }
}

#[async_trait]
impl UploadSpool for S3Spool {
    async fn store(
        &self,
        scan_id: Uuid,
        filename: &str,
        data: &[u8],
    ) -> Result<String, SpoolError> {
        let name = sanitize_filename(filename);
        let spool_path = format!("{scan_id}/{name}");
        let key = self.s3_key(&spool_path);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| SpoolError::S3(format!("PutObject failed: {e}")))?;

        Ok(spool_path)
    }

    async fn read(&self, spool_path: &str) -> Result<Vec<u8>, SpoolError> {
        let key = self.s3_key(spool_path);
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| SpoolError::S3(format!("GetObject failed: {e}")))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| SpoolError::S3(format!("Read body: {e}")))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn exists(&self, spool_path: &str) -> bool {
        let key = self.s3_key(spool_path);
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .is_ok()
    }

    async fn delete(&self, spool_path: &str) -> Result<(), SpoolError> {
        let key = self.s3_key(spool_path);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| SpoolError::S3(format!("DeleteObject failed: {e}")))?;
        Ok(())
    }
}

// ─── Helpers ───────────────────────────────────────────────────────

pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | '\0' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim().to_string();
    // SECURITY: never let traversal sequences through
    if cleaned.contains("..") {
        return cleaned.replace("..", "__");
    }
    if cleaned.is_empty() || cleaned == "." {
        return "upload.bin".to_string();
    }
    cleaned
}

pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{:x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename_clean() {
        assert_eq!(sanitize_filename("my_song.mp3"), "my_song.mp3");
    }

    #[test]
    fn test_sanitize_filename_slashes() {
        assert_eq!(sanitize_filename("path/to/file.mp3"), "path_to_file.mp3");
        assert_eq!(sanitize_filename("path\\to\\file.mp3"), "path_to_file.mp3");
    }

    #[test]
    fn test_sanitize_filename_special_chars() {
        assert_eq!(sanitize_filename("a:b*c?d\"e<f>g|h"), "a_b_c_d_e_f_g_h");
    }

    #[test]
    fn test_sanitize_filename_traversal() {
        let cleaned = sanitize_filename("../../etc/passwd");
        assert!(!cleaned.contains(".."));
        assert!(!cleaned.contains('/'));
        assert_eq!(sanitize_filename(".."), "__");
    }

    #[test]
    fn test_sanitize_filename_empty_falls_back() {
        assert_eq!(sanitize_filename(""), "upload.bin");
        assert_eq!(sanitize_filename("   "), "upload.bin");
        assert_eq!(sanitize_filename("."), "upload.bin");
    }

    #[test]
    fn test_sanitize_filename_unicode() {
        assert_eq!(sanitize_filename("日本語の曲.mp3"), "日本語の曲.mp3");
    }

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(sha256_hex(b"abc").len(), 64);
    }

    #[tokio::test]
    async fn test_local_spool_store_and_read() {
        let tmp = TempDir::new().unwrap();
        let spool = LocalSpool::new(tmp.path());
        let scan_id = Uuid::new_v4();

        let path = spool
            .store(scan_id, "sample.mp3", b"fake audio data")
            .await
            .unwrap();

        assert_eq!(path, format!("{scan_id}/sample.mp3"));
        let data = spool.read(&path).await.unwrap();
        assert_eq!(data, b"fake audio data");
    }

    #[tokio::test]
    async fn test_local_spool_exists() {
        let tmp = TempDir::new().unwrap();
        let spool = LocalSpool::new(tmp.path());
        let scan_id = Uuid::new_v4();

        let path = spool.store(scan_id, "a.mp3", b"x").await.unwrap();

        assert!(spool.exists(&path).await);
        assert!(!spool.exists("missing/file.mp3").await);
    }

    #[tokio::test]
    async fn test_local_spool_delete() {
        let tmp = TempDir::new().unwrap();
        let spool = LocalSpool::new(tmp.path());
        let scan_id = Uuid::new_v4();

        let path = spool.store(scan_id, "gone.mp3", b"x").await.unwrap();
        assert!(spool.exists(&path).await);

        spool.delete(&path).await.unwrap();
        assert!(!spool.exists(&path).await);
        // the per-scan directory is cleaned up too
        assert!(!tmp.path().join(scan_id.to_string()).exists());
    }

    #[tokio::test]
    async fn test_local_spool_delete_nonexistent_ok() {
        let tmp = TempDir::new().unwrap();
        let spool = LocalSpool::new(tmp.path());
        assert!(spool.delete("missing/file.mp3").await.is_ok());
    }

    #[tokio::test]
    async fn test_local_spool_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let spool = LocalSpool::new(tmp.path());
        let err = spool.read("missing.mp3").await.unwrap_err();
        assert!(matches!(err, SpoolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_local_spool_overwrite_same_scan() {
        let tmp = TempDir::new().unwrap();
        let spool = LocalSpool::new(tmp.path());
        let scan_id = Uuid::new_v4();

        let p1 = spool.store(scan_id, "v.mp3", b"v1").await.unwrap();
        let p2 = spool.store(scan_id, "v.mp3", b"v2").await.unwrap();

        assert_eq!(p1, p2);
        assert_eq!(spool.read(&p2).await.unwrap(), b"v2");
    }
}
