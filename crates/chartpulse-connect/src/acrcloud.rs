//! ACRCloud clients — fingerprint identification and bulk file scanning.
//!
//! Two separate surfaces with different auth: identification signs every
//! request (see [`crate::signing`]), file scanning uses a Bearer token
//! against fs-containers.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ConnectError;
use crate::signing::identify_signature;

const DEFAULT_FS_BASE_URL: &str = "https://api-v2.acrcloud.com";

const IDENTIFY_URI: &str = "/v1/identify";
const DATA_TYPE: &str = "audio";
const SIGNATURE_VERSION: &str = "1";

/// Provider file states for scanned files.
pub const STATE_PROCESSING: i32 = 0;
pub const STATE_READY: i32 = 1;

/// Identification status codes we branch on.
const STATUS_SUCCESS: i32 = 0;
const STATUS_NO_RESULT: i32 = 1001;

// ─── Shared match types ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MusicMatch {
    pub title: Option<String>,
    #[serde(default)]
    pub artists: Vec<MatchArtist>,
    pub album: Option<MatchAlbum>,
    /// Match confidence 0..=100
    pub score: Option<f64>,
    pub external_ids: Option<ExternalIds>,
    pub acrid: Option<String>,
}

impl MusicMatch {
    /// Joined artist credit ("A, B"), `None` when the provider sent none.
    pub fn artist_names(&self) -> Option<String> {
        if self.artists.is_empty() {
            return None;
        }
        Some(
            self.artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }

    pub fn isrc(&self) -> Option<&str> {
        self.external_ids.as_ref()?.isrc.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchArtist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchAlbum {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalIds {
    pub isrc: Option<String>,
}

/// Normalized scan results: fingerprint matches plus cover-song matches.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScanResults {
    #[serde(default)]
    pub music: Vec<MusicMatch>,
    #[serde(default)]
    pub cover_songs: Vec<MusicMatch>,
}

impl ScanResults {
    /// Parse a raw provider results payload.
    ///
    /// Accepts both the identification shape (`music: [{…match…}]`) and the
    /// file-scanning shape (`music: [{"result": {…match…}}]`). Entries that
    /// fail to decode are dropped rather than failing the whole payload.
    pub fn from_value(raw: &serde_json::Value) -> Self {
        fn matches_of(raw: &serde_json::Value, key: &str) -> Vec<MusicMatch> {
            let Some(entries) = raw.get(key).and_then(|v| v.as_array()) else {
                return Vec::new();
            };
            entries
                .iter()
                .filter_map(|entry| {
                    let inner = entry.get("result").unwrap_or(entry);
                    serde_json::from_value(inner.clone()).ok()
                })
                .collect()
        }

        Self {
            music: matches_of(raw, "music"),
            cover_songs: matches_of(raw, "cover_songs"),
        }
    }

    /// Highest-scoring fingerprint match.
    pub fn best_music_match(&self) -> Option<&MusicMatch> {
        self.music.iter().max_by(|a, b| {
            a.score
                .unwrap_or(0.0)
                .total_cmp(&b.score.unwrap_or(0.0))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.music.is_empty() && self.cover_songs.is_empty()
    }
}

// ─── Identification (signed requests) ───────────────────────────────

#[derive(Debug, Clone)]
pub struct IdentifyConfig {
    /// Host like "identify-eu-west-1.acrcloud.com", or a full URL
    pub host: String,
    pub access_key: String,
    pub access_secret: String,
}

#[derive(Debug, Deserialize)]
struct IdentifyResponse {
    status: AcrStatus,
    metadata: Option<IdentifyMetadata>,
}

#[derive(Debug, Deserialize)]
struct AcrStatus {
    code: i32,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
struct IdentifyMetadata {
    #[serde(default)]
    music: Vec<MusicMatch>,
    #[serde(default)]
    cover_songs: Vec<MusicMatch>,
}

pub struct IdentifyClient {
    client: Client,
    config: IdentifyConfig,
}

impl IdentifyClient {
    pub fn new(config: IdentifyConfig) -> Result<Self, ConnectError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> String {
        if self.config.host.starts_with("http://") || self.config.host.starts_with("https://") {
            self.config.host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.config.host)
        }
    }

    /// Identify a short audio sample against the provider's catalog.
    ///
    /// A no-result answer is a normal outcome and maps to empty
    /// [`ScanResults`]; provider-level error codes map to
    /// [`ConnectError::Api`].
    pub async fn identify(
        &self,
        sample: &[u8],
        filename: &str,
    ) -> Result<ScanResults, ConnectError> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = identify_signature(
            "POST",
            IDENTIFY_URI,
            &self.config.access_key,
            DATA_TYPE,
            SIGNATURE_VERSION,
            timestamp,
            &self.config.access_secret,
        )
        .map_err(ConnectError::Config)?;

        let form = Form::new()
            .part(
                "sample",
                Part::bytes(sample.to_vec()).file_name(filename.to_string()),
            )
            .text("sample_bytes", sample.len().to_string())
            .text("access_key", self.config.access_key.clone())
            .text("data_type", DATA_TYPE)
            .text("signature_version", SIGNATURE_VERSION)
            .text("timestamp", timestamp.to_string())
            .text("signature", signature);

        let resp = self
            .client
            .post(format!("{}{IDENTIFY_URI}", self.base_url()))
            .multipart(form)
            .send()
            .await?;

        let http_status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ConnectError::api("acrcloud", http_status, message));
        }

        let body: IdentifyResponse = resp
            .json()
            .await
            .map_err(|e| ConnectError::Decode(format!("identify response: {e}")))?;

        match body.status.code {
            STATUS_SUCCESS => Ok(body
                .metadata
                .map(|m| ScanResults {
                    music: m.music,
                    cover_songs: m.cover_songs,
                })
                .unwrap_or_default()),
            STATUS_NO_RESULT => Ok(ScanResults::default()),
            code => Err(ConnectError::api(
                "acrcloud",
                http_status,
                format!("identify status {code}: {}", body.status.msg),
            )),
        }
    }
}

// ─── File scanning (Bearer token) ───────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileScanConfig {
    pub base_url: String,
    pub token: String,
    pub container_id: String,
}

impl FileScanConfig {
    pub fn new(
        token: impl Into<String>,
        container_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: DEFAULT_FS_BASE_URL.to_string(),
            token: token.into(),
            container_id: container_id.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct DataWrapper<T> {
    data: T,
}

/// One file in a scanning container, as the provider reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanFile {
    pub id: i64,
    pub name: Option<String>,
    /// 0 = processing, 1 = ready, negative = provider-side error
    pub state: i32,
    /// Raw results payload; parse with [`ScanResults::from_value`]
    pub results: Option<serde_json::Value>,
}

impl ScanFile {
    pub fn is_ready(&self) -> bool {
        self.state == STATE_READY
    }

    pub fn is_error(&self) -> bool {
        self.state < 0
    }
}

pub struct FileScanClient {
    client: Client,
    config: FileScanConfig,
}

impl FileScanClient {
    pub fn new(config: FileScanConfig) -> Result<Self, ConnectError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self { client, config })
    }

    fn files_url(&self) -> String {
        format!(
            "{}/api/fs-containers/{}/files",
            self.config.base_url.trim_end_matches('/'),
            self.config.container_id
        )
    }

    /// Upload a file into the scanning container. The provider processes it
    /// asynchronously; poll [`Self::get_file`] or wait for the webhook.
    pub async fn upload(&self, filename: &str, data: Vec<u8>) -> Result<ScanFile, ConnectError> {
        let form = Form::new()
            .part("file", Part::bytes(data).file_name(filename.to_string()))
            .text("data_type", DATA_TYPE);

        let resp = self
            .client
            .post(self.files_url())
            .bearer_auth(&self.config.token)
            .multipart(form)
            .send()
            .await?;

        Self::decode(resp, "upload").await
    }

    /// Fetch current state and results for a previously uploaded file.
    pub async fn get_file(&self, file_id: &str) -> Result<ScanFile, ConnectError> {
        let resp = self
            .client
            .get(format!("{}/{file_id}", self.files_url()))
            .bearer_auth(&self.config.token)
            .send()
            .await?;

        Self::decode(resp, "get file").await
    }

    async fn decode(resp: reqwest::Response, what: &str) -> Result<ScanFile, ConnectError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ConnectError::api("acrcloud", status, message));
        }
        let wrapper: DataWrapper<ScanFile> = resp
            .json()
            .await
            .map_err(|e| ConnectError::Decode(format!("{what}: {e}")))?;
        Ok(wrapper.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn music_match(title: &str, score: f64) -> serde_json::Value {
        json!({
            "title": title,
            "artists": [{"name": "Some Artist"}, {"name": "Other"}],
            "album": {"name": "Some Album"},
            "score": score,
            "external_ids": {"isrc": "USUM71703861"},
            "acrid": "abcdef0123456789"
        })
    }

    #[tokio::test]
    async fn test_identify_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/identify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": {"code": 0, "msg": "Success", "version": "1.0"},
                "metadata": {"music": [music_match("Shape of You", 100.0)]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = IdentifyClient::new(IdentifyConfig {
            host: server.uri(),
            access_key: "ak".into(),
            access_secret: "sk".into(),
        })
        .unwrap();

        let results = client.identify(b"fake sample", "sample.mp3").await.unwrap();
        assert_eq!(results.music.len(), 1);
        assert_eq!(results.music[0].title.as_deref(), Some("Shape of You"));
        assert_eq!(
            results.music[0].artist_names().as_deref(),
            Some("Some Artist, Other")
        );
        assert_eq!(results.music[0].isrc(), Some("USUM71703861"));
    }

    #[tokio::test]
    async fn test_identify_no_result_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/identify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": {"code": 1001, "msg": "No result"}
            })))
            .mount(&server)
            .await;

        let client = IdentifyClient::new(IdentifyConfig {
            host: server.uri(),
            access_key: "ak".into(),
            access_secret: "sk".into(),
        })
        .unwrap();

        let results = client.identify(b"noise", "noise.wav").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_identify_provider_error_code() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/identify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": {"code": 3001, "msg": "Missing/Invalid Access Key"}
            })))
            .mount(&server)
            .await;

        let client = IdentifyClient::new(IdentifyConfig {
            host: server.uri(),
            access_key: "bad".into(),
            access_secret: "sk".into(),
        })
        .unwrap();

        let err = client.identify(b"x", "x.mp3").await.unwrap_err();
        assert!(err.to_string().contains("3001"));
    }

    #[tokio::test]
    async fn test_file_scan_upload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/fs-containers/c-99/files"))
            .and(header("authorization", "Bearer fs-token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "data": {"id": 4242, "name": "upload.mp3", "state": 0}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = FileScanClient::new(
            FileScanConfig::new("fs-token", "c-99").with_base_url(server.uri()),
        )
        .unwrap();

        let file = client.upload("upload.mp3", b"bytes".to_vec()).await.unwrap();
        assert_eq!(file.id, 4242);
        assert_eq!(file.state, STATE_PROCESSING);
        assert!(!file.is_ready());
    }

    #[tokio::test]
    async fn test_file_scan_get_file_ready() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/fs-containers/c-99/files/4242"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": 4242,
                    "name": "upload.mp3",
                    "state": 1,
                    "results": {
                        "music": [{"result": music_match("Shape of You", 97.0)}],
                        "cover_songs": [{"result": music_match("Shape of You (Cover)", 88.0)}]
                    }
                }
            })))
            .mount(&server)
            .await;

        let client = FileScanClient::new(
            FileScanConfig::new("fs-token", "c-99").with_base_url(server.uri()),
        )
        .unwrap();

        let file = client.get_file("4242").await.unwrap();
        assert!(file.is_ready());

        let results = ScanResults::from_value(file.results.as_ref().unwrap());
        assert_eq!(results.music.len(), 1);
        assert_eq!(results.cover_songs.len(), 1);
        assert_eq!(
            results.best_music_match().unwrap().title.as_deref(),
            Some("Shape of You")
        );
    }

    #[test]
    fn test_scan_results_from_value_both_shapes() {
        // identification shape: bare matches
        let flat = json!({"music": [music_match("A", 90.0), music_match("B", 95.0)]});
        let parsed = ScanResults::from_value(&flat);
        assert_eq!(parsed.music.len(), 2);
        assert_eq!(
            parsed.best_music_match().unwrap().title.as_deref(),
            Some("B")
        );

        // file-scanning shape: wrapped in "result"
        let wrapped = json!({"music": [{"result": music_match("C", 80.0)}]});
        let parsed = ScanResults::from_value(&wrapped);
        assert_eq!(parsed.music.len(), 1);
        assert_eq!(parsed.music[0].title.as_deref(), Some("C"));
    }

    #[test]
    fn test_scan_results_from_value_garbage() {
        let parsed = ScanResults::from_value(&json!({"music": "not an array"}));
        assert!(parsed.is_empty());

        let parsed = ScanResults::from_value(&json!(null));
        assert!(parsed.is_empty());

        // undecodable entries are dropped, not fatal
        let parsed = ScanResults::from_value(&json!({"music": [42, music_match("D", 70.0)]}));
        assert_eq!(parsed.music.len(), 1);
    }
}
