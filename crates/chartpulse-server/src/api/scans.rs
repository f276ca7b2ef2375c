use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::credentials;
use crate::scan_worker;
use chartpulse_connect::{sha256_hex, IdentifyClient};
use chartpulse_db::entities::file_scan::{self, ScanState};
use chartpulse_db::AppState;

use super::charts::PaginatedResponse;

const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac", "ogg", "opus", "wma"];

/// Synchronous identification only needs the head of the file.
const IDENTIFY_SAMPLE_BYTES: usize = 1024 * 1024;

pub(crate) fn file_extension(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// SECURITY: check magic bytes so a renamed non-audio file is rejected
/// before it is spooled.
pub(crate) fn looks_like_audio(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    // MP3: ID3 tag or sync frame
    if data.starts_with(b"ID3") || (data[0] == 0xFF && (data[1] & 0xE0) == 0xE0) {
        return true;
    }
    // FLAC
    if data.starts_with(b"fLaC") {
        return true;
    }
    // OGG (Vorbis/Opus)
    if data.starts_with(b"OggS") {
        return true;
    }
    // WAV (RIFF....WAVE)
    if data.starts_with(b"RIFF") && &data[8..12] == b"WAVE" {
        return true;
    }
    // AAC/M4A/MP4 (ftyp box)
    if &data[4..8] == b"ftyp" {
        return true;
    }
    // WMA/ASF
    if data.starts_with(&[0x30, 0x26, 0xB2, 0x75]) {
        return true;
    }
    false
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub id: Uuid,
    pub original_filename: String,
    pub file_size: i64,
    pub content_sha256: String,
    pub state: String,
    pub acr_file_id: Option<String>,
    pub music_matches: Option<i32>,
    pub cover_matches: Option<i32>,
    pub detected_title: Option<String>,
    pub detected_artist: Option<String>,
    pub detected_isrc: Option<String>,
    pub match_score: Option<i16>,
    pub error: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
    pub completed_at: Option<chrono::DateTime<chrono::FixedOffset>>,
}

impl From<file_scan::Model> for ScanResponse {
    fn from(s: file_scan::Model) -> Self {
        Self {
            id: s.id,
            original_filename: s.original_filename,
            file_size: s.file_size,
            content_sha256: s.content_sha256,
            state: s.state.as_str().to_string(),
            acr_file_id: s.acr_file_id,
            music_matches: s.music_matches,
            cover_matches: s.cover_matches,
            detected_title: s.detected_title,
            detected_artist: s.detected_artist,
            detected_isrc: s.detected_isrc,
            match_score: s.match_score,
            error: s.error,
            uploaded_by: s.uploaded_by,
            created_at: s.created_at,
            completed_at: s.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanDetailResponse {
    #[serde(flatten)]
    pub scan: ScanResponse,
    /// Raw provider payload, only on the detail endpoint
    pub results: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ScanListParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub state: Option<String>,
}

/// POST /api/scans — multipart upload of an audio file for fingerprint scanning
pub async fn upload_scan(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ScanResponse>), (StatusCode, Json<serde_json::Value>)> {
    let mut file_data: Option<(String, Vec<u8>)> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("upload.mp3").to_string();
            let data = field.bytes().await.map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": format!("Read error: {e}") })),
                )
            })?;
            file_data = Some((filename, data.to_vec()));
        }
    }

    let (filename, data) = file_data.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "No file provided" })),
        )
    })?;

    if data.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Uploaded file is empty" })),
        ));
    }

    let ext = file_extension(&filename).unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(serde_json::json!({ "error": format!("Unsupported format: {ext}") })),
        ));
    }

    if !looks_like_audio(&data) {
        return Err((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(serde_json::json!({ "error": "File content does not match a recognized audio format" })),
        ));
    }

    let content_hash = sha256_hex(&data);

    // Reject re-uploads of bytes we already hold, unless the earlier scan failed
    let duplicate = file_scan::Entity::find()
        .filter(file_scan::Column::ContentSha256.eq(&content_hash))
        .filter(file_scan::Column::State.ne(ScanState::Failed))
        .one(&state.db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("DB error: {e}") })),
            )
        })?;
    if let Some(existing) = duplicate {
        return Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": format!("File already uploaded (scan {})", existing.id) })),
        ));
    }

    let scan_id = Uuid::new_v4();
    let spool_path = state
        .spool
        .store(scan_id, &filename, &data)
        .await
        .map_err(|e| {
            tracing::error!("spool store failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to store file" })),
            )
        })?;

    let scan = file_scan::ActiveModel {
        id: Set(scan_id),
        original_filename: Set(filename),
        spool_path: Set(spool_path),
        file_size: Set(data.len() as i64),
        content_sha256: Set(content_hash),
        state: Set(ScanState::Pending),
        acr_file_id: Set(None),
        results: Set(None),
        music_matches: Set(None),
        cover_matches: Set(None),
        detected_title: Set(None),
        detected_artist: Set(None),
        detected_isrc: Set(None),
        match_score: Set(None),
        error: Set(None),
        uploaded_by: Set(Some(user.0.sub)),
        created_at: Set(chrono::Utc::now().into()),
        updated_at: Set(chrono::Utc::now().into()),
        completed_at: Set(None),
    }
    .insert(&state.db)
    .await
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": format!("DB error: {e}") })),
        )
    })?;

    tracing::info!(scan_id = %scan.id, "file spooled for scanning");
    scan_worker::trigger_scan_pass();

    // 202: the scan is queued, the worker finishes it asynchronously
    Ok((StatusCode::ACCEPTED, Json(ScanResponse::from(scan))))
}

/// GET /api/scans
pub async fn list_scans(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScanListParams>,
) -> Result<Json<PaginatedResponse<ScanResponse>>, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).min(100);

    let mut query = file_scan::Entity::find();
    if let Some(raw) = params.state.as_deref() {
        let wanted = ScanState::parse(raw)
            .ok_or((StatusCode::BAD_REQUEST, "Invalid state filter".to_string()))?;
        query = query.filter(file_scan::Column::State.eq(wanted));
    }

    let paginator = query
        .order_by_desc(file_scan::Column::CreatedAt)
        .paginate(&state.db, per_page);

    let total = paginator
        .num_items()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let scans = paginator
        .fetch_page(page - 1)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    Ok(Json(PaginatedResponse {
        data: scans.into_iter().map(ScanResponse::from).collect(),
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    }))
}

/// GET /api/scans/:id
pub async fn get_scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanDetailResponse>, (StatusCode, String)> {
    let scan = file_scan::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Scan not found".to_string()))?;

    let results = scan.results.clone();
    Ok(Json(ScanDetailResponse {
        scan: ScanResponse::from(scan),
        results,
    }))
}

/// POST /api/scans/:id/retry — requeue a failed scan from its spooled bytes
pub async fn retry_scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanResponse>, (StatusCode, Json<serde_json::Value>)> {
    let scan = file_scan::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("DB error: {e}") })),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "Scan not found" })),
            )
        })?;

    if scan.state != ScanState::Failed {
        return Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "Only failed scans can be retried" })),
        ));
    }
    if !state.spool.exists(&scan.spool_path).await {
        return Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "Spooled file no longer available" })),
        ));
    }

    let mut update: file_scan::ActiveModel = scan.into();
    update.state = Set(ScanState::Pending);
    update.acr_file_id = Set(None);
    update.results = Set(None);
    update.music_matches = Set(None);
    update.cover_matches = Set(None);
    update.detected_title = Set(None);
    update.detected_artist = Set(None);
    update.detected_isrc = Set(None);
    update.match_score = Set(None);
    update.error = Set(None);
    update.completed_at = Set(None);
    update.updated_at = Set(chrono::Utc::now().into());

    let scan = update.update(&state.db).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": format!("DB error: {e}") })),
        )
    })?;

    tracing::info!(scan_id = %scan.id, "scan requeued");
    scan_worker::trigger_scan_pass();

    Ok(Json(ScanResponse::from(scan)))
}

#[derive(Debug, Serialize)]
pub struct MatchSummary {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub isrc: Option<String>,
    pub score: Option<f64>,
    pub acrid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub matches: Vec<MatchSummary>,
    pub cover_matches: usize,
}

/// POST /api/scans/:id/identify — synchronous fingerprint lookup on the
/// head of the spooled file. Does not change the scan's state.
pub async fn identify_scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<IdentifyResponse>, (StatusCode, Json<serde_json::Value>)> {
    let scan = file_scan::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("DB error: {e}") })),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "Scan not found" })),
            )
        })?;

    let Some(config) = credentials::identify_config(&state).await else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "Identification credentials not configured" })),
        ));
    };
    let client = IdentifyClient::new(config).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    let data = state.spool.read(&scan.spool_path).await.map_err(|e| {
        (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": format!("Spooled file unavailable: {e}") })),
        )
    })?;
    let sample = &data[..data.len().min(IDENTIFY_SAMPLE_BYTES)];

    let results = client
        .identify(sample, &scan.original_filename)
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": format!("Identification error: {e}") })),
            )
        })?;

    Ok(Json(IdentifyResponse {
        matches: results
            .music
            .iter()
            .map(|m| MatchSummary {
                title: m.title.clone(),
                artist: m.artist_names(),
                isrc: m.isrc().map(str::to_string),
                score: m.score,
                acrid: m.acrid.clone(),
            })
            .collect(),
        cover_matches: results.cover_songs.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("song.MP3"), Some("mp3".into()));
        assert_eq!(file_extension("a.b.flac"), Some("flac".into()));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn test_magic_bytes_id3() {
        let mut data = b"ID3".to_vec();
        data.resize(32, 0);
        assert!(looks_like_audio(&data));
    }

    #[test]
    fn test_magic_bytes_mpeg_sync_frame() {
        let mut data = vec![0xFF, 0xFB];
        data.resize(32, 0);
        assert!(looks_like_audio(&data));
    }

    #[test]
    fn test_magic_bytes_wav() {
        let mut data = b"RIFF\x24\x00\x00\x00WAVE".to_vec();
        data.resize(32, 0);
        assert!(looks_like_audio(&data));
    }

    #[test]
    fn test_magic_bytes_m4a() {
        let mut data = b"\x00\x00\x00\x20ftypM4A ".to_vec();
        data.resize(32, 0);
        assert!(looks_like_audio(&data));
    }

    #[test]
    fn test_magic_bytes_rejects_renamed_text() {
        assert!(!looks_like_audio(b"hello, this is not audio at all"));
        assert!(!looks_like_audio(b"short"));
        assert!(!looks_like_audio(&[0u8; 64]));
    }

    #[test]
    fn test_scan_response_excludes_spool_path() {
        let scan = file_scan::Model {
            id: Uuid::new_v4(),
            original_filename: "demo.mp3".into(),
            spool_path: "ab/abcd.bin".into(),
            file_size: 4096,
            content_sha256: "deadbeef".into(),
            state: ScanState::Ready,
            acr_file_id: Some("123".into()),
            results: Some(serde_json::json!({"music": []})),
            music_matches: Some(1),
            cover_matches: Some(0),
            detected_title: Some("Midnight Run".into()),
            detected_artist: None,
            detected_isrc: None,
            match_score: Some(97),
            error: None,
            uploaded_by: None,
            created_at: chrono::Utc::now().fixed_offset(),
            updated_at: chrono::Utc::now().fixed_offset(),
            completed_at: None,
        };
        let json = serde_json::to_value(ScanResponse::from(scan)).unwrap();
        assert!(json.get("spool_path").is_none());
        assert!(json.get("results").is_none());
        assert_eq!(json["state"], "ready");
        assert_eq!(json["match_score"], 97);
    }
}
