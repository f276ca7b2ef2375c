use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of an uploaded file going through fingerprint scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "scan_state")]
pub enum ScanState {
    /// Spooled locally, not yet sent to the scanning provider
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "uploading")]
    Uploading,
    /// Accepted by the provider, waiting for results
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "ready")]
    Ready,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl ScanState {
    pub fn as_str(&self) -> &str {
        match self {
            ScanState::Pending => "pending",
            ScanState::Uploading => "uploading",
            ScanState::Processing => "processing",
            ScanState::Ready => "ready",
            ScanState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ScanState::Pending),
            "uploading" => Some(ScanState::Uploading),
            "processing" => Some(ScanState::Processing),
            "ready" => Some(ScanState::Ready),
            "failed" => Some(ScanState::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_scans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub original_filename: String,
    pub spool_path: String,
    pub file_size: i64,
    /// SHA-256 of the uploaded bytes, used to reject duplicate uploads
    pub content_sha256: String,
    pub state: ScanState,
    /// File id assigned by the scanning provider once uploaded
    pub acr_file_id: Option<String>,
    /// Raw provider results payload
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub results: Option<serde_json::Value>,
    pub music_matches: Option<i32>,
    pub cover_matches: Option<i32>,
    pub detected_title: Option<String>,
    pub detected_artist: Option<String>,
    pub detected_isrc: Option<String>,
    /// Best-match confidence 0..=100
    pub match_score: Option<i16>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UploadedBy",
        to = "super::user::Column::Id"
    )]
    Uploader,
    #[sea_orm(has_many = "super::webhook_event::Entity")]
    WebhookEvent,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Uploader.def()
    }
}

impl Related<super::webhook_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WebhookEvent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
