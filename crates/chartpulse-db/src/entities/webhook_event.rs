use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Every inbound provider callback is stored before it is acted on,
/// so invalid or unmatched events stay auditable and replayable.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "webhook_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: serde_json::Value,
    pub signature_valid: bool,
    pub processed: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,
    pub file_scan_id: Option<Uuid>,
    pub received_at: DateTimeWithTimeZone,
    pub processed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::file_scan::Entity",
        from = "Column::FileScanId",
        to = "super::file_scan::Column::Id"
    )]
    FileScan,
}

impl Related<super::file_scan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileScan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
