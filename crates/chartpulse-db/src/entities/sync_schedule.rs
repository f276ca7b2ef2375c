use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-chart sync configuration. One schedule per chart.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_schedules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub chart_id: Uuid,
    pub is_enabled: bool,
    /// How far back to look for missing ranking dates (days, clamped 1..=365)
    pub lookback_days: i32,
    /// Newest ranking date a sync pass has stored for this chart
    pub last_synced_date: Option<Date>,
    pub last_run_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chart::Entity",
        from = "Column::ChartId",
        to = "super::chart::Column::Id"
    )]
    Chart,
    #[sea_orm(has_many = "super::sync_execution::Entity")]
    SyncExecution,
}

impl Related<super::chart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chart.def()
    }
}

impl Related<super::sync_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncExecution.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
