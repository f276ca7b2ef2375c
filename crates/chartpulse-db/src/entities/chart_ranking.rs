use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One published snapshot of a chart on one date.
///
/// `(chart_id, ranking_date)` is unique: re-syncing a date updates the
/// existing row instead of inserting a second snapshot.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chart_rankings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub chart_id: Uuid,
    pub ranking_date: Date,
    pub fetched_at: DateTimeWithTimeZone,
    pub entry_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chart::Entity",
        from = "Column::ChartId",
        to = "super::chart::Column::Id"
    )]
    Chart,
    #[sea_orm(has_many = "super::chart_ranking_entry::Entity")]
    ChartRankingEntry,
}

impl Related<super::chart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chart.def()
    }
}

impl Related<super::chart_ranking_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChartRankingEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
