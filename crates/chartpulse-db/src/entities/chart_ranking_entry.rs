use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One position in a ranking snapshot. `(ranking_id, position)` is unique.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chart_ranking_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub ranking_id: Uuid,
    pub position: i32,
    pub track_id: Uuid,
    pub previous_position: Option<i32>,
    /// Positive = climbed, negative = dropped, as reported by the provider
    pub position_change: Option<i32>,
    pub weeks_on_chart: Option<i32>,
    /// Platform metric behind the position (streams, plays), when exposed
    pub metric_value: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chart_ranking::Entity",
        from = "Column::RankingId",
        to = "super::chart_ranking::Column::Id"
    )]
    ChartRanking,
    #[sea_orm(
        belongs_to = "super::track::Entity",
        from = "Column::TrackId",
        to = "super::track::Column::Id"
    )]
    Track,
}

impl Related<super::chart_ranking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChartRanking.def()
    }
}

impl Related<super::track::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Track.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
