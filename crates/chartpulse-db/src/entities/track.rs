use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    /// Display credit as the chart provider prints it ("Artist feat. Other")
    pub credit_name: Option<String>,
    pub artist_id: Option<Uuid>,
    pub isrc: Option<String>,
    #[sea_orm(unique)]
    pub soundcharts_uuid: Option<String>,
    pub duration_secs: Option<i32>,
    pub release_date: Option<Date>,
    pub image_url: Option<String>,
    pub metadata_refreshed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::artist::Entity",
        from = "Column::ArtistId",
        to = "super::artist::Column::Id"
    )]
    Artist,
    #[sea_orm(has_many = "super::chart_ranking_entry::Entity")]
    ChartRankingEntry,
}

impl Related<super::artist::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Artist.def()
    }
}

impl Related<super::chart_ranking_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChartRankingEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
