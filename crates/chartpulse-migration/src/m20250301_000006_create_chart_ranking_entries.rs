use sea_orm_migration::prelude::*;

use super::m20250301_000003_create_tracks::Tracks;
use super::m20250301_000005_create_chart_rankings::ChartRankings;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChartRankingEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChartRankingEntries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ChartRankingEntries::RankingId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChartRankingEntries::Position)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChartRankingEntries::TrackId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ChartRankingEntries::PreviousPosition)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ChartRankingEntries::PositionChange)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ChartRankingEntries::WeeksOnChart)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ChartRankingEntries::MetricValue)
                            .big_integer()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chart_ranking_entries_ranking_id")
                            .from(ChartRankingEntries::Table, ChartRankingEntries::RankingId)
                            .to(ChartRankings::Table, ChartRankings::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chart_ranking_entries_track_id")
                            .from(ChartRankingEntries::Table, ChartRankingEntries::TrackId)
                            .to(Tracks::Table, Tracks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_chart_ranking_entries_ranking_position")
                    .table(ChartRankingEntries::Table)
                    .col(ChartRankingEntries::RankingId)
                    .col(ChartRankingEntries::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Chart-history lookups walk from a track to all its entries
        manager
            .create_index(
                Index::create()
                    .name("idx_chart_ranking_entries_track_id")
                    .table(ChartRankingEntries::Table)
                    .col(ChartRankingEntries::TrackId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChartRankingEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ChartRankingEntries {
    Table,
    Id,
    RankingId,
    Position,
    TrackId,
    PreviousPosition,
    PositionChange,
    WeeksOnChart,
    MetricValue,
}
