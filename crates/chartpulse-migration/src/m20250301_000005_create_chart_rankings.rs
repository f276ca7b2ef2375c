use sea_orm_migration::prelude::*;

use super::m20250301_000004_create_charts::Charts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChartRankings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChartRankings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChartRankings::ChartId).uuid().not_null())
                    .col(ColumnDef::new(ChartRankings::RankingDate).date().not_null())
                    .col(
                        ColumnDef::new(ChartRankings::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ChartRankings::EntryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chart_rankings_chart_id")
                            .from(ChartRankings::Table, ChartRankings::ChartId)
                            .to(Charts::Table, Charts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One snapshot per chart per date; sync passes rely on this to
        // stay idempotent
        manager
            .create_index(
                Index::create()
                    .name("idx_chart_rankings_chart_date")
                    .table(ChartRankings::Table)
                    .col(ChartRankings::ChartId)
                    .col(ChartRankings::RankingDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChartRankings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ChartRankings {
    Table,
    Id,
    ChartId,
    RankingDate,
    FetchedAt,
    EntryCount,
}
