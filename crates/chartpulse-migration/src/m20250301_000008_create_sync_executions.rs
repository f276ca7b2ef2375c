use sea_orm_migration::prelude::*;

use super::m20250301_000004_create_charts::Charts;
use super::m20250301_000007_create_sync_schedules::SyncSchedules;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE TYPE sync_trigger AS ENUM ('scheduled', 'manual')")
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "CREATE TYPE sync_status AS ENUM ('running', 'succeeded', 'partial', 'failed')",
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SyncExecutions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncExecutions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncExecutions::ScheduleId).uuid().null())
                    .col(ColumnDef::new(SyncExecutions::ChartId).uuid().not_null())
                    .col(
                        ColumnDef::new(SyncExecutions::Trigger)
                            .custom(Alias::new("sync_trigger"))
                            .not_null()
                            .default("scheduled"),
                    )
                    .col(
                        ColumnDef::new(SyncExecutions::Status)
                            .custom(Alias::new("sync_status"))
                            .not_null()
                            .default("running"),
                    )
                    .col(
                        ColumnDef::new(SyncExecutions::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SyncExecutions::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncExecutions::MissingDates)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncExecutions::RankingsFetched)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncExecutions::EntriesUpserted)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncExecutions::TracksCreated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncExecutions::Error).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sync_executions_schedule_id")
                            .from(SyncExecutions::Table, SyncExecutions::ScheduleId)
                            .to(SyncSchedules::Table, SyncSchedules::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sync_executions_chart_id")
                            .from(SyncExecutions::Table, SyncExecutions::ChartId)
                            .to(Charts::Table, Charts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_executions_chart_started")
                    .table(SyncExecutions::Table)
                    .col(SyncExecutions::ChartId)
                    .col(SyncExecutions::StartedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_executions_status")
                    .table(SyncExecutions::Table)
                    .col(SyncExecutions::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncExecutions::Table).to_owned())
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS sync_status")
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS sync_trigger")
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum SyncExecutions {
    Table,
    Id,
    ScheduleId,
    ChartId,
    Trigger,
    Status,
    StartedAt,
    FinishedAt,
    MissingDates,
    RankingsFetched,
    EntriesUpserted,
    TracksCreated,
    Error,
}
