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
                    .table(SyncSchedules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncSchedules::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyncSchedules::ChartId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(SyncSchedules::IsEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(SyncSchedules::LookbackDays)
                            .integer()
                            .not_null()
                            .default(30),
                    )
                    .col(ColumnDef::new(SyncSchedules::LastSyncedDate).date().null())
                    .col(
                        ColumnDef::new(SyncSchedules::LastRunAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncSchedules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SyncSchedules::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sync_schedules_chart_id")
                            .from(SyncSchedules::Table, SyncSchedules::ChartId)
                            .to(Charts::Table, Charts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncSchedules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum SyncSchedules {
    Table,
    Id,
    ChartId,
    IsEnabled,
    LookbackDays,
    LastSyncedDate,
    LastRunAt,
    CreatedAt,
    UpdatedAt,
}
