use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("CREATE TYPE chart_frequency AS ENUM ('daily', 'weekly', 'monthly')")
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Charts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Charts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Charts::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Charts::Slug)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Charts::Platform).string_len(64).not_null())
                    .col(ColumnDef::new(Charts::CountryCode).string_len(2).null())
                    .col(
                        ColumnDef::new(Charts::Frequency)
                            .custom(Alias::new("chart_frequency"))
                            .not_null()
                            .default("weekly"),
                    )
                    .col(
                        ColumnDef::new(Charts::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Charts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Charts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_charts_platform")
                    .table(Charts::Table)
                    .col(Charts::Platform)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Charts::Table).to_owned())
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS chart_frequency")
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Charts {
    Table,
    Id,
    Name,
    Slug,
    Platform,
    CountryCode,
    Frequency,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
