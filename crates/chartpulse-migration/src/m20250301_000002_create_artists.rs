use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Artists::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Artists::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Artists::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Artists::SoundchartsUuid)
                            .string_len(36)
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Artists::ImageUrl).string_len(512).null())
                    .col(ColumnDef::new(Artists::CountryCode).string_len(2).null())
                    .col(ColumnDef::new(Artists::SpotifyFollowers).big_integer().null())
                    .col(ColumnDef::new(Artists::MonthlyListeners).big_integer().null())
                    .col(
                        ColumnDef::new(Artists::AudienceRefreshedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Artists::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Artists::UpdatedAt)
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
                    .name("idx_artists_name")
                    .table(Artists::Table)
                    .col(Artists::Name)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Artists::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Artists {
    Table,
    Id,
    Name,
    SoundchartsUuid,
    ImageUrl,
    CountryCode,
    SpotifyFollowers,
    MonthlyListeners,
    AudienceRefreshedAt,
    CreatedAt,
    UpdatedAt,
}
