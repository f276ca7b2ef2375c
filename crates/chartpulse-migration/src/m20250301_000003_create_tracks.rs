use sea_orm_migration::prelude::*;

use super::m20250301_000002_create_artists::Artists;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tracks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tracks::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tracks::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Tracks::CreditName).string_len(512).null())
                    .col(ColumnDef::new(Tracks::ArtistId).uuid().null())
                    .col(ColumnDef::new(Tracks::Isrc).string_len(12).null())
                    .col(
                        ColumnDef::new(Tracks::SoundchartsUuid)
                            .string_len(36)
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Tracks::DurationSecs).integer().null())
                    .col(ColumnDef::new(Tracks::ReleaseDate).date().null())
                    .col(ColumnDef::new(Tracks::ImageUrl).string_len(512).null())
                    .col(
                        ColumnDef::new(Tracks::MetadataRefreshedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tracks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Tracks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tracks_artist_id")
                            .from(Tracks::Table, Tracks::ArtistId)
                            .to(Artists::Table, Artists::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracks_artist_id")
                    .table(Tracks::Table)
                    .col(Tracks::ArtistId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracks_title")
                    .table(Tracks::Table)
                    .col(Tracks::Title)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracks_isrc")
                    .table(Tracks::Table)
                    .col(Tracks::Isrc)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tracks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Tracks {
    Table,
    Id,
    Title,
    CreditName,
    ArtistId,
    Isrc,
    SoundchartsUuid,
    DurationSecs,
    ReleaseDate,
    ImageUrl,
    MetadataRefreshedAt,
    CreatedAt,
    UpdatedAt,
}
