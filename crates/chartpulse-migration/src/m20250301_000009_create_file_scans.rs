use sea_orm_migration::prelude::*;

use super::m20250301_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE TYPE scan_state AS ENUM ('pending', 'uploading', 'processing', 'ready', 'failed')",
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FileScans::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FileScans::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FileScans::OriginalFilename)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FileScans::SpoolPath)
                            .string_len(1024)
                            .not_null(),
                    )
                    .col(ColumnDef::new(FileScans::FileSize).big_integer().not_null())
                    .col(
                        ColumnDef::new(FileScans::ContentSha256)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FileScans::State)
                            .custom(Alias::new("scan_state"))
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(FileScans::AcrFileId).string_len(64).null())
                    .col(ColumnDef::new(FileScans::Results).json_binary().null())
                    .col(ColumnDef::new(FileScans::MusicMatches).integer().null())
                    .col(ColumnDef::new(FileScans::CoverMatches).integer().null())
                    .col(
                        ColumnDef::new(FileScans::DetectedTitle)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(FileScans::DetectedArtist)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(FileScans::DetectedIsrc)
                            .string_len(12)
                            .null(),
                    )
                    .col(ColumnDef::new(FileScans::MatchScore).small_integer().null())
                    .col(ColumnDef::new(FileScans::Error).text().null())
                    .col(ColumnDef::new(FileScans::UploadedBy).uuid().null())
                    .col(
                        ColumnDef::new(FileScans::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(FileScans::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(FileScans::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_file_scans_uploaded_by")
                            .from(FileScans::Table, FileScans::UploadedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // The scan worker polls by state; the upload handler dedups by hash
        manager
            .create_index(
                Index::create()
                    .name("idx_file_scans_state")
                    .table(FileScans::Table)
                    .col(FileScans::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_file_scans_content_sha256")
                    .table(FileScans::Table)
                    .col(FileScans::ContentSha256)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_file_scans_acr_file_id")
                    .table(FileScans::Table)
                    .col(FileScans::AcrFileId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FileScans::Table).to_owned())
            .await?;

        manager
            .get_connection()
            .execute_unprepared("DROP TYPE IF EXISTS scan_state")
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum FileScans {
    Table,
    Id,
    OriginalFilename,
    SpoolPath,
    FileSize,
    ContentSha256,
    State,
    AcrFileId,
    Results,
    MusicMatches,
    CoverMatches,
    DetectedTitle,
    DetectedArtist,
    DetectedIsrc,
    MatchScore,
    Error,
    UploadedBy,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}
