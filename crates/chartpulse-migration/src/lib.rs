pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_users;
mod m20250301_000002_create_artists;
mod m20250301_000003_create_tracks;
mod m20250301_000004_create_charts;
mod m20250301_000005_create_chart_rankings;
mod m20250301_000006_create_chart_ranking_entries;
mod m20250301_000007_create_sync_schedules;
mod m20250301_000008_create_sync_executions;
mod m20250301_000009_create_file_scans;
mod m20250301_000010_create_webhook_events;
mod m20250301_000011_create_service_settings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_users::Migration),
            Box::new(m20250301_000002_create_artists::Migration),
            Box::new(m20250301_000003_create_tracks::Migration),
            Box::new(m20250301_000004_create_charts::Migration),
            Box::new(m20250301_000005_create_chart_rankings::Migration),
            Box::new(m20250301_000006_create_chart_ranking_entries::Migration),
            Box::new(m20250301_000007_create_sync_schedules::Migration),
            Box::new(m20250301_000008_create_sync_executions::Migration),
            Box::new(m20250301_000009_create_file_scans::Migration),
            Box::new(m20250301_000010_create_webhook_events::Migration),
            Box::new(m20250301_000011_create_service_settings::Migration),
        ]
    }
}
