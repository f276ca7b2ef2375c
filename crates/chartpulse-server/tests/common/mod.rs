// Shared test utilities for integration tests
use chartpulse_connect::LocalSpool;
use chartpulse_db::AppState;
use std::sync::Arc;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-for-testing-only";

/// Create a test AppState with a mock database and a spool in a temp dir
pub fn test_app_state(db: sea_orm::DatabaseConnection, tmp_dir: &std::path::Path) -> Arc<AppState> {
    Arc::new(AppState {
        db,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        domain: "test.chartpulse.local".to_string(),
        spool: Arc::new(LocalSpool::new(tmp_dir)),
    })
}
