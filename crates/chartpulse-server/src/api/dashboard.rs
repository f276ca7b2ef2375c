use axum::{extract::State, http::StatusCode, Json};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use chartpulse_db::entities::file_scan::{self, ScanState};
use chartpulse_db::entities::sync_execution::{self, SyncStatus};
use chartpulse_db::entities::{artist, chart, chart_ranking, track};
use chartpulse_db::AppState;

use super::schedules::{chart_names, ExecutionResponse};

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub total_charts: u64,
    pub active_charts: u64,
    pub total_tracks: u64,
    pub total_artists: u64,
    pub total_rankings: u64,
    pub rankings_last_7_days: u64,
    pub scans_pending: u64,
    pub scans_processing: u64,
    pub scans_ready: u64,
    pub scans_failed: u64,
    pub executions_24h_succeeded: u64,
    pub executions_24h_partial: u64,
    pub executions_24h_failed: u64,
    pub recent_executions: Vec<ExecutionResponse>,
    /// Callback URL to paste into the provider's console
    pub webhook_url: String,
}

/// GET /api/dashboard/overview
pub async fn overview(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OverviewResponse>, (StatusCode, String)> {
    let total_charts = chart::Entity::find()
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let active_charts = chart::Entity::find()
        .filter(chart::Column::IsActive.eq(true))
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let total_tracks = track::Entity::find()
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let total_artists = artist::Entity::find()
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let total_rankings = chart_ranking::Entity::find()
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let week_ago = chrono::Utc::now().date_naive() - chrono::Duration::days(7);
    let rankings_last_7_days = chart_ranking::Entity::find()
        .filter(chart_ranking::Column::RankingDate.gt(week_ago))
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let scans_pending = file_scan::Entity::find()
        .filter(file_scan::Column::State.eq(ScanState::Pending))
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let scans_processing = file_scan::Entity::find()
        .filter(file_scan::Column::State.is_in([ScanState::Uploading, ScanState::Processing]))
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let scans_ready = file_scan::Entity::find()
        .filter(file_scan::Column::State.eq(ScanState::Ready))
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let scans_failed = file_scan::Entity::find()
        .filter(file_scan::Column::State.eq(ScanState::Failed))
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    // One fetch for the 24h outcome breakdown, bucketed in memory
    let day_ago = chrono::Utc::now() - chrono::Duration::hours(24);
    let recent_finished = sync_execution::Entity::find()
        .filter(sync_execution::Column::StartedAt.gt(day_ago))
        .select_only()
        .column(sync_execution::Column::Status)
        .into_tuple::<SyncStatus>()
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let mut executions_24h_succeeded = 0u64;
    let mut executions_24h_partial = 0u64;
    let mut executions_24h_failed = 0u64;
    for status in recent_finished {
        match status {
            SyncStatus::Succeeded => executions_24h_succeeded += 1,
            SyncStatus::Partial => executions_24h_partial += 1,
            SyncStatus::Failed => executions_24h_failed += 1,
            SyncStatus::Running => {}
        }
    }

    let executions = sync_execution::Entity::find()
        .order_by_desc(sync_execution::Column::StartedAt)
        .limit(10)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let chart_ids: Vec<uuid::Uuid> = executions
        .iter()
        .map(|e| e.chart_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let names = chart_names(&state.db, chart_ids).await;

    let recent_executions = executions
        .into_iter()
        .map(|e| {
            let name = names.get(&e.chart_id).cloned();
            ExecutionResponse::from_model(e, name)
        })
        .collect();

    let webhook_url = {
        let scheme = std::env::var("CHARTPULSE_SCHEME").unwrap_or_else(|_| "https".to_string());
        format!(
            "{scheme}://{}/api/webhooks/acrcloud",
            state.domain.trim_end_matches('/')
        )
    };

    Ok(Json(OverviewResponse {
        total_charts,
        active_charts,
        total_tracks,
        total_artists,
        total_rankings,
        rankings_last_7_days,
        scans_pending,
        scans_processing,
        scans_ready,
        scans_failed,
        executions_24h_succeeded,
        executions_24h_partial,
        executions_24h_failed,
        recent_executions,
        webhook_url,
    }))
}
