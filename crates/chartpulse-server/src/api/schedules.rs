use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::sync_worker;
use chartpulse_db::entities::sync_execution::SyncStatus;
use chartpulse_db::entities::{chart, sync_execution, sync_schedule};
use chartpulse_db::AppState;

use super::charts::PaginatedResponse;

// ─── Responses ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub id: Uuid,
    pub chart_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_name: Option<String>,
    pub is_enabled: bool,
    pub lookback_days: i32,
    pub last_synced_date: Option<NaiveDate>,
    pub last_run_at: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl ScheduleResponse {
    pub fn from_model(s: sync_schedule::Model, chart_name: Option<String>) -> Self {
        Self {
            id: s.id,
            chart_id: s.chart_id,
            chart_name,
            is_enabled: s.is_enabled,
            lookback_days: s.lookback_days,
            last_synced_date: s.last_synced_date,
            last_run_at: s.last_run_at,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    pub id: Uuid,
    pub schedule_id: Option<Uuid>,
    pub chart_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_name: Option<String>,
    pub trigger: String,
    pub status: String,
    pub started_at: chrono::DateTime<chrono::FixedOffset>,
    pub finished_at: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub missing_dates: i32,
    pub rankings_fetched: i32,
    pub entries_upserted: i32,
    pub tracks_created: i32,
    pub error: Option<String>,
}

impl ExecutionResponse {
    pub fn from_model(e: sync_execution::Model, chart_name: Option<String>) -> Self {
        Self {
            id: e.id,
            schedule_id: e.schedule_id,
            chart_id: e.chart_id,
            chart_name,
            trigger: e.trigger.as_str().to_string(),
            status: e.status.as_str().to_string(),
            started_at: e.started_at,
            finished_at: e.finished_at,
            missing_dates: e.missing_dates,
            rankings_fetched: e.rankings_fetched,
            entries_upserted: e.entries_upserted,
            tracks_created: e.tracks_created,
            error: e.error,
        }
    }
}

pub(crate) async fn chart_names(
    db: &sea_orm::DatabaseConnection,
    ids: Vec<Uuid>,
) -> HashMap<Uuid, String> {
    if ids.is_empty() {
        return HashMap::new();
    }
    chart::Entity::find()
        .filter(chart::Column::Id.is_in(ids))
        .all(db)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect()
}

// ─── Read endpoints ─────────────────────────────────────────────────

/// GET /api/schedules
pub async fn list_schedules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ScheduleResponse>>, (StatusCode, String)> {
    let schedules = sync_schedule::Entity::find()
        .order_by_asc(sync_schedule::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let ids: Vec<Uuid> = schedules.iter().map(|s| s.chart_id).collect();
    let names = chart_names(&state.db, ids).await;

    Ok(Json(
        schedules
            .into_iter()
            .map(|s| {
                let name = names.get(&s.chart_id).cloned();
                ScheduleResponse::from_model(s, name)
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ExecutionListParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<String>,
    pub chart_id: Option<Uuid>,
}

/// GET /api/admin/executions
pub async fn list_executions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExecutionListParams>,
) -> Result<Json<PaginatedResponse<ExecutionResponse>>, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(25).min(100);

    let mut query = sync_execution::Entity::find();
    if let Some(raw) = params.status.as_deref() {
        let status = match raw {
            "running" => SyncStatus::Running,
            "succeeded" => SyncStatus::Succeeded,
            "partial" => SyncStatus::Partial,
            "failed" => SyncStatus::Failed,
            _ => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "Invalid status filter".to_string(),
                ))
            }
        };
        query = query.filter(sync_execution::Column::Status.eq(status));
    }
    if let Some(chart_id) = params.chart_id {
        query = query.filter(sync_execution::Column::ChartId.eq(chart_id));
    }

    let paginator = query
        .order_by_desc(sync_execution::Column::StartedAt)
        .paginate(&state.db, per_page);

    let total = paginator
        .num_items()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let executions = paginator
        .fetch_page(page - 1)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let ids: Vec<Uuid> = executions
        .iter()
        .map(|e| e.chart_id)
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    let names = chart_names(&state.db, ids).await;

    Ok(Json(PaginatedResponse {
        data: executions
            .into_iter()
            .map(|e| {
                let name = names.get(&e.chart_id).cloned();
                ExecutionResponse::from_model(e, name)
            })
            .collect(),
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    }))
}

// ─── Admin endpoints ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub chart_id: Uuid,
    pub lookback_days: Option<i32>,
    pub is_enabled: Option<bool>,
}

/// POST /api/admin/schedules
pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleResponse>), (StatusCode, Json<serde_json::Value>)> {
    let chart_model = chart::Entity::find_by_id(body.chart_id)
        .one(&state.db)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "DB error" })),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "Chart not found" })),
            )
        })?;

    let existing = sync_schedule::Entity::find()
        .filter(sync_schedule::Column::ChartId.eq(body.chart_id))
        .one(&state.db)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "DB error" })),
            )
        })?;
    if existing.is_some() {
        return Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "Chart already has a schedule" })),
        ));
    }

    let now = Utc::now();
    let created = sync_schedule::ActiveModel {
        id: Set(Uuid::new_v4()),
        chart_id: Set(body.chart_id),
        is_enabled: Set(body.is_enabled.unwrap_or(true)),
        lookback_days: Set(sync_worker::clamp_lookback(body.lookback_days.unwrap_or(30))),
        last_synced_date: Set(None),
        last_run_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.db)
    .await
    .map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Insert failed" })),
        )
    })?;

    tracing::info!(chart = %chart_model.slug, "sync schedule created");

    Ok((
        StatusCode::CREATED,
        Json(ScheduleResponse::from_model(created, Some(chart_model.name))),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleRequest {
    pub is_enabled: Option<bool>,
    pub lookback_days: Option<i32>,
}

/// PUT /api/admin/schedules/:id
pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateScheduleRequest>,
) -> Result<Json<ScheduleResponse>, (StatusCode, Json<serde_json::Value>)> {
    let existing = sync_schedule::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "DB error" })),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "Schedule not found" })),
            )
        })?;

    let mut update: sync_schedule::ActiveModel = existing.into();
    if let Some(is_enabled) = body.is_enabled {
        update.is_enabled = Set(is_enabled);
    }
    if let Some(lookback_days) = body.lookback_days {
        update.lookback_days = Set(sync_worker::clamp_lookback(lookback_days));
    }
    update.updated_at = Set(Utc::now().into());

    let updated = update.update(&state.db).await.map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Update failed" })),
        )
    })?;

    let name = chart::Entity::find_by_id(updated.chart_id)
        .one(&state.db)
        .await
        .ok()
        .flatten()
        .map(|c| c.name);

    Ok(Json(ScheduleResponse::from_model(updated, name)))
}

/// DELETE /api/admin/schedules/:id — past executions keep their history
pub async fn delete_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    let result = sync_schedule::Entity::delete_by_id(id)
        .exec(&state.db)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Delete failed" })),
            )
        })?;

    if result.rows_affected == 0 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Schedule not found" })),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/sync/run — wake the worker for a full pass
pub async fn run_sync_pass_now() -> (StatusCode, Json<serde_json::Value>) {
    sync_worker::trigger_sync_pass();
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "sync pass started" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartpulse_db::entities::sync_execution::SyncTrigger;

    fn make_execution_model() -> sync_execution::Model {
        sync_execution::Model {
            id: Uuid::new_v4(),
            schedule_id: Some(Uuid::new_v4()),
            chart_id: Uuid::new_v4(),
            trigger: SyncTrigger::Scheduled,
            status: SyncStatus::Partial,
            started_at: Utc::now().fixed_offset(),
            finished_at: Some(Utc::now().fixed_offset()),
            missing_dates: 5,
            rankings_fetched: 3,
            entries_upserted: 600,
            tracks_created: 12,
            error: Some("2026-03-08: timeout".into()),
        }
    }

    #[test]
    fn test_execution_response_uses_wire_names() {
        let resp = ExecutionResponse::from_model(make_execution_model(), Some("Top 200".into()));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["trigger"], "scheduled");
        assert_eq!(json["status"], "partial");
        assert_eq!(json["chart_name"], "Top 200");
        assert_eq!(json["rankings_fetched"], 3);
    }

    #[test]
    fn test_execution_response_omits_missing_chart_name() {
        let resp = ExecutionResponse::from_model(make_execution_model(), None);
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("chart_name").is_none());
    }

    #[test]
    fn test_schedule_response_from_model() {
        let model = sync_schedule::Model {
            id: Uuid::new_v4(),
            chart_id: Uuid::new_v4(),
            is_enabled: true,
            lookback_days: 30,
            last_synced_date: NaiveDate::from_ymd_opt(2026, 3, 9),
            last_run_at: None,
            created_at: Utc::now().fixed_offset(),
            updated_at: Utc::now().fixed_offset(),
        };
        let resp = ScheduleResponse::from_model(model, None);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["lookback_days"], 30);
        assert_eq!(json["last_synced_date"], "2026-03-09");
        assert_eq!(json["is_enabled"], true);
    }
}
