use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::sync_worker::{self, ManualSyncError};
use chartpulse_db::entities::chart::ChartFrequency;
use chartpulse_db::entities::sync_execution::SyncStatus;
use chartpulse_db::entities::{
    artist, chart, chart_ranking, chart_ranking_entry, sync_execution, sync_schedule, track,
};
use chartpulse_db::AppState;

#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Provider chart slugs: lowercase alphanumerics and dashes.
static SLUG_RE: std::sync::LazyLock<regex::Regex> =
    std::sync::LazyLock::new(|| regex::Regex::new(r"^[a-z0-9][a-z0-9-]{1,127}$").unwrap());

// ─── Health ─────────────────────────────────────────────────────────

/// Maximum ranking age before a chart counts as stale. One missed
/// publication is tolerated before the label flips.
pub(crate) fn staleness_threshold_days(frequency: ChartFrequency) -> i64 {
    match frequency {
        ChartFrequency::Daily => 2,
        ChartFrequency::Weekly => 9,
        ChartFrequency::Monthly => 35,
    }
}

pub(crate) fn days_stale(today: NaiveDate, latest: Option<NaiveDate>) -> Option<i64> {
    latest.map(|d| (today - d).num_days())
}

/// Dashboard health label for one chart.
pub(crate) fn health_status(
    is_active: bool,
    has_enabled_schedule: bool,
    frequency: ChartFrequency,
    today: NaiveDate,
    latest: Option<NaiveDate>,
    last_outcome: Option<SyncStatus>,
) -> &'static str {
    if !is_active {
        return "disabled";
    }
    if !has_enabled_schedule {
        return "unscheduled";
    }
    if last_outcome == Some(SyncStatus::Failed) {
        return "failing";
    }
    match days_stale(today, latest) {
        Some(age) if age <= staleness_threshold_days(frequency) => "healthy",
        _ => "stale",
    }
}

// ─── Responses ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub platform: String,
    pub country_code: Option<String>,
    pub frequency: String,
    pub is_active: bool,
    pub health: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_ranking_date: Option<NaiveDate>,
    pub rankings_stored: u64,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl ChartResponse {
    pub fn from_model(
        c: chart::Model,
        health: &str,
        latest: Option<NaiveDate>,
        rankings_stored: u64,
    ) -> Self {
        Self {
            id: c.id,
            name: c.name,
            slug: c.slug,
            platform: c.platform,
            country_code: c.country_code,
            frequency: c.frequency.as_str().to_string(),
            is_active: c.is_active,
            health: health.to_string(),
            latest_ranking_date: latest,
            rankings_stored,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChartDetailResponse {
    #[serde(flatten)]
    pub chart: ChartResponse,
    pub schedule: Option<super::schedules::ScheduleResponse>,
    pub recent_executions: Vec<super::schedules::ExecutionResponse>,
}

#[derive(Debug, Serialize)]
pub struct RankingResponse {
    pub id: Uuid,
    pub chart_id: Uuid,
    pub ranking_date: NaiveDate,
    pub entry_count: i32,
    pub fetched_at: chrono::DateTime<chrono::FixedOffset>,
}

impl From<chart_ranking::Model> for RankingResponse {
    fn from(r: chart_ranking::Model) -> Self {
        Self {
            id: r.id,
            chart_id: r.chart_id,
            ranking_date: r.ranking_date,
            entry_count: r.entry_count,
            fetched_at: r.fetched_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RankingEntryResponse {
    pub position: i32,
    pub previous_position: Option<i32>,
    pub position_change: Option<i32>,
    pub weeks_on_chart: Option<i32>,
    pub metric_value: Option<i64>,
    pub track_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RankingDetailResponse {
    #[serde(flatten)]
    pub ranking: RankingResponse,
    pub entries: Vec<RankingEntryResponse>,
}

/// Per-chart rollup of what rankings are stored.
#[derive(Debug, FromQueryResult)]
struct RankingAggRow {
    chart_id: Uuid,
    latest: Option<NaiveDate>,
    stored: i64,
}

// ─── Read endpoints ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ChartListParams {
    pub platform: Option<String>,
    pub frequency: Option<String>,
    pub active: Option<bool>,
}

fn filtered_charts(
    params: &ChartListParams,
) -> Result<sea_orm::Select<chart::Entity>, (StatusCode, String)> {
    let mut query = chart::Entity::find();
    if let Some(platform) = params.platform.as_deref() {
        query = query.filter(chart::Column::Platform.eq(platform));
    }
    if let Some(raw) = params.frequency.as_deref() {
        let frequency = ChartFrequency::parse(raw)
            .ok_or((StatusCode::BAD_REQUEST, format!("Unknown frequency: {raw}")))?;
        query = query.filter(chart::Column::Frequency.eq(frequency));
    }
    if let Some(active) = params.active {
        query = query.filter(chart::Column::IsActive.eq(active));
    }
    Ok(query)
}

/// GET /api/charts
pub async fn list_charts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChartListParams>,
) -> Result<Json<Vec<ChartResponse>>, (StatusCode, String)> {
    let charts = filtered_charts(&params)?
        .order_by_asc(chart::Column::Name)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let agg: HashMap<Uuid, (Option<NaiveDate>, i64)> = chart_ranking::Entity::find()
        .select_only()
        .column(chart_ranking::Column::ChartId)
        .column_as(chart_ranking::Column::RankingDate.max(), "latest")
        .column_as(chart_ranking::Column::Id.count(), "stored")
        .group_by(chart_ranking::Column::ChartId)
        .into_model::<RankingAggRow>()
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .into_iter()
        .map(|r| (r.chart_id, (r.latest, r.stored)))
        .collect();

    let schedules: HashMap<Uuid, sync_schedule::Model> = sync_schedule::Entity::find()
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .into_iter()
        .map(|s| (s.chart_id, s))
        .collect();

    // Most recent finished outcome per chart
    let recent = sync_execution::Entity::find()
        .filter(sync_execution::Column::Status.ne(SyncStatus::Running))
        .order_by_desc(sync_execution::Column::StartedAt)
        .limit(200)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;
    let mut last_outcome: HashMap<Uuid, SyncStatus> = HashMap::new();
    for e in recent {
        last_outcome.entry(e.chart_id).or_insert(e.status);
    }

    let today = Utc::now().date_naive();
    let data = charts
        .into_iter()
        .map(|c| {
            let (latest, stored) = agg.get(&c.id).copied().unwrap_or((None, 0));
            let enabled = schedules.get(&c.id).map(|s| s.is_enabled).unwrap_or(false);
            let health = health_status(
                c.is_active,
                enabled,
                c.frequency,
                today,
                latest,
                last_outcome.get(&c.id).copied(),
            );
            ChartResponse::from_model(c, health, latest, stored.max(0) as u64)
        })
        .collect();

    Ok(Json(data))
}

async fn build_chart_response(
    db: &DatabaseConnection,
    chart_model: chart::Model,
) -> Result<ChartResponse, String> {
    let latest = chart_ranking::Entity::find()
        .filter(chart_ranking::Column::ChartId.eq(chart_model.id))
        .order_by_desc(chart_ranking::Column::RankingDate)
        .one(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?
        .map(|r| r.ranking_date);

    let stored = chart_ranking::Entity::find()
        .filter(chart_ranking::Column::ChartId.eq(chart_model.id))
        .count(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?;

    let schedule = sync_schedule::Entity::find()
        .filter(sync_schedule::Column::ChartId.eq(chart_model.id))
        .one(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?;

    let last_outcome = sync_execution::Entity::find()
        .filter(sync_execution::Column::ChartId.eq(chart_model.id))
        .filter(sync_execution::Column::Status.ne(SyncStatus::Running))
        .order_by_desc(sync_execution::Column::StartedAt)
        .one(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?
        .map(|e| e.status);

    let health = health_status(
        chart_model.is_active,
        schedule.map(|s| s.is_enabled).unwrap_or(false),
        chart_model.frequency,
        Utc::now().date_naive(),
        latest,
        last_outcome,
    );

    Ok(ChartResponse::from_model(chart_model, health, latest, stored))
}

/// GET /api/charts/:id
pub async fn get_chart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChartDetailResponse>, (StatusCode, String)> {
    let chart_model = chart::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Chart not found".to_string()))?;

    let chart_name = chart_model.name.clone();

    let schedule = sync_schedule::Entity::find()
        .filter(sync_schedule::Column::ChartId.eq(id))
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .map(|s| super::schedules::ScheduleResponse::from_model(s, None));

    let recent_executions = sync_execution::Entity::find()
        .filter(sync_execution::Column::ChartId.eq(id))
        .order_by_desc(sync_execution::Column::StartedAt)
        .limit(10)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .into_iter()
        .map(|e| super::schedules::ExecutionResponse::from_model(e, Some(chart_name.clone())))
        .collect();

    let chart = build_chart_response(&state.db, chart_model)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;

    Ok(Json(ChartDetailResponse {
        chart,
        schedule,
        recent_executions,
    }))
}

/// GET /api/charts/:id/rankings
pub async fn list_chart_rankings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<RankingResponse>>, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(30).min(100);

    chart::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Chart not found".to_string()))?;

    let paginator = chart_ranking::Entity::find()
        .filter(chart_ranking::Column::ChartId.eq(id))
        .order_by_desc(chart_ranking::Column::RankingDate)
        .paginate(&state.db, per_page);

    let total = paginator
        .num_items()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let rankings = paginator
        .fetch_page(page - 1)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    Ok(Json(PaginatedResponse {
        data: rankings.into_iter().map(RankingResponse::from).collect(),
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    }))
}

/// GET /api/charts/:id/rankings/:date — one snapshot with its entries
pub async fn get_chart_ranking(
    State(state): State<Arc<AppState>>,
    Path((id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<RankingDetailResponse>, (StatusCode, String)> {
    let ranking = chart_ranking::Entity::find()
        .filter(chart_ranking::Column::ChartId.eq(id))
        .filter(chart_ranking::Column::RankingDate.eq(date))
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((
            StatusCode::NOT_FOUND,
            "No ranking stored for this date".to_string(),
        ))?;

    let rows = chart_ranking_entry::Entity::find()
        .filter(chart_ranking_entry::Column::RankingId.eq(ranking.id))
        .order_by_asc(chart_ranking_entry::Column::Position)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    // Batch-fetch track and artist names
    let track_ids: Vec<Uuid> = rows
        .iter()
        .map(|e| e.track_id)
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    let tracks: HashMap<Uuid, track::Model> = if !track_ids.is_empty() {
        track::Entity::find()
            .filter(track::Column::Id.is_in(track_ids))
            .all(&state.db)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|t| (t.id, t))
            .collect()
    } else {
        HashMap::new()
    };

    let artist_ids: Vec<Uuid> = tracks
        .values()
        .filter_map(|t| t.artist_id)
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    let artists: HashMap<Uuid, String> = if !artist_ids.is_empty() {
        artist::Entity::find()
            .filter(artist::Column::Id.is_in(artist_ids))
            .all(&state.db)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|a| (a.id, a.name))
            .collect()
    } else {
        HashMap::new()
    };

    let entries = rows
        .into_iter()
        .map(|e| {
            let track = tracks.get(&e.track_id);
            RankingEntryResponse {
                position: e.position,
                previous_position: e.previous_position,
                position_change: e.position_change,
                weeks_on_chart: e.weeks_on_chart,
                metric_value: e.metric_value,
                track_id: e.track_id,
                title: track.map(|t| t.title.clone()).unwrap_or_default(),
                credit_name: track.and_then(|t| t.credit_name.clone()),
                artist_name: track
                    .and_then(|t| t.artist_id)
                    .and_then(|aid| artists.get(&aid).cloned()),
                image_url: track.and_then(|t| t.image_url.clone()),
            }
        })
        .collect();

    Ok(Json(RankingDetailResponse {
        ranking: ranking.into(),
        entries,
    }))
}

/// GET /api/charts/:id/executions
pub async fn list_chart_executions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<super::schedules::ExecutionResponse>>, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).min(100);

    let chart_model = chart::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Chart not found".to_string()))?;

    let paginator = sync_execution::Entity::find()
        .filter(sync_execution::Column::ChartId.eq(id))
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

    Ok(Json(PaginatedResponse {
        data: executions
            .into_iter()
            .map(|e| super::schedules::ExecutionResponse::from_model(e, Some(chart_model.name.clone())))
            .collect(),
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    }))
}

// ─── Admin endpoints ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateChartRequest {
    pub name: String,
    pub slug: String,
    pub platform: String,
    pub country_code: Option<String>,
    pub frequency: String,
}

/// POST /api/admin/charts
pub async fn create_chart(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateChartRequest>,
) -> Result<(StatusCode, Json<ChartResponse>), (StatusCode, Json<serde_json::Value>)> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Chart name is required" })),
        ));
    }
    if !SLUG_RE.is_match(&body.slug) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Invalid slug: lowercase letters, digits and dashes only"
            })),
        ));
    }
    let Some(frequency) = ChartFrequency::parse(&body.frequency) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Invalid frequency. Use 'daily', 'weekly' or 'monthly'"
            })),
        ));
    };

    let existing = chart::Entity::find()
        .filter(chart::Column::Slug.eq(&body.slug))
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
            Json(serde_json::json!({ "error": "A chart with this slug already exists" })),
        ));
    }

    let now = Utc::now();
    let created = chart::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        slug: Set(body.slug),
        platform: Set(body.platform.trim().to_lowercase()),
        country_code: Set(body
            .country_code
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())),
        frequency: Set(frequency),
        is_active: Set(true),
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

    tracing::info!(slug = %created.slug, "chart created");

    Ok((
        StatusCode::CREATED,
        Json(ChartResponse::from_model(created, "unscheduled", None, 0)),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateChartRequest {
    pub name: Option<String>,
    pub platform: Option<String>,
    pub country_code: Option<String>,
    pub frequency: Option<String>,
    pub is_active: Option<bool>,
}

/// PUT /api/admin/charts/:id — the slug is immutable once created
pub async fn update_chart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateChartRequest>,
) -> Result<Json<ChartResponse>, (StatusCode, Json<serde_json::Value>)> {
    let existing = chart::Entity::find_by_id(id)
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

    let frequency = match body.frequency.as_deref() {
        Some(raw) => Some(ChartFrequency::parse(raw).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "Invalid frequency. Use 'daily', 'weekly' or 'monthly'"
                })),
            )
        })?),
        None => None,
    };

    let mut update: chart::ActiveModel = existing.into();
    if let Some(name) = body.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
        update.name = Set(name);
    }
    if let Some(platform) = body.platform {
        update.platform = Set(platform.trim().to_lowercase());
    }
    if let Some(country_code) = body.country_code {
        let code = country_code.trim().to_uppercase();
        update.country_code = Set(if code.is_empty() { None } else { Some(code) });
    }
    if let Some(frequency) = frequency {
        update.frequency = Set(frequency);
    }
    if let Some(is_active) = body.is_active {
        update.is_active = Set(is_active);
    }
    update.updated_at = Set(Utc::now().into());

    let updated = update.update(&state.db).await.map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "Update failed" })),
        )
    })?;

    let response = build_chart_response(&state.db, updated).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e })),
        )
    })?;

    Ok(Json(response))
}

/// POST /api/admin/charts/:id/sync — queue a manual sync
pub async fn sync_chart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, Json<serde_json::Value>)> {
    match sync_worker::start_manual_sync(&state, id).await {
        Ok(execution_id) => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "execution_id": execution_id })),
        )),
        Err(ManualSyncError::ChartNotFound) => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Chart not found" })),
        )),
        Err(ManualSyncError::ChartDisabled) => Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "Chart is disabled" })),
        )),
        Err(ManualSyncError::AlreadyRunning) => Err((
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "A sync is already running for this chart" })),
        )),
        Err(ManualSyncError::Db(e)) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": format!("DB error: {e}") })),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_chart_model() -> chart::Model {
        chart::Model {
            id: Uuid::new_v4(),
            name: "Top 200 France".into(),
            slug: "spotify-top-200-fr".into(),
            platform: "spotify".into(),
            country_code: Some("FR".into()),
            frequency: ChartFrequency::Daily,
            is_active: true,
            created_at: Utc::now().fixed_offset(),
            updated_at: Utc::now().fixed_offset(),
        }
    }

    #[test]
    fn test_chart_list_filters_land_in_the_query() {
        use sea_orm::{DbBackend, QueryTrait};

        let params = ChartListParams {
            platform: Some("spotify".into()),
            frequency: Some("weekly".into()),
            active: Some(true),
        };
        let sql = filtered_charts(&params)
            .unwrap()
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains("'spotify'"), "{sql}");
        assert!(sql.contains("'weekly'"), "{sql}");
        assert!(sql.contains("is_active"), "{sql}");
    }

    #[test]
    fn test_chart_list_without_filters_has_no_where_clause() {
        use sea_orm::{DbBackend, QueryTrait};

        let sql = filtered_charts(&ChartListParams::default())
            .unwrap()
            .build(DbBackend::Postgres)
            .to_string();
        assert!(!sql.contains("WHERE"), "{sql}");
    }

    #[test]
    fn test_chart_list_rejects_unknown_frequency() {
        let params = ChartListParams {
            platform: None,
            frequency: Some("hourly".into()),
            active: None,
        };
        let err = filtered_charts(&params).unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_health_disabled_wins() {
        let today = date(2026, 3, 10);
        assert_eq!(
            health_status(false, true, ChartFrequency::Daily, today, Some(today), None),
            "disabled"
        );
    }

    #[test]
    fn test_health_unscheduled() {
        let today = date(2026, 3, 10);
        assert_eq!(
            health_status(true, false, ChartFrequency::Daily, today, Some(today), None),
            "unscheduled"
        );
    }

    #[test]
    fn test_health_failing_beats_stale() {
        let today = date(2026, 3, 10);
        assert_eq!(
            health_status(
                true,
                true,
                ChartFrequency::Daily,
                today,
                Some(date(2026, 2, 1)),
                Some(SyncStatus::Failed)
            ),
            "failing"
        );
    }

    #[test]
    fn test_health_healthy_within_threshold() {
        let today = date(2026, 3, 10);
        // one missed daily publication is still healthy
        assert_eq!(
            health_status(
                true,
                true,
                ChartFrequency::Daily,
                today,
                Some(date(2026, 3, 8)),
                Some(SyncStatus::Succeeded)
            ),
            "healthy"
        );
        // a weekly chart synced six days ago is fine
        assert_eq!(
            health_status(
                true,
                true,
                ChartFrequency::Weekly,
                today,
                Some(date(2026, 3, 4)),
                None
            ),
            "healthy"
        );
    }

    #[test]
    fn test_health_stale_past_threshold() {
        let today = date(2026, 3, 10);
        assert_eq!(
            health_status(
                true,
                true,
                ChartFrequency::Daily,
                today,
                Some(date(2026, 3, 7)),
                Some(SyncStatus::Succeeded)
            ),
            "stale"
        );
        // scheduled but never synced
        assert_eq!(
            health_status(true, true, ChartFrequency::Daily, today, None, None),
            "stale"
        );
    }

    #[test]
    fn test_staleness_thresholds_per_frequency() {
        assert_eq!(staleness_threshold_days(ChartFrequency::Daily), 2);
        assert_eq!(staleness_threshold_days(ChartFrequency::Weekly), 9);
        assert_eq!(staleness_threshold_days(ChartFrequency::Monthly), 35);
    }

    #[test]
    fn test_days_stale() {
        let today = date(2026, 3, 10);
        assert_eq!(days_stale(today, None), None);
        assert_eq!(days_stale(today, Some(today)), Some(0));
        assert_eq!(days_stale(today, Some(date(2026, 3, 1))), Some(9));
    }

    #[test]
    fn test_slug_pattern() {
        assert!(SLUG_RE.is_match("spotify-top-200-fr"));
        assert!(SLUG_RE.is_match("billboard-hot-100"));
        assert!(!SLUG_RE.is_match("Spotify-Top"));
        assert!(!SLUG_RE.is_match("top 200"));
        assert!(!SLUG_RE.is_match("-leading-dash"));
        assert!(!SLUG_RE.is_match(""));
        assert!(!SLUG_RE.is_match("a"));
    }

    #[test]
    fn test_chart_response_frequency_is_lowercase() {
        let model = make_chart_model();
        let resp = ChartResponse::from_model(model, "healthy", Some(date(2026, 3, 10)), 42);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["frequency"], "daily");
        assert_eq!(json["health"], "healthy");
        assert_eq!(json["rankings_stored"], 42);
        assert_eq!(json["latest_ranking_date"], "2026-03-10");
    }

    #[test]
    fn test_chart_response_omits_missing_latest_date() {
        let model = make_chart_model();
        let resp = ChartResponse::from_model(model, "unscheduled", None, 0);
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("latest_ranking_date").is_none());
    }
}
