use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::{credentials, sync_worker};
use chartpulse_connect::{SongDetail, SoundchartsClient};
use chartpulse_db::entities::{artist, chart, chart_ranking, chart_ranking_entry, track};
use chartpulse_db::AppState;

use super::charts::PaginatedResponse;

/// Metadata older than this is eligible for the batch refresh.
const STALE_METADATA_DAYS: i64 = 30;
const REFRESH_BATCH: u64 = 50;

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub id: Uuid,
    pub title: String,
    pub credit_name: Option<String>,
    pub artist_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    pub isrc: Option<String>,
    pub soundcharts_uuid: Option<String>,
    pub duration_secs: Option<i32>,
    pub release_date: Option<NaiveDate>,
    pub image_url: Option<String>,
    pub metadata_refreshed_at: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl From<track::Model> for TrackResponse {
    fn from(t: track::Model) -> Self {
        Self {
            id: t.id,
            title: t.title,
            credit_name: t.credit_name,
            artist_id: t.artist_id,
            artist_name: None,
            isrc: t.isrc,
            soundcharts_uuid: t.soundcharts_uuid,
            duration_secs: t.duration_secs,
            release_date: t.release_date,
            image_url: t.image_url,
            metadata_refreshed_at: t.metadata_refreshed_at,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrackDetailResponse {
    #[serde(flatten)]
    pub track: TrackResponse,
    pub chart_appearances: u64,
    pub best_position: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ChartHistoryPoint {
    pub chart_id: Uuid,
    pub chart_name: String,
    pub ranking_date: NaiveDate,
    pub position: i32,
    pub metric_value: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TrackListParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub search: Option<String>,
}

#[derive(Debug, FromQueryResult)]
struct MinPositionRow {
    best: Option<i32>,
}

/// GET /api/tracks
pub async fn list_tracks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrackListParams>,
) -> Result<Json<PaginatedResponse<TrackResponse>>, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).min(100);

    let mut query = track::Entity::find();
    if let Some(q) = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
    {
        query = query.filter(
            Condition::any()
                .add(track::Column::Title.contains(q))
                .add(track::Column::CreditName.contains(q))
                .add(track::Column::Isrc.eq(q)),
        );
    }

    let paginator = query
        .order_by_desc(track::Column::CreatedAt)
        .paginate(&state.db, per_page);

    let total = paginator
        .num_items()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let tracks = paginator
        .fetch_page(page - 1)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    // Batch-fetch artist names
    let artist_ids: Vec<Uuid> = tracks
        .iter()
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

    Ok(Json(PaginatedResponse {
        data: tracks
            .into_iter()
            .map(|t| {
                let mut resp = TrackResponse::from(t);
                resp.artist_name = resp.artist_id.and_then(|aid| artists.get(&aid).cloned());
                resp
            })
            .collect(),
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    }))
}

/// GET /api/tracks/:id
pub async fn get_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackDetailResponse>, (StatusCode, String)> {
    let track_model = track::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Track not found".to_string()))?;

    let artist_name = match track_model.artist_id {
        Some(aid) => artist::Entity::find_by_id(aid)
            .one(&state.db)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
            .map(|a| a.name),
        None => None,
    };

    let chart_appearances = chart_ranking_entry::Entity::find()
        .filter(chart_ranking_entry::Column::TrackId.eq(id))
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let best_position = chart_ranking_entry::Entity::find()
        .select_only()
        .column_as(chart_ranking_entry::Column::Position.min(), "best")
        .filter(chart_ranking_entry::Column::TrackId.eq(id))
        .into_model::<MinPositionRow>()
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .and_then(|r| r.best);

    let mut track = TrackResponse::from(track_model);
    track.artist_name = artist_name;

    Ok(Json(TrackDetailResponse {
        track,
        chart_appearances,
        best_position,
    }))
}

/// Newest appearances first; ties on one date ordered by chart name.
fn sort_history(points: &mut [ChartHistoryPoint]) {
    points.sort_by(|a, b| {
        b.ranking_date
            .cmp(&a.ranking_date)
            .then_with(|| a.chart_name.cmp(&b.chart_name))
    });
}

/// GET /api/tracks/:id/chart-history — every charted position, newest first
pub async fn track_chart_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChartHistoryPoint>>, (StatusCode, String)> {
    track::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Track not found".to_string()))?;

    let entries = chart_ranking_entry::Entity::find()
        .filter(chart_ranking_entry::Column::TrackId.eq(id))
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let ranking_ids: Vec<Uuid> = entries
        .iter()
        .map(|e| e.ranking_id)
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    let rankings: HashMap<Uuid, chart_ranking::Model> = if !ranking_ids.is_empty() {
        chart_ranking::Entity::find()
            .filter(chart_ranking::Column::Id.is_in(ranking_ids))
            .all(&state.db)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|r| (r.id, r))
            .collect()
    } else {
        HashMap::new()
    };

    let chart_ids: Vec<Uuid> = rankings
        .values()
        .map(|r| r.chart_id)
        .collect::<std::collections::HashSet<_>>()
        .into_iter()
        .collect();
    let charts: HashMap<Uuid, String> = if !chart_ids.is_empty() {
        chart::Entity::find()
            .filter(chart::Column::Id.is_in(chart_ids))
            .all(&state.db)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect()
    } else {
        HashMap::new()
    };

    let mut points: Vec<ChartHistoryPoint> = entries
        .into_iter()
        .filter_map(|e| {
            let ranking = rankings.get(&e.ranking_id)?;
            let chart_name = charts.get(&ranking.chart_id)?;
            Some(ChartHistoryPoint {
                chart_id: ranking.chart_id,
                chart_name: chart_name.clone(),
                ranking_date: ranking.ranking_date,
                position: e.position,
                metric_value: e.metric_value,
            })
        })
        .collect();

    sort_history(&mut points);

    Ok(Json(points))
}

/// Date strings from the provider are either plain or full ISO timestamps.
pub(crate) fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

/// Overwrite a track's metadata from a provider song detail. Unlike the
/// fill-only-empty updates during chart sync, a refresh replaces what is
/// there.
pub(crate) async fn apply_song_detail(
    db: &DatabaseConnection,
    track_model: track::Model,
    song: &SongDetail,
) -> Result<track::Model, String> {
    let had_artist = track_model.artist_id.is_some();
    let mut update: track::ActiveModel = track_model.into();

    update.title = Set(song.name.clone());
    if song.credit_name.is_some() {
        update.credit_name = Set(song.credit_name.clone());
    }
    if song.isrc.is_some() {
        update.isrc = Set(song.isrc.clone());
    }
    if song.duration.is_some() {
        update.duration_secs = Set(song.duration);
    }
    if let Some(date) = song.release_date.as_deref().and_then(parse_release_date) {
        update.release_date = Set(Some(date));
    }
    if song.image_url.is_some() {
        update.image_url = Set(song.image_url.clone());
    }
    if !had_artist {
        if let Some(first) = song.artists.first() {
            let artist_id = sync_worker::find_or_create_artist(db, first).await?;
            update.artist_id = Set(Some(artist_id));
        }
    }
    update.metadata_refreshed_at = Set(Some(Utc::now().into()));
    update.updated_at = Set(Utc::now().into());

    update.update(db).await.map_err(|e| format!("DB error: {e}"))
}

/// POST /api/tracks/:id/refresh
pub async fn refresh_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackResponse>, (StatusCode, String)> {
    let track_model = track::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Track not found".to_string()))?;

    let Some(sc_uuid) = track_model.soundcharts_uuid.clone() else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Track has no chart provider id".to_string(),
        ));
    };

    let Some(config) = credentials::soundcharts_config(&state).await else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Chart provider credentials not configured".to_string(),
        ));
    };
    let client = SoundchartsClient::new(config)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let song = client
        .get_song(&sc_uuid)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("Chart provider error: {e}")))?;

    let updated = apply_song_detail(&state.db, track_model, &song)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;

    let artist_name = match updated.artist_id {
        Some(aid) => artist::Entity::find_by_id(aid)
            .one(&state.db)
            .await
            .ok()
            .flatten()
            .map(|a| a.name),
        None => None,
    };

    let mut resp = TrackResponse::from(updated);
    resp.artist_name = artist_name;
    Ok(Json(resp))
}

/// POST /api/admin/tracks/refresh-stale — queue a metadata refresh for
/// tracks whose provider metadata is missing or old.
pub async fn refresh_stale_tracks(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, Json<serde_json::Value>)> {
    let cutoff = Utc::now() - chrono::Duration::days(STALE_METADATA_DAYS);

    let stale = track::Entity::find()
        .filter(track::Column::SoundchartsUuid.is_not_null())
        .filter(
            Condition::any()
                .add(track::Column::MetadataRefreshedAt.is_null())
                .add(track::Column::MetadataRefreshedAt.lt(cutoff)),
        )
        .order_by_asc(track::Column::UpdatedAt)
        .limit(REFRESH_BATCH)
        .all(&state.db)
        .await
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "DB error" })),
            )
        })?;

    let queued = stale.len();
    if queued > 0 {
        let state = state.clone();
        tokio::spawn(async move {
            let Some(config) = credentials::soundcharts_config(&state).await else {
                tracing::warn!("metadata refresh skipped: provider credentials not configured");
                return;
            };
            let client = match SoundchartsClient::new(config) {
                Ok(client) => client,
                Err(e) => {
                    tracing::error!("metadata refresh client setup failed: {e}");
                    return;
                }
            };

            let mut refreshed = 0u32;
            let mut failed = 0u32;
            for track_model in stale {
                tokio::time::sleep(std::time::Duration::from_millis(
                    sync_worker::SC_RATE_LIMIT_MS,
                ))
                .await;

                let Some(sc_uuid) = track_model.soundcharts_uuid.clone() else {
                    continue;
                };
                match client.get_song(&sc_uuid).await {
                    Ok(song) => match apply_song_detail(&state.db, track_model, &song).await {
                        Ok(_) => refreshed += 1,
                        Err(e) => {
                            failed += 1;
                            tracing::warn!("metadata refresh store failed: {e}");
                        }
                    },
                    Err(e) => {
                        failed += 1;
                        tracing::warn!("metadata refresh fetch failed: {e}");
                    }
                }
            }
            tracing::info!(refreshed, failed, "stale metadata refresh finished");
        });
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "queued": queued })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_point(chart_name: &str, y: i32, m: u32, d: u32) -> ChartHistoryPoint {
        ChartHistoryPoint {
            chart_id: Uuid::new_v4(),
            chart_name: chart_name.into(),
            ranking_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            position: 1,
            metric_value: None,
        }
    }

    #[test]
    fn test_chart_history_newest_first() {
        let mut points = vec![
            history_point("Top 200 France", 2026, 1, 5),
            history_point("Top 200 France", 2026, 1, 19),
            history_point("Top 200 France", 2026, 1, 12),
        ];
        sort_history(&mut points);
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.ranking_date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2026, 1, 19).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            ]
        );
    }

    #[test]
    fn test_chart_history_same_date_ordered_by_chart_name() {
        let mut points = vec![
            history_point("Shazam Top", 2026, 1, 5),
            history_point("Apple Music Top 100", 2026, 1, 5),
        ];
        sort_history(&mut points);
        assert_eq!(points[0].chart_name, "Apple Music Top 100");
        assert_eq!(points[1].chart_name, "Shazam Top");
    }

    fn make_track_model() -> track::Model {
        track::Model {
            id: Uuid::new_v4(),
            title: "Midnight Run".into(),
            credit_name: Some("Ada Lane feat. Kito".into()),
            artist_id: Some(Uuid::new_v4()),
            isrc: Some("USUM72001234".into()),
            soundcharts_uuid: Some("11e81bcc-9c1c-ce38-b96b-a0369fe50396".into()),
            duration_secs: Some(214),
            release_date: NaiveDate::from_ymd_opt(2025, 11, 7),
            image_url: None,
            metadata_refreshed_at: None,
            created_at: Utc::now().fixed_offset(),
            updated_at: Utc::now().fixed_offset(),
        }
    }

    #[test]
    fn test_parse_release_date_plain() {
        assert_eq!(
            parse_release_date("2025-11-07"),
            NaiveDate::from_ymd_opt(2025, 11, 7)
        );
    }

    #[test]
    fn test_parse_release_date_iso_timestamp() {
        assert_eq!(
            parse_release_date("2025-11-07T00:00:00+00:00"),
            NaiveDate::from_ymd_opt(2025, 11, 7)
        );
    }

    #[test]
    fn test_parse_release_date_garbage() {
        assert_eq!(parse_release_date("next friday"), None);
        assert_eq!(parse_release_date(""), None);
        assert_eq!(parse_release_date("2025-13-40"), None);
    }

    #[test]
    fn test_track_response_from_model() {
        let model = make_track_model();
        let id = model.id;
        let resp = TrackResponse::from(model);
        assert_eq!(resp.id, id);
        assert_eq!(resp.title, "Midnight Run");
        assert!(resp.artist_name.is_none());
    }

    #[test]
    fn test_track_response_serialization_omits_empty_artist_name() {
        let resp = TrackResponse::from(make_track_model());
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("artist_name").is_none());
        assert_eq!(json["isrc"], "USUM72001234");
        assert_eq!(json["release_date"], "2025-11-07");
    }
}
