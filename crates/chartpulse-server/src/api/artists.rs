use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::credentials;
use chartpulse_connect::SoundchartsClient;
use chartpulse_db::entities::{artist, track};
use chartpulse_db::AppState;

use super::charts::PaginatedResponse;
use super::tracks::TrackResponse;

#[derive(Debug, Serialize)]
pub struct ArtistResponse {
    pub id: Uuid,
    pub name: String,
    pub soundcharts_uuid: Option<String>,
    pub image_url: Option<String>,
    pub country_code: Option<String>,
    pub spotify_followers: Option<i64>,
    pub monthly_listeners: Option<i64>,
    pub audience_refreshed_at: Option<chrono::DateTime<chrono::FixedOffset>>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl From<artist::Model> for ArtistResponse {
    fn from(a: artist::Model) -> Self {
        Self {
            id: a.id,
            name: a.name,
            soundcharts_uuid: a.soundcharts_uuid,
            image_url: a.image_url,
            country_code: a.country_code,
            spotify_followers: a.spotify_followers,
            monthly_listeners: a.monthly_listeners,
            audience_refreshed_at: a.audience_refreshed_at,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArtistDetailResponse {
    #[serde(flatten)]
    pub artist: ArtistResponse,
    pub track_count: u64,
    pub tracks: Vec<TrackResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistListParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub search: Option<String>,
}

/// GET /api/artists
pub async fn list_artists(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArtistListParams>,
) -> Result<Json<PaginatedResponse<ArtistResponse>>, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).min(100);

    let mut query = artist::Entity::find();
    if let Some(q) = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
    {
        query = query.filter(artist::Column::Name.contains(q));
    }

    let paginator = query
        .order_by_asc(artist::Column::Name)
        .paginate(&state.db, per_page);

    let total = paginator
        .num_items()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let artists = paginator
        .fetch_page(page - 1)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    Ok(Json(PaginatedResponse {
        data: artists.into_iter().map(ArtistResponse::from).collect(),
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    }))
}

/// GET /api/artists/:id
pub async fn get_artist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ArtistDetailResponse>, (StatusCode, String)> {
    let artist_model = artist::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Artist not found".to_string()))?;

    let track_count = track::Entity::find()
        .filter(track::Column::ArtistId.eq(id))
        .count(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let artist_name = artist_model.name.clone();
    let tracks = track::Entity::find()
        .filter(track::Column::ArtistId.eq(id))
        .order_by_desc(track::Column::CreatedAt)
        .limit(50)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .into_iter()
        .map(|t| {
            let mut resp = TrackResponse::from(t);
            resp.artist_name = Some(artist_name.clone());
            resp
        })
        .collect();

    Ok(Json(ArtistDetailResponse {
        artist: ArtistResponse::from(artist_model),
        track_count,
        tracks,
    }))
}

/// POST /api/artists/:id/refresh-audience
///
/// Pulls current profile metadata plus the latest Spotify audience numbers.
pub async fn refresh_artist_audience(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ArtistResponse>, (StatusCode, String)> {
    let artist_model = artist::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Artist not found".to_string()))?;

    let Some(sc_uuid) = artist_model.soundcharts_uuid.clone() else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Artist has no chart provider id".to_string(),
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

    let detail = client
        .get_artist(&sc_uuid)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("Chart provider error: {e}")))?;

    let audience = client
        .get_artist_audience(&sc_uuid, "spotify")
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("Chart provider error: {e}")))?;

    let mut update: artist::ActiveModel = artist_model.into();
    update.name = Set(detail.name);
    if detail.image_url.is_some() {
        update.image_url = Set(detail.image_url);
    }
    if detail.country_code.is_some() {
        update.country_code = Set(detail.country_code);
    }
    // Points come newest first; take the first one carrying any numbers.
    if let Some(point) = audience
        .iter()
        .find(|p| p.follower_count.is_some() || p.monthly_listeners.is_some())
    {
        if point.follower_count.is_some() {
            update.spotify_followers = Set(point.follower_count);
        }
        if point.monthly_listeners.is_some() {
            update.monthly_listeners = Set(point.monthly_listeners);
        }
    }
    update.audience_refreshed_at = Set(Some(chrono::Utc::now().into()));
    update.updated_at = Set(chrono::Utc::now().into());

    let updated = update
        .update(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    Ok(Json(ArtistResponse::from(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_artist_response_from_model() {
        let model = artist::Model {
            id: Uuid::new_v4(),
            name: "Ada Lane".into(),
            soundcharts_uuid: Some("11e81bcc-9c1c-ce38-b96b-a0369fe50396".into()),
            image_url: None,
            country_code: Some("US".into()),
            spotify_followers: Some(1_250_000),
            monthly_listeners: None,
            audience_refreshed_at: None,
            created_at: Utc::now().fixed_offset(),
            updated_at: Utc::now().fixed_offset(),
        };
        let id = model.id;
        let resp = ArtistResponse::from(model);
        assert_eq!(resp.id, id);
        assert_eq!(resp.name, "Ada Lane");
        assert_eq!(resp.spotify_followers, Some(1_250_000));
        assert_eq!(resp.monthly_listeners, None);
    }
}
