//! Inbound provider callbacks.
//!
//! Every delivery is stored as a `webhook_event` row before any processing,
//! including ones that fail signature verification, so operators can audit
//! and replay them.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::credentials;
use crate::scan_worker;
use chartpulse_connect::verify_webhook_signature;
use chartpulse_db::entities::{file_scan, webhook_event};
use chartpulse_db::AppState;

use super::charts::PaginatedResponse;

const SIGNATURE_HEADER: &str = "x-acrcloud-signature";

/// The provider's file callbacks carry the container file id as either
/// `file_id` or `id`, as a string or a number.
pub(crate) fn extract_file_id(payload: &Value) -> Option<String> {
    for key in ["file_id", "id"] {
        match payload.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

pub(crate) fn extract_event_type(payload: &Value) -> String {
    match payload.get("state").and_then(Value::as_i64) {
        Some(state) => format!("file_state_{state}"),
        None => "unknown".to_string(),
    }
}

async fn store_event(
    state: &AppState,
    payload: Value,
    signature_valid: bool,
) -> Result<webhook_event::Model, sea_orm::DbErr> {
    webhook_event::ActiveModel {
        id: Set(Uuid::new_v4()),
        source: Set("acrcloud".to_string()),
        event_type: Set(extract_event_type(&payload)),
        payload: Set(payload),
        signature_valid: Set(signature_valid),
        processed: Set(false),
        error: Set(None),
        file_scan_id: Set(None),
        received_at: Set(chrono::Utc::now().into()),
        processed_at: Set(None),
    }
    .insert(&state.db)
    .await
}

/// What became of a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventOutcome {
    /// Payload carries no file id worth acting on
    Ignored,
    /// No `file_scan` row matches the delivered file id
    Unmatched,
    /// A DB error interrupted handling
    Error,
    Failed,
    Completed,
    /// State-only callback; the poller finishes the scan
    Queued,
}

impl EventOutcome {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            EventOutcome::Ignored => "ignored",
            EventOutcome::Unmatched => "unmatched",
            EventOutcome::Error => "error",
            EventOutcome::Failed => "failed",
            EventOutcome::Completed => "completed",
            EventOutcome::Queued => "queued",
        }
    }

    /// Only outcomes that consumed the delivery mark the row processed.
    /// Ignored, unmatched and errored events stay in the
    /// `processed = false` queue so operators can find and replay them.
    pub(crate) fn marks_processed(self) -> bool {
        matches!(
            self,
            EventOutcome::Failed | EventOutcome::Completed | EventOutcome::Queued
        )
    }
}

async fn finalize_event(
    db: &sea_orm::DatabaseConnection,
    event: webhook_event::Model,
    outcome: EventOutcome,
    file_scan_id: Option<Uuid>,
    error: Option<String>,
) {
    let event_id = event.id;
    let processed = outcome.marks_processed();
    let mut update: webhook_event::ActiveModel = event.into();
    update.processed = Set(processed);
    update.file_scan_id = Set(file_scan_id);
    update.error = Set(error);
    update.processed_at = Set(processed.then(|| chrono::Utc::now().into()));
    if let Err(e) = update.update(db).await {
        tracing::warn!(event_id = %event_id, "failed to finalize webhook event: {e}");
    }
}

/// Act on a stored event and record its disposition.
async fn handle_event(state: &Arc<AppState>, event: webhook_event::Model) -> EventOutcome {
    let payload = event.payload.clone();

    let Some(file_id) = extract_file_id(&payload) else {
        let outcome = EventOutcome::Ignored;
        finalize_event(
            &state.db,
            event,
            outcome,
            None,
            Some("no file id in payload".to_string()),
        )
        .await;
        return outcome;
    };

    let scan = match file_scan::Entity::find()
        .filter(file_scan::Column::AcrFileId.eq(&file_id))
        .one(&state.db)
        .await
    {
        Ok(Some(scan)) => scan,
        Ok(None) => {
            tracing::warn!(file_id, "webhook for unknown scan");
            let outcome = EventOutcome::Unmatched;
            finalize_event(
                &state.db,
                event,
                outcome,
                None,
                Some("no matching scan".to_string()),
            )
            .await;
            return outcome;
        }
        Err(e) => {
            let outcome = EventOutcome::Error;
            finalize_event(&state.db, event, outcome, None, Some(format!("DB error: {e}"))).await;
            return outcome;
        }
    };
    let scan_id = scan.id;

    let remote_state = payload.get("state").and_then(Value::as_i64).unwrap_or(0);
    if remote_state < 0 {
        scan_worker::mark_scan_failed(
            &state.db,
            scan,
            format!("provider reported state {remote_state}"),
        )
        .await;
        let outcome = EventOutcome::Failed;
        finalize_event(&state.db, event, outcome, Some(scan_id), None).await;
        return outcome;
    }

    let results = payload.get("results").cloned().unwrap_or(Value::Null);
    if !results.is_null() {
        let spool_path = scan.spool_path.clone();
        match scan_worker::apply_scan_results(&state.db, scan, results).await {
            Ok(_) => {
                if let Err(e) = state.spool.delete(&spool_path).await {
                    tracing::warn!(scan_id = %scan_id, "spool cleanup failed: {e}");
                }
                let outcome = EventOutcome::Completed;
                finalize_event(&state.db, event, outcome, Some(scan_id), None).await;
                outcome
            }
            Err(e) => {
                let outcome = EventOutcome::Error;
                finalize_event(&state.db, event, outcome, Some(scan_id), Some(e)).await;
                outcome
            }
        }
    } else {
        // State callback without results; let the poller pick it up.
        scan_worker::trigger_scan_pass();
        let outcome = EventOutcome::Queued;
        finalize_event(&state.db, event, outcome, Some(scan_id), None).await;
        outcome
    }
}

/// POST /api/webhooks/acrcloud — unauthenticated; verified by HMAC signature
pub async fn receive_acrcloud(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let secret = credentials::webhook_secret(&state).await;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let signature_valid = match (&secret, signature) {
        (Some(secret), Some(sig)) => verify_webhook_signature(secret, &body, sig),
        (Some(_), None) => false,
        // No secret configured: accept, but record that nothing was verified
        (None, _) => false,
    };

    let event = store_event(&state, payload, signature_valid)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("DB error: {e}") })),
            )
        })?;

    if secret.is_some() && !signature_valid {
        tracing::warn!(event_id = %event.id, "webhook signature verification failed");
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Invalid webhook signature" })),
        ));
    }

    let outcome = handle_event(&state, event).await;
    tracing::info!(outcome = outcome.as_str(), "webhook processed");
    Ok(Json(serde_json::json!({ "status": outcome.as_str() })))
}

// ─── Admin event log ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct WebhookEventResponse {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub signature_valid: bool,
    pub processed: bool,
    pub error: Option<String>,
    pub file_scan_id: Option<Uuid>,
    pub received_at: chrono::DateTime<chrono::FixedOffset>,
    pub processed_at: Option<chrono::DateTime<chrono::FixedOffset>>,
}

impl From<webhook_event::Model> for WebhookEventResponse {
    fn from(e: webhook_event::Model) -> Self {
        Self {
            id: e.id,
            source: e.source,
            event_type: e.event_type,
            signature_valid: e.signature_valid,
            processed: e.processed,
            error: e.error,
            file_scan_id: e.file_scan_id,
            received_at: e.received_at,
            processed_at: e.processed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookEventDetailResponse {
    #[serde(flatten)]
    pub event: WebhookEventResponse,
    pub payload: Value,
}

#[derive(Debug, serde::Deserialize)]
pub struct WebhookEventListParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub processed: Option<bool>,
}

/// GET /api/admin/webhook-events
pub async fn list_webhook_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WebhookEventListParams>,
) -> Result<Json<PaginatedResponse<WebhookEventResponse>>, (StatusCode, String)> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(25).min(100);

    let mut query = webhook_event::Entity::find();
    if let Some(processed) = params.processed {
        query = query.filter(webhook_event::Column::Processed.eq(processed));
    }

    let paginator = query
        .order_by_desc(webhook_event::Column::ReceivedAt)
        .paginate(&state.db, per_page);

    let total = paginator
        .num_items()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let events = paginator
        .fetch_page(page - 1)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    Ok(Json(PaginatedResponse {
        data: events.into_iter().map(WebhookEventResponse::from).collect(),
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    }))
}

/// GET /api/admin/webhook-events/:id
pub async fn get_webhook_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WebhookEventDetailResponse>, (StatusCode, String)> {
    let event = webhook_event::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Webhook event not found".to_string()))?;

    let payload = event.payload.clone();
    Ok(Json(WebhookEventDetailResponse {
        event: WebhookEventResponse::from(event),
        payload,
    }))
}

/// POST /api/admin/webhook-events/:id/replay — re-run a stored event
/// against the current scan table, skipping signature checks.
pub async fn replay_webhook_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let event = webhook_event::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("DB error: {e}") })),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "Webhook event not found" })),
            )
        })?;

    let outcome = handle_event(&state, event).await;
    tracing::info!(event_id = %id, outcome = outcome.as_str(), "webhook event replayed");
    Ok(Json(serde_json::json!({ "status": outcome.as_str() })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_file_id_string() {
        let payload = serde_json::json!({"file_id": "12345"});
        assert_eq!(extract_file_id(&payload), Some("12345".to_string()));
    }

    #[test]
    fn test_extract_file_id_number() {
        let payload = serde_json::json!({"id": 9876});
        assert_eq!(extract_file_id(&payload), Some("9876".to_string()));
    }

    #[test]
    fn test_extract_file_id_prefers_file_id() {
        let payload = serde_json::json!({"file_id": "1", "id": "2"});
        assert_eq!(extract_file_id(&payload), Some("1".to_string()));
    }

    #[test]
    fn test_extract_file_id_absent_or_empty() {
        assert_eq!(extract_file_id(&serde_json::json!({})), None);
        assert_eq!(extract_file_id(&serde_json::json!({"file_id": ""})), None);
        assert_eq!(extract_file_id(&Value::Null), None);
    }

    #[test]
    fn test_unmatched_and_ignored_events_stay_unprocessed() {
        // Deliveries nothing acted on must remain in the replay queue
        assert!(!EventOutcome::Unmatched.marks_processed());
        assert!(!EventOutcome::Ignored.marks_processed());
        assert!(!EventOutcome::Error.marks_processed());
    }

    #[test]
    fn test_consumed_events_mark_processed() {
        assert!(EventOutcome::Completed.marks_processed());
        assert!(EventOutcome::Failed.marks_processed());
        assert!(EventOutcome::Queued.marks_processed());
    }

    #[test]
    fn test_outcome_words() {
        assert_eq!(EventOutcome::Unmatched.as_str(), "unmatched");
        assert_eq!(EventOutcome::Completed.as_str(), "completed");
        assert_eq!(EventOutcome::Queued.as_str(), "queued");
    }

    #[test]
    fn test_extract_event_type() {
        assert_eq!(
            extract_event_type(&serde_json::json!({"state": 1})),
            "file_state_1"
        );
        assert_eq!(
            extract_event_type(&serde_json::json!({"state": -1})),
            "file_state_-1"
        );
        assert_eq!(extract_event_type(&serde_json::json!({})), "unknown");
        assert_eq!(extract_event_type(&Value::Null), "unknown");
    }
}
