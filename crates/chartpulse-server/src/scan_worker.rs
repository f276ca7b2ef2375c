//! File scan worker — pushes uploaded audio through fingerprint scanning.
//!
//! Each pass has two phases: pending uploads are sent to the provider's
//! scanning container, and processing scans are polled for results. A
//! webhook delivery completes a scan without waiting for the poller; the
//! poller is the fallback when no webhook arrives.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Notify;

use chartpulse_connect::{FileScanClient, ScanResults};
use chartpulse_db::entities::file_scan::{self, ScanState};
use chartpulse_db::AppState;

use crate::credentials;

/// Poll cadence for scans the provider is still processing.
const SCAN_POLL_INTERVAL_SECS: u64 = 60;

/// Grace period between handing a file to the provider and the first
/// status poll; results are rarely ready sooner.
const POLL_AFTER_SECS: i64 = 60;

fn poll_cutoff(now: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
    now - chrono::Duration::seconds(POLL_AFTER_SECS)
}

/// Shared notifier so uploads and retries wake the worker immediately.
static SCAN_NOTIFY: std::sync::LazyLock<Notify> = std::sync::LazyLock::new(Notify::new);

/// Wake the worker for an immediate pass.
pub fn trigger_scan_pass() {
    SCAN_NOTIFY.notify_one();
}

/// Spawn the file scan worker.
pub fn spawn(state: Arc<AppState>) {
    tokio::spawn(async move {
        tracing::info!("file scan worker started (poll every 60s)");

        loop {
            process_pending(&state).await;
            poll_processing(&state).await;

            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(SCAN_POLL_INTERVAL_SECS)) => {},
                _ = SCAN_NOTIFY.notified() => {},
            }
        }
    });
}

/// Upload every pending scan to the provider, oldest first.
async fn process_pending(state: &AppState) {
    let pending = match file_scan::Entity::find()
        .filter(file_scan::Column::State.eq(ScanState::Pending))
        .order_by_asc(file_scan::Column::CreatedAt)
        .all(&state.db)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("pending scan query failed: {e}");
            return;
        }
    };

    if pending.is_empty() {
        return;
    }

    let Some(config) = credentials::file_scan_config(state).await else {
        tracing::warn!(
            waiting = pending.len(),
            "file scanning credentials not configured; uploads stay pending"
        );
        return;
    };
    let client = match FileScanClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("file scan client setup failed: {e}");
            return;
        }
    };

    for scan in pending {
        if let Err(e) = upload_scan(state, &client, scan).await {
            tracing::error!("scan upload failed: {e}");
        }
    }
}

async fn upload_scan(
    state: &AppState,
    client: &FileScanClient,
    scan: file_scan::Model,
) -> Result<(), String> {
    let scan_id = scan.id;

    // Read the spooled bytes first so a missing file fails cleanly
    let data = match state.spool.read(&scan.spool_path).await {
        Ok(data) => data,
        Err(e) => {
            mark_scan_failed(&state.db, scan, format!("spool read failed: {e}")).await;
            return Ok(());
        }
    };

    let mut update: file_scan::ActiveModel = scan.into();
    update.state = Set(ScanState::Uploading);
    update.updated_at = Set(Utc::now().into());
    let scan = update
        .update(&state.db)
        .await
        .map_err(|e| format!("DB error: {e}"))?;

    match client.upload(&scan.original_filename, data).await {
        Ok(remote) => {
            tracing::info!(
                scan_id = %scan_id,
                acr_file_id = remote.id,
                "scan uploaded for processing"
            );
            let mut update: file_scan::ActiveModel = scan.into();
            update.state = Set(ScanState::Processing);
            update.acr_file_id = Set(Some(remote.id.to_string()));
            update.updated_at = Set(Utc::now().into());
            update
                .update(&state.db)
                .await
                .map_err(|e| format!("DB error: {e}"))?;
        }
        Err(e) => {
            mark_scan_failed(&state.db, scan, format!("upload failed: {e}")).await;
        }
    }

    Ok(())
}

/// Poll the provider for scans still marked processing, skipping ones
/// uploaded within the grace window.
async fn poll_processing(state: &AppState) {
    let processing = match file_scan::Entity::find()
        .filter(file_scan::Column::State.eq(ScanState::Processing))
        .filter(file_scan::Column::UpdatedAt.lt(poll_cutoff(Utc::now())))
        .all(&state.db)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("processing scan query failed: {e}");
            return;
        }
    };

    if processing.is_empty() {
        return;
    }

    let Some(config) = credentials::file_scan_config(state).await else {
        return;
    };
    let client = match FileScanClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("file scan client setup failed: {e}");
            return;
        }
    };

    for scan in processing {
        let Some(file_id) = scan.acr_file_id.clone() else {
            mark_scan_failed(
                &state.db,
                scan,
                "processing scan has no provider file id".to_string(),
            )
            .await;
            continue;
        };

        match client.get_file(&file_id).await {
            Ok(remote) if remote.is_ready() => {
                let scan_id = scan.id;
                let spool_path = scan.spool_path.clone();
                let results = remote.results.unwrap_or(Value::Null);
                match apply_scan_results(&state.db, scan, results).await {
                    Ok(_) => {
                        tracing::info!(scan_id = %scan_id, "scan results stored");
                        // the spooled copy is only needed until results land
                        if let Err(e) = state.spool.delete(&spool_path).await {
                            tracing::warn!(scan_id = %scan_id, "spool cleanup failed: {e}");
                        }
                    }
                    Err(e) => {
                        tracing::error!(scan_id = %scan_id, "failed to store scan results: {e}");
                    }
                }
            }
            Ok(remote) if remote.is_error() => {
                mark_scan_failed(
                    &state.db,
                    scan,
                    format!("provider reported state {}", remote.state),
                )
                .await;
            }
            Ok(_) => {
                // still processing
            }
            Err(e) => {
                tracing::warn!(scan_id = %scan.id, "scan status poll failed: {e}");
            }
        }
    }
}

/// Summary columns derived from a raw results payload.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ResultSummary {
    pub music_matches: i32,
    pub cover_matches: i32,
    pub detected_title: Option<String>,
    pub detected_artist: Option<String>,
    pub detected_isrc: Option<String>,
    pub match_score: Option<i16>,
}

pub(crate) fn summarize_results(results: &Value) -> ResultSummary {
    let parsed = ScanResults::from_value(results);
    let best = parsed.best_music_match();

    ResultSummary {
        music_matches: parsed.music.len() as i32,
        cover_matches: parsed.cover_songs.len() as i32,
        detected_title: best.and_then(|m| m.title.clone()),
        detected_artist: best.and_then(|m| m.artist_names()),
        detected_isrc: best.and_then(|m| m.isrc().map(str::to_string)),
        match_score: best.and_then(|m| m.score).map(score_to_i16),
    }
}

pub(crate) fn score_to_i16(score: f64) -> i16 {
    score.clamp(0.0, 100.0).round() as i16
}

/// Store provider results on a scan row and mark it ready. Shared by the
/// poller and the webhook handler.
pub(crate) async fn apply_scan_results(
    db: &DatabaseConnection,
    scan: file_scan::Model,
    results: Value,
) -> Result<file_scan::Model, String> {
    let summary = summarize_results(&results);

    let mut update: file_scan::ActiveModel = scan.into();
    update.state = Set(ScanState::Ready);
    update.results = Set(Some(results));
    update.music_matches = Set(Some(summary.music_matches));
    update.cover_matches = Set(Some(summary.cover_matches));
    update.detected_title = Set(summary.detected_title);
    update.detected_artist = Set(summary.detected_artist);
    update.detected_isrc = Set(summary.detected_isrc);
    update.match_score = Set(summary.match_score);
    update.error = Set(None);
    update.completed_at = Set(Some(Utc::now().into()));
    update.updated_at = Set(Utc::now().into());
    update
        .update(db)
        .await
        .map_err(|e| format!("DB error: {e}"))
}

pub(crate) async fn mark_scan_failed(db: &DatabaseConnection, scan: file_scan::Model, error: String) {
    let scan_id = scan.id;
    tracing::warn!(scan_id = %scan_id, "scan failed: {error}");

    let mut update: file_scan::ActiveModel = scan.into();
    update.state = Set(ScanState::Failed);
    update.error = Set(Some(error));
    update.updated_at = Set(Utc::now().into());
    if let Err(e) = update.update(db).await {
        tracing::error!(scan_id = %scan_id, "failed to mark scan as failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_picks_the_best_scoring_match() {
        let results = json!({
            "music": [
                {
                    "title": "Fade Out",
                    "score": 72.0,
                    "artists": [{"name": "Nova"}],
                    "acrid": "aaa"
                },
                {
                    "title": "Midnight Run",
                    "score": 96.5,
                    "artists": [{"name": "Ada Lane"}, {"name": "Kito"}],
                    "external_ids": {"isrc": "USUM72001234"},
                    "acrid": "bbb"
                }
            ],
            "cover_songs": [
                {"title": "Midnight Run (Acoustic)", "artists": [{"name": "Someone"}], "acrid": "ccc"}
            ]
        });

        let summary = summarize_results(&results);
        assert_eq!(summary.music_matches, 2);
        assert_eq!(summary.cover_matches, 1);
        assert_eq!(summary.detected_title.as_deref(), Some("Midnight Run"));
        assert_eq!(summary.detected_artist.as_deref(), Some("Ada Lane, Kito"));
        assert_eq!(summary.detected_isrc.as_deref(), Some("USUM72001234"));
        assert_eq!(summary.match_score, Some(97));
    }

    #[test]
    fn summary_of_empty_results_is_blank() {
        assert_eq!(summarize_results(&Value::Null), ResultSummary::default());
        assert_eq!(summarize_results(&json!({})), ResultSummary::default());
        assert_eq!(
            summarize_results(&json!({"music": [], "cover_songs": []})),
            ResultSummary::default()
        );
    }

    #[test]
    fn summary_handles_wrapped_file_scan_entries() {
        // File scanning wraps each entry in a "result" object
        let results = json!({
            "music": [
                {"result": {"title": "Wrapped", "score": 88.0, "artists": [{"name": "X"}], "acrid": "ddd"}}
            ]
        });

        let summary = summarize_results(&results);
        assert_eq!(summary.music_matches, 1);
        assert_eq!(summary.detected_title.as_deref(), Some("Wrapped"));
        assert_eq!(summary.match_score, Some(88));
    }

    #[test]
    fn fresh_uploads_wait_out_the_poll_grace_window() {
        let now = Utc::now();
        let cutoff = poll_cutoff(now);
        // updated moments ago: above the cutoff, not yet polled
        assert!(now - chrono::Duration::seconds(5) > cutoff);
        // updated minutes ago: due for a poll
        assert!(now - chrono::Duration::seconds(300) < cutoff);
    }

    #[test]
    fn score_conversion_rounds_and_clamps() {
        assert_eq!(score_to_i16(87.4), 87);
        assert_eq!(score_to_i16(87.6), 88);
        assert_eq!(score_to_i16(150.0), 100);
        assert_eq!(score_to_i16(-3.0), 0);
    }
}
