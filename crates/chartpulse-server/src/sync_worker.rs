//! Chart sync worker — keeps ranking history complete for every scheduled chart.
//!
//! Each pass walks the enabled schedules, computes which ranking dates are
//! missing inside the schedule's lookback window, fetches them from the chart
//! provider and upserts rankings, entries, tracks and artists. Re-running a
//! pass over dates that already exist is a no-op, so crashes and overlapping
//! windows never duplicate data. Every run is recorded as a `sync_execution`
//! row so the dashboard can show what happened.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

use chartpulse_connect::{RankingItem, RankingSong, SongArtist, SoundchartsClient};
use chartpulse_db::entities::chart::ChartFrequency;
use chartpulse_db::entities::sync_execution::{SyncStatus, SyncTrigger};
use chartpulse_db::entities::{
    artist, chart, chart_ranking, chart_ranking_entry, sync_execution, sync_schedule, track,
};
use chartpulse_db::AppState;

use crate::credentials;

/// How often a sync pass runs (15 minutes). Schedules decide their own
/// cadence through missing-date derivation, so a frequent pass is cheap.
const SYNC_INTERVAL_SECS: u64 = 900;

/// Pause between provider requests to stay under the rate limit.
pub(crate) const SC_RATE_LIMIT_MS: u64 = 250;

/// A `running` execution older than this is considered crashed.
const EXECUTION_STALE_SECS: i64 = 3600;

/// Lookback for manual syncs on charts without a schedule.
const DEFAULT_LOOKBACK_DAYS: i32 = 30;

/// How many per-date errors are kept on the execution row.
const MAX_ERRORS_RECORDED: usize = 5;

/// Shared notifier so the admin API can wake up the worker immediately.
static SYNC_NOTIFY: std::sync::LazyLock<Notify> = std::sync::LazyLock::new(Notify::new);

/// Wake the worker for an immediate full pass.
pub fn trigger_sync_pass() {
    SYNC_NOTIFY.notify_one();
}

#[derive(Debug, Default)]
pub struct PassSummary {
    pub charts: u64,
    pub rankings_fetched: u64,
    pub errors: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct EntryCounts {
    pub entries_upserted: i32,
    pub tracks_created: i32,
}

#[derive(Debug)]
pub enum ManualSyncError {
    ChartNotFound,
    ChartDisabled,
    AlreadyRunning,
    Db(String),
}

/// Spawn the chart sync worker.
pub fn spawn(state: Arc<AppState>) {
    tokio::spawn(async move {
        tracing::info!("chart sync worker started (pass every 15m)");

        // Wait 10s before the first pass to let the server fully start
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;

        loop {
            reap_stale_executions(&state).await;

            match run_sync_pass(&state).await {
                Ok(summary) => tracing::info!(
                    "sync pass done: {} charts, {} rankings fetched, {} with errors",
                    summary.charts,
                    summary.rankings_fetched,
                    summary.errors
                ),
                Err(e) => tracing::error!("sync pass failed: {e}"),
            }

            // Wait for either the interval or a manual trigger
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(SYNC_INTERVAL_SECS)) => {},
                _ = SYNC_NOTIFY.notified() => {
                    tracing::info!("sync pass triggered manually");
                },
            }
        }
    });
}

/// Run one pass over all enabled schedules.
pub(crate) async fn run_sync_pass(state: &AppState) -> Result<PassSummary, String> {
    let schedules = sync_schedule::Entity::find()
        .filter(sync_schedule::Column::IsEnabled.eq(true))
        .all(&state.db)
        .await
        .map_err(|e| format!("DB error: {e}"))?;

    let mut summary = PassSummary::default();

    for schedule in schedules {
        let chart_model = chart::Entity::find_by_id(schedule.chart_id)
            .one(&state.db)
            .await
            .map_err(|e| format!("DB error: {e}"))?;

        let Some(chart_model) = chart_model else {
            tracing::warn!(schedule_id = %schedule.id, "schedule points at a missing chart");
            continue;
        };
        if !chart_model.is_active {
            continue;
        }

        summary.charts += 1;
        match run_chart_sync(state, &chart_model, Some(&schedule), SyncTrigger::Scheduled).await {
            Ok(execution) => {
                summary.rankings_fetched += execution.rankings_fetched.max(0) as u64;
                if execution.status != SyncStatus::Succeeded {
                    summary.errors += 1;
                }
            }
            Err(e) => {
                summary.errors += 1;
                tracing::error!(chart = %chart_model.slug, "chart sync failed: {e}");
            }
        }
    }

    Ok(summary)
}

/// Start a manual sync for one chart. Returns the execution id immediately;
/// the fetch work continues in the background.
pub async fn start_manual_sync(
    state: &Arc<AppState>,
    chart_id: Uuid,
) -> Result<Uuid, ManualSyncError> {
    let chart_model = chart::Entity::find_by_id(chart_id)
        .one(&state.db)
        .await
        .map_err(|e| ManualSyncError::Db(e.to_string()))?
        .ok_or(ManualSyncError::ChartNotFound)?;

    if !chart_model.is_active {
        return Err(ManualSyncError::ChartDisabled);
    }

    let running = sync_execution::Entity::find()
        .filter(sync_execution::Column::ChartId.eq(chart_id))
        .filter(sync_execution::Column::Status.eq(SyncStatus::Running))
        .count(&state.db)
        .await
        .map_err(|e| ManualSyncError::Db(e.to_string()))?;
    if running > 0 {
        return Err(ManualSyncError::AlreadyRunning);
    }

    let schedule = sync_schedule::Entity::find()
        .filter(sync_schedule::Column::ChartId.eq(chart_id))
        .one(&state.db)
        .await
        .map_err(|e| ManualSyncError::Db(e.to_string()))?;

    let execution = insert_execution(
        &state.db,
        &chart_model,
        schedule.as_ref(),
        SyncTrigger::Manual,
    )
    .await
    .map_err(ManualSyncError::Db)?;
    let execution_id = execution.id;

    let state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = run_execution(&state, &chart_model, schedule.as_ref(), execution).await {
            tracing::error!(chart = %chart_model.slug, "manual sync failed: {e}");
        }
    });

    Ok(execution_id)
}

/// Sync one chart under a fresh execution row.
async fn run_chart_sync(
    state: &AppState,
    chart_model: &chart::Model,
    schedule: Option<&sync_schedule::Model>,
    trigger: SyncTrigger,
) -> Result<sync_execution::Model, String> {
    let execution = insert_execution(&state.db, chart_model, schedule, trigger).await?;
    run_execution(state, chart_model, schedule, execution).await
}

async fn insert_execution(
    db: &DatabaseConnection,
    chart_model: &chart::Model,
    schedule: Option<&sync_schedule::Model>,
    trigger: SyncTrigger,
) -> Result<sync_execution::Model, String> {
    sync_execution::ActiveModel {
        id: Set(Uuid::new_v4()),
        schedule_id: Set(schedule.map(|s| s.id)),
        chart_id: Set(chart_model.id),
        trigger: Set(trigger),
        status: Set(SyncStatus::Running),
        started_at: Set(Utc::now().into()),
        finished_at: Set(None),
        missing_dates: Set(0),
        rankings_fetched: Set(0),
        entries_upserted: Set(0),
        tracks_created: Set(0),
        error: Set(None),
    }
    .insert(db)
    .await
    .map_err(|e| format!("DB error: {e}"))
}

async fn run_execution(
    state: &AppState,
    chart_model: &chart::Model,
    schedule: Option<&sync_schedule::Model>,
    execution: sync_execution::Model,
) -> Result<sync_execution::Model, String> {
    let db = &state.db;
    let today = Utc::now().date_naive();

    let lookback = clamp_lookback(
        schedule
            .map(|s| s.lookback_days)
            .unwrap_or(DEFAULT_LOOKBACK_DAYS),
    );

    // Dates already stored inside the window
    let window_start = today - Duration::days(i64::from(lookback));
    let existing: HashSet<NaiveDate> = chart_ranking::Entity::find()
        .filter(chart_ranking::Column::ChartId.eq(chart_model.id))
        .filter(chart_ranking::Column::RankingDate.gte(window_start))
        .all(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?
        .iter()
        .map(|r| r.ranking_date)
        .collect();

    // The newest stored date anchors the weekly publication grid
    let anchor = chart_ranking::Entity::find()
        .filter(chart_ranking::Column::ChartId.eq(chart_model.id))
        .order_by_desc(chart_ranking::Column::RankingDate)
        .one(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?
        .map(|r| r.ranking_date);

    let missing = missing_ranking_periods(
        chart_model.frequency,
        today,
        lookback,
        schedule.and_then(|s| s.last_synced_date),
        anchor,
        &existing,
    );

    tracing::info!(
        chart = %chart_model.slug,
        missing = missing.len(),
        "chart sync starting"
    );

    let mut exec_update: sync_execution::ActiveModel = execution.into();
    exec_update.missing_dates = Set(missing.len() as i32);
    let execution = exec_update
        .update(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?;

    let Some(config) = credentials::soundcharts_config(state).await else {
        return finish_execution(
            db,
            execution,
            0,
            0,
            0,
            vec!["chart provider credentials not configured".to_string()],
        )
        .await;
    };
    let client = SoundchartsClient::new(config).map_err(|e| e.to_string())?;

    let mut fetched = 0i32;
    let mut entries_total = 0i32;
    let mut tracks_created_total = 0i32;
    let mut last_fetched: Option<NaiveDate> = None;
    let mut errors: Vec<String> = Vec::new();

    for date in &missing {
        tokio::time::sleep(std::time::Duration::from_millis(SC_RATE_LIMIT_MS)).await;

        match process_chart_ranking(db, &client, chart_model, *date).await {
            Ok(Some(counts)) => {
                fetched += 1;
                entries_total += counts.entries_upserted;
                tracks_created_total += counts.tracks_created;
                last_fetched = Some(*date);
            }
            Ok(None) => {
                // Not published (yet); the next pass will try again
                tracing::debug!(chart = %chart_model.slug, %date, "no ranking published for date");
            }
            Err(e) => {
                tracing::warn!(chart = %chart_model.slug, %date, "ranking fetch failed: {e}");
                errors.push(format!("{date}: {e}"));
            }
        }
    }

    if let Some(schedule) = schedule {
        let mut update: sync_schedule::ActiveModel = schedule.clone().into();
        if let Some(newest) = last_fetched {
            let newest = schedule.last_synced_date.map_or(newest, |prev| prev.max(newest));
            update.last_synced_date = Set(Some(newest));
        }
        update.last_run_at = Set(Some(Utc::now().into()));
        update.updated_at = Set(Utc::now().into());
        if let Err(e) = update.update(db).await {
            tracing::warn!(chart = %chart_model.slug, "failed to update schedule bookkeeping: {e}");
        }
    }

    finish_execution(
        db,
        execution,
        fetched,
        entries_total,
        tracks_created_total,
        errors,
    )
    .await
}

/// Compute the ranking dates a chart is missing inside its lookback window.
///
/// Candidates follow the chart's publication grid: every day for daily
/// charts, one weekday for weekly charts (anchored on the newest stored
/// ranking, or today when history is empty), the 1st of the month for
/// monthly charts. Dates already stored are dropped, future dates never
/// appear, and the result is ascending so history backfills oldest-first.
pub(crate) fn missing_ranking_periods(
    frequency: ChartFrequency,
    today: NaiveDate,
    lookback_days: i32,
    last_synced_date: Option<NaiveDate>,
    anchor: Option<NaiveDate>,
    existing: &HashSet<NaiveDate>,
) -> Vec<NaiveDate> {
    let lookback = clamp_lookback(lookback_days);

    let mut start = today - Duration::days(i64::from(lookback) - 1);
    if let Some(last) = last_synced_date {
        let after_last = last + Duration::days(1);
        if after_last > start {
            start = after_last;
        }
    }
    if start > today {
        return Vec::new();
    }

    let in_window = start.iter_days().take_while(|d| *d <= today);
    let candidates: Vec<NaiveDate> = match frequency {
        ChartFrequency::Daily => in_window.collect(),
        ChartFrequency::Weekly => {
            let weekday = anchor.unwrap_or(today).weekday();
            in_window.filter(|d| d.weekday() == weekday).collect()
        }
        ChartFrequency::Monthly => in_window.filter(|d| d.day() == 1).collect(),
    };

    candidates
        .into_iter()
        .filter(|d| !existing.contains(d))
        .collect()
}

pub(crate) fn clamp_lookback(days: i32) -> i32 {
    days.clamp(1, 365)
}

/// Fetch one ranking date and store it. `Ok(None)` means the provider has
/// not published this date.
pub(crate) async fn process_chart_ranking(
    db: &DatabaseConnection,
    client: &SoundchartsClient,
    chart_model: &chart::Model,
    date: NaiveDate,
) -> Result<Option<EntryCounts>, String> {
    let items = client
        .get_chart_ranking(&chart_model.slug, date)
        .await
        .map_err(|e| e.to_string())?;
    let Some(items) = items else {
        return Ok(None);
    };

    let existing = chart_ranking::Entity::find()
        .filter(chart_ranking::Column::ChartId.eq(chart_model.id))
        .filter(chart_ranking::Column::RankingDate.eq(date))
        .one(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?;

    let ranking = match existing {
        Some(row) => row,
        None => {
            chart_ranking::ActiveModel {
                id: Set(Uuid::new_v4()),
                chart_id: Set(chart_model.id),
                ranking_date: Set(date),
                fetched_at: Set(Utc::now().into()),
                entry_count: Set(0),
            }
            .insert(db)
            .await
            .map_err(|e| format!("DB error: {e}"))?
        }
    };

    let counts = process_ranking_entries(db, ranking.id, &items).await?;

    let entry_count = items.len() as i32;
    let mut update: chart_ranking::ActiveModel = ranking.into();
    update.fetched_at = Set(Utc::now().into());
    update.entry_count = Set(entry_count);
    update
        .update(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?;

    Ok(Some(counts))
}

/// Upsert the entries of one ranking snapshot, creating tracks and artists
/// as needed. Positions beyond the new payload are deleted so a shorter
/// chart does not keep stale trailing entries.
pub(crate) async fn process_ranking_entries(
    db: &DatabaseConnection,
    ranking_id: Uuid,
    items: &[RankingItem],
) -> Result<EntryCounts, String> {
    let mut counts = EntryCounts::default();
    let mut max_position = 0i32;
    let mut seen = HashSet::new();

    for item in items {
        if !seen.insert(item.position) {
            // last occurrence wins when the provider repeats a position
            tracing::warn!(
                %ranking_id,
                position = item.position,
                "duplicate position in provider payload"
            );
        }
        max_position = max_position.max(item.position);

        let (track_id, created) = find_or_create_track(db, &item.song).await?;
        if created {
            counts.tracks_created += 1;
        }

        let existing = chart_ranking_entry::Entity::find()
            .filter(chart_ranking_entry::Column::RankingId.eq(ranking_id))
            .filter(chart_ranking_entry::Column::Position.eq(item.position))
            .one(db)
            .await
            .map_err(|e| format!("DB error: {e}"))?;

        match existing {
            Some(row) => {
                let mut update: chart_ranking_entry::ActiveModel = row.into();
                update.track_id = Set(track_id);
                update.previous_position = Set(item.old_position);
                update.position_change = Set(item.position_evolution);
                update.weeks_on_chart = Set(item.time_on_chart);
                update.metric_value = Set(item.metric);
                update
                    .update(db)
                    .await
                    .map_err(|e| format!("DB error: {e}"))?;
            }
            None => {
                chart_ranking_entry::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    ranking_id: Set(ranking_id),
                    position: Set(item.position),
                    track_id: Set(track_id),
                    previous_position: Set(item.old_position),
                    position_change: Set(item.position_evolution),
                    weeks_on_chart: Set(item.time_on_chart),
                    metric_value: Set(item.metric),
                }
                .insert(db)
                .await
                .map_err(|e| format!("DB error: {e}"))?;
            }
        }
        counts.entries_upserted += 1;
    }

    chart_ranking_entry::Entity::delete_many()
        .filter(chart_ranking_entry::Column::RankingId.eq(ranking_id))
        .filter(chart_ranking_entry::Column::Position.gt(max_position))
        .exec(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?;

    Ok(counts)
}

/// Find a track by its provider uuid or create it. Existing rows only get
/// fields filled that are still empty; refresh endpoints overwrite.
pub(crate) async fn find_or_create_track(
    db: &DatabaseConnection,
    song: &RankingSong,
) -> Result<(Uuid, bool), String> {
    let existing = track::Entity::find()
        .filter(track::Column::SoundchartsUuid.eq(&song.uuid))
        .one(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?;

    if let Some(found) = existing {
        let mut update: track::ActiveModel = found.clone().into();
        let mut dirty = false;
        if found.isrc.is_none() && song.isrc.is_some() {
            update.isrc = Set(song.isrc.clone());
            dirty = true;
        }
        if found.image_url.is_none() && song.image_url.is_some() {
            update.image_url = Set(song.image_url.clone());
            dirty = true;
        }
        if found.credit_name.is_none() && song.credit_name.is_some() {
            update.credit_name = Set(song.credit_name.clone());
            dirty = true;
        }
        if found.artist_id.is_none() {
            if let Some(first) = song.artists.first() {
                let artist_id = find_or_create_artist(db, first).await?;
                update.artist_id = Set(Some(artist_id));
                dirty = true;
            }
        }
        if dirty {
            update.updated_at = Set(Utc::now().into());
            update
                .update(db)
                .await
                .map_err(|e| format!("DB error: {e}"))?;
        }
        return Ok((found.id, false));
    }

    let artist_id = match song.artists.first() {
        Some(first) => Some(find_or_create_artist(db, first).await?),
        None => None,
    };

    let now = Utc::now();
    let created = track::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(song.name.clone()),
        credit_name: Set(song.credit_name.clone()),
        artist_id: Set(artist_id),
        isrc: Set(song.isrc.clone()),
        soundcharts_uuid: Set(Some(song.uuid.clone())),
        duration_secs: Set(None),
        release_date: Set(None),
        image_url: Set(song.image_url.clone()),
        metadata_refreshed_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .map_err(|e| format!("DB error: {e}"))?;

    Ok((created.id, true))
}

pub(crate) async fn find_or_create_artist(
    db: &DatabaseConnection,
    song_artist: &SongArtist,
) -> Result<Uuid, String> {
    let existing = artist::Entity::find()
        .filter(artist::Column::SoundchartsUuid.eq(&song_artist.uuid))
        .one(db)
        .await
        .map_err(|e| format!("DB error: {e}"))?;

    if let Some(found) = existing {
        return Ok(found.id);
    }

    let now = Utc::now();
    let created = artist::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(song_artist.name.clone()),
        soundcharts_uuid: Set(Some(song_artist.uuid.clone())),
        image_url: Set(None),
        country_code: Set(None),
        spotify_followers: Set(None),
        monthly_listeners: Set(None),
        audience_refreshed_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .map_err(|e| format!("DB error: {e}"))?;

    Ok(created.id)
}

async fn finish_execution(
    db: &DatabaseConnection,
    execution: sync_execution::Model,
    fetched: i32,
    entries: i32,
    tracks_created: i32,
    errors: Vec<String>,
) -> Result<sync_execution::Model, String> {
    let status = execution_outcome(fetched, &errors);
    let error_text = summarize_errors(&errors);

    let mut update: sync_execution::ActiveModel = execution.into();
    update.status = Set(status);
    update.finished_at = Set(Some(Utc::now().into()));
    update.rankings_fetched = Set(fetched);
    update.entries_upserted = Set(entries);
    update.tracks_created = Set(tracks_created);
    update.error = Set(error_text);
    update
        .update(db)
        .await
        .map_err(|e| format!("DB error: {e}"))
}

/// An execution succeeded if nothing failed, is partial if some dates
/// landed despite errors, and failed outright otherwise.
pub(crate) fn execution_outcome(fetched: i32, errors: &[String]) -> SyncStatus {
    if errors.is_empty() {
        SyncStatus::Succeeded
    } else if fetched > 0 {
        SyncStatus::Partial
    } else {
        SyncStatus::Failed
    }
}

pub(crate) fn summarize_errors(errors: &[String]) -> Option<String> {
    if errors.is_empty() {
        return None;
    }
    let mut text = errors
        .iter()
        .take(MAX_ERRORS_RECORDED)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");
    if errors.len() > MAX_ERRORS_RECORDED {
        text.push_str(&format!(" (+{} more)", errors.len() - MAX_ERRORS_RECORDED));
    }
    Some(text)
}

/// Mark `running` executions older than the stale cutoff as failed. Covers
/// crashes and restarts that left an execution open.
async fn reap_stale_executions(state: &AppState) {
    let cutoff = Utc::now() - Duration::seconds(EXECUTION_STALE_SECS);

    let stale = match sync_execution::Entity::find()
        .filter(sync_execution::Column::Status.eq(SyncStatus::Running))
        .filter(sync_execution::Column::StartedAt.lt(cutoff))
        .all(&state.db)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("stale execution query failed: {e}");
            return;
        }
    };

    for row in stale {
        tracing::warn!(
            execution_id = %row.id,
            chart_id = %row.chart_id,
            "marking stale execution as failed"
        );
        let mut update: sync_execution::ActiveModel = row.into();
        update.status = Set(SyncStatus::Failed);
        update.finished_at = Set(Some(Utc::now().into()));
        update.error = Set(Some("execution timed out".to_string()));
        if let Err(e) = update.update(&state.db).await {
            tracing::error!("failed to reap stale execution: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn no_existing() -> HashSet<NaiveDate> {
        HashSet::new()
    }

    // ─── missing_ranking_periods: daily ─────────────────────────────

    #[test]
    fn daily_full_window_when_history_empty() {
        let today = date(2026, 3, 10);
        let missing = missing_ranking_periods(
            ChartFrequency::Daily,
            today,
            7,
            None,
            None,
            &no_existing(),
        );

        assert_eq!(missing.len(), 7);
        assert_eq!(missing[0], date(2026, 3, 4));
        assert_eq!(missing[6], today);
    }

    #[test]
    fn daily_skips_dates_already_stored() {
        let today = date(2026, 3, 10);
        let existing: HashSet<NaiveDate> =
            [date(2026, 3, 8), date(2026, 3, 10)].into_iter().collect();

        let missing =
            missing_ranking_periods(ChartFrequency::Daily, today, 7, None, None, &existing);

        assert_eq!(missing.len(), 5);
        assert!(!missing.contains(&date(2026, 3, 8)));
        assert!(!missing.contains(&date(2026, 3, 10)));
        // holes in the middle are still backfilled
        assert!(missing.contains(&date(2026, 3, 9)));
    }

    #[test]
    fn daily_window_starts_after_last_synced() {
        let today = date(2026, 3, 10);
        let missing = missing_ranking_periods(
            ChartFrequency::Daily,
            today,
            30,
            Some(date(2026, 3, 7)),
            None,
            &no_existing(),
        );

        assert_eq!(
            missing,
            vec![date(2026, 3, 8), date(2026, 3, 9), date(2026, 3, 10)]
        );
    }

    #[test]
    fn daily_everything_present_returns_empty() {
        let today = date(2026, 3, 10);
        let existing: HashSet<NaiveDate> = (0..7).map(|i| today - Duration::days(i)).collect();

        let missing =
            missing_ranking_periods(ChartFrequency::Daily, today, 7, None, None, &existing);
        assert!(missing.is_empty());
    }

    #[test]
    fn daily_last_synced_today_returns_empty() {
        let today = date(2026, 3, 10);
        let missing = missing_ranking_periods(
            ChartFrequency::Daily,
            today,
            30,
            Some(today),
            None,
            &no_existing(),
        );
        assert!(missing.is_empty());
    }

    #[test]
    fn daily_single_day_window() {
        let today = date(2026, 3, 10);
        let missing =
            missing_ranking_periods(ChartFrequency::Daily, today, 1, None, None, &no_existing());
        assert_eq!(missing, vec![today]);
    }

    #[test]
    fn daily_result_is_ascending() {
        let today = date(2026, 3, 10);
        let existing: HashSet<NaiveDate> = [date(2026, 3, 6)].into_iter().collect();
        let missing =
            missing_ranking_periods(ChartFrequency::Daily, today, 10, None, None, &existing);

        let mut sorted = missing.clone();
        sorted.sort();
        assert_eq!(missing, sorted);
    }

    // ─── missing_ranking_periods: weekly ────────────────────────────

    #[test]
    fn weekly_aligns_to_stored_anchor_weekday() {
        // 2026-03-06 is a Friday; 2026-03-10 is a Tuesday
        let today = date(2026, 3, 10);
        let anchor = date(2026, 3, 6);
        let existing: HashSet<NaiveDate> = [anchor].into_iter().collect();

        let missing = missing_ranking_periods(
            ChartFrequency::Weekly,
            today,
            21,
            None,
            Some(anchor),
            &existing,
        );

        // Fridays within [2026-02-18, 2026-03-10], minus the stored one
        assert_eq!(missing, vec![date(2026, 2, 20), date(2026, 2, 27)]);
    }

    #[test]
    fn weekly_cold_start_anchors_on_today() {
        // No history at all: the grid aligns on today's weekday and
        // self-corrects once the first real ranking lands
        let today = date(2026, 3, 10); // Tuesday
        let missing = missing_ranking_periods(
            ChartFrequency::Weekly,
            today,
            15,
            None,
            None,
            &no_existing(),
        );

        assert_eq!(
            missing,
            vec![date(2026, 2, 24), date(2026, 3, 3), date(2026, 3, 10)]
        );
        for d in &missing {
            assert_eq!(d.weekday(), today.weekday());
        }
    }

    #[test]
    fn weekly_never_includes_future_dates() {
        let today = date(2026, 3, 10);
        let missing = missing_ranking_periods(
            ChartFrequency::Weekly,
            today,
            30,
            None,
            Some(date(2026, 3, 6)),
            &no_existing(),
        );
        assert!(missing.iter().all(|d| *d <= today));
    }

    // ─── missing_ranking_periods: monthly ───────────────────────────

    #[test]
    fn monthly_first_of_month_only() {
        let today = date(2026, 3, 10);
        let existing: HashSet<NaiveDate> = [date(2026, 2, 1)].into_iter().collect();

        let missing = missing_ranking_periods(
            ChartFrequency::Monthly,
            today,
            90,
            None,
            None,
            &existing,
        );

        assert_eq!(missing, vec![date(2026, 1, 1), date(2026, 3, 1)]);
    }

    #[test]
    fn monthly_short_window_may_be_empty() {
        // A 5-day window ending mid-month contains no 1st
        let today = date(2026, 3, 10);
        let missing = missing_ranking_periods(
            ChartFrequency::Monthly,
            today,
            5,
            None,
            None,
            &no_existing(),
        );
        assert!(missing.is_empty());
    }

    // ─── clamp / outcome / error summary ────────────────────────────

    #[test]
    fn lookback_is_clamped() {
        assert_eq!(clamp_lookback(0), 1);
        assert_eq!(clamp_lookback(-5), 1);
        assert_eq!(clamp_lookback(30), 30);
        assert_eq!(clamp_lookback(9999), 365);
    }

    #[test]
    fn clamped_lookback_is_used_for_the_window() {
        let today = date(2026, 3, 10);
        let missing =
            missing_ranking_periods(ChartFrequency::Daily, today, 0, None, None, &no_existing());
        assert_eq!(missing, vec![today]);
    }

    #[test]
    fn outcome_clean_run_succeeds() {
        assert_eq!(execution_outcome(3, &[]), SyncStatus::Succeeded);
        // nothing to do is still a success
        assert_eq!(execution_outcome(0, &[]), SyncStatus::Succeeded);
    }

    #[test]
    fn outcome_partial_when_some_dates_landed() {
        let errors = vec!["2026-03-08: timeout".to_string()];
        assert_eq!(execution_outcome(2, &errors), SyncStatus::Partial);
    }

    #[test]
    fn outcome_failed_when_nothing_landed() {
        let errors = vec!["2026-03-08: timeout".to_string()];
        assert_eq!(execution_outcome(0, &errors), SyncStatus::Failed);
    }

    #[test]
    fn error_summary_caps_recorded_errors() {
        assert_eq!(summarize_errors(&[]), None);

        let few = vec!["a".to_string(), "b".to_string()];
        assert_eq!(summarize_errors(&few).unwrap(), "a; b");

        let many: Vec<String> = (0..8).map(|i| format!("err{i}")).collect();
        let summary = summarize_errors(&many).unwrap();
        assert!(summary.contains("err4"));
        assert!(!summary.contains("err5"));
        assert!(summary.ends_with("(+3 more)"));
    }
}
