pub mod artist;
pub mod chart;
pub mod chart_ranking;
pub mod chart_ranking_entry;
pub mod file_scan;
pub mod service_setting;
pub mod sync_execution;
pub mod sync_schedule;
pub mod track;
pub mod user;
pub mod webhook_event;
