pub mod admin;
pub mod artists;
pub mod charts;
pub mod dashboard;
pub mod scans;
pub mod schedules;
pub mod setup;
pub mod tracks;
pub mod webhooks;
