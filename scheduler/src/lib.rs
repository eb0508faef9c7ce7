//! Scheduler (§4.13): cron-triggered daily/weekly/monthly/yearly pipeline
//! runs, with an append-only history and a notification boundary. All
//! jobs are loss-tolerant -- a failure is recorded and notified, never
//! propagated past this crate.

pub mod config;
pub mod core;
pub mod errors;
pub mod history;
pub mod jobs;
pub mod notifier;

pub use config::ScheduleConfig;
pub use core::{JobStatus, SchedulerService, SchedulerStatus};
pub use errors::{Result, SchedulerError};
pub use history::{SchedulerEvent, SchedulerHistory};
pub use notifier::{CompositeNotifier, LogNotifier, Notifier};
