use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed schedule config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("malformed scheduler history {path}: {source}")]
    History {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid cron fields for job '{job}': {reason}")]
    InvalidCron { job: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
