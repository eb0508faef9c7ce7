//! Error taxonomy (§7): one enum per phase, plus the orchestrator-level
//! `StepFailedError` wrap. `is_permanent()` feeds the Failed-Date Store's
//! classification so a range operation knows whether a date is worth
//! retrying.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Client(#[from] gh_client::FetchError),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    State(#[from] state_store::StateError),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl FetchError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::Client(e) if e.is_permanent())
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("missing required raw file: {0}")]
    MissingRaw(PathBuf),

    #[error("malformed raw file {path}: {source}")]
    MalformedRaw {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    State(#[from] state_store::StateError),
}

impl NormalizeError {
    /// Only a missing/unparseable `prs.json` is permanent — every other
    /// failure mode (state-store I/O, a transient enrichment call) is
    /// worth another attempt.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            NormalizeError::MissingRaw(_) | NormalizeError::MalformedRaw { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("no input found for {0}")]
    MissingInput(String),

    #[error("llm call failed: {0}")]
    Llm(#[from] llm_router::RouterError),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    State(#[from] state_store::StateError),
}

impl SummarizeError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, SummarizeError::MissingInput(_))
    }
}

/// Orchestrator-level wrap carrying which phase of a single-date pipeline
/// run failed; `run_daily` surfaces the first failure this way and skips
/// downstream steps.
#[derive(Debug, Error)]
#[error("pipeline failed at '{step}': {cause}")]
pub struct StepFailedError {
    pub step: &'static str,
    pub cause: String,
}

pub type FetchResult<T> = Result<T, FetchError>;
pub type NormalizeResult<T> = Result<T, NormalizeError>;
pub type SummarizeResult<T> = Result<T, SummarizeError>;
