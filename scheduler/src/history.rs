//! Append-only record of scheduler firings, persisted as a single JSON
//! array so the disabled-mode fallback and a restarted process both have
//! something to answer a `history` query with.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::errors::{Result, SchedulerError};

/// Keep the history file from growing without bound across a long-running
/// process; only the tail is ever queried in practice.
const MAX_EVENTS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerEvent {
    pub job: &'static str,
    pub status: &'static str,
    pub triggered_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SchedulerEvent {
    pub fn success(job: &'static str, target: impl Into<String>, triggered_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            job,
            status: "success",
            triggered_at,
            completed_at: chrono::Utc::now(),
            target: target.into(),
            error: None,
        }
    }

    pub fn failed(job: &'static str, target: impl Into<String>, triggered_at: chrono::DateTime<chrono::Utc>, error: String) -> Self {
        Self {
            job,
            status: "failed",
            triggered_at,
            completed_at: chrono::Utc::now(),
            target: target.into(),
            error: Some(error),
        }
    }
}

pub struct SchedulerHistory {
    path: PathBuf,
    events: RwLock<Vec<SchedulerEvent>>,
}

impl SchedulerHistory {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let events = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| SchedulerError::History {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(SchedulerError::Io {
                    path: path.clone(),
                    source,
                });
            }
        };
        Ok(Self {
            path,
            events: RwLock::new(events),
        })
    }

    pub async fn record(&self, event: SchedulerEvent) {
        let mut events = self.events.write().await;
        events.push(event);
        if events.len() > MAX_EVENTS {
            let excess = events.len() - MAX_EVENTS;
            events.drain(0..excess);
        }
        if let Err(e) = self.persist(&events).await {
            tracing::warn!(error = %e, "failed to persist scheduler history, continuing in-memory");
        }
    }

    pub async fn recent(&self, n: usize) -> Vec<SchedulerEvent> {
        let events = self.events.read().await;
        events.iter().rev().take(n).cloned().collect()
    }

    async fn persist(&self, events: &[SchedulerEvent]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| SchedulerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = serde_json::to_vec_pretty(events).expect("SchedulerEvent always serializes");
        tokio::fs::write(&self.path, payload).await.map_err(|source| SchedulerError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_reads_back_the_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler_history.json");
        let history = SchedulerHistory::open(&path).await.unwrap();

        let now = chrono::Utc::now();
        history.record(SchedulerEvent::success("daily", "2025-02-16", now)).await;
        history.record(SchedulerEvent::failed("weekly", "2025-W07", now, "boom".into())).await;

        let recent = history.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].job, "weekly");
        assert_eq!(recent[0].error.as_deref(), Some("boom"));

        let reopened = SchedulerHistory::open(&path).await.unwrap();
        assert_eq!(reopened.recent(10).await.len(), 2);
    }

    #[tokio::test]
    async fn caps_history_length() {
        let dir = tempfile::tempdir().unwrap();
        let history = SchedulerHistory::open(dir.path().join("h.json")).await.unwrap();
        for _ in 0..(MAX_EVENTS + 10) {
            history.record(SchedulerEvent::success("daily", "2025-02-16", chrono::Utc::now())).await;
        }
        assert_eq!(history.recent(MAX_EVENTS + 10).await.len(), MAX_EVENTS);
    }
}
