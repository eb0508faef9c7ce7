use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::errors::Result;
use crate::file_store::{load_or_default, save};

const DEFAULT_MAX_RETRIES: u32 = 5;

static STATUS_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:Client error|Server error)\s+(\d{3})").unwrap());

/// 404 / non-rate-limit 403 / 422 are disqualified from automatic retry —
/// nothing about running the same request again would change the outcome.
pub fn is_permanent_error(error_msg: &str) -> bool {
    if error_msg.to_lowercase().contains("rate limit") {
        return false;
    }
    STATUS_CODE_RE
        .captures(error_msg)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .is_some_and(|status| matches!(status, 404 | 403 | 422))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub phase: String,
    pub attempts: u32,
    pub last_error: String,
    pub last_attempt: DateTime<Utc>,
    pub first_failure: DateTime<Utc>,
    pub permanent: bool,
}

type FailureMap = HashMap<String, FailureEntry>;

/// Tracks per-date failures with retry metadata so a bulk backfill over
/// thousands of dates can resume sensibly instead of starting from scratch.
pub struct FailedDateStore {
    path: PathBuf,
    max_retries: u32,
    data: RwLock<FailureMap>,
}

impl FailedDateStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_max_retries(path, DEFAULT_MAX_RETRIES).await
    }

    pub async fn open_with_max_retries(path: impl Into<PathBuf>, max_retries: u32) -> Result<Self> {
        let path = path.into();
        let data = load_or_default(&path).await?;
        Ok(Self {
            path,
            max_retries,
            data: RwLock::new(data),
        })
    }

    pub async fn record_failure(
        &self,
        date_str: &str,
        phase: &str,
        error: &str,
        permanent: bool,
    ) -> Result<()> {
        let now = Utc::now();
        {
            let mut data = self.data.write().await;
            data.entry(date_str.to_string())
                .and_modify(|entry| {
                    entry.attempts += 1;
                    entry.last_error = error.to_string();
                    entry.last_attempt = now;
                    if permanent {
                        entry.permanent = true;
                    }
                })
                .or_insert_with(|| FailureEntry {
                    phase: phase.to_string(),
                    attempts: 1,
                    last_error: error.to_string(),
                    last_attempt: now,
                    first_failure: now,
                    permanent,
                });
        }
        let snapshot = self.data.read().await;
        save(&self.path, &*snapshot).await
    }

    pub async fn record_success(&self, date_str: &str) -> Result<()> {
        let removed = {
            let mut data = self.data.write().await;
            data.remove(date_str).is_some()
        };
        if removed {
            let snapshot = self.data.read().await;
            save(&self.path, &*snapshot).await?;
        }
        Ok(())
    }

    pub async fn get_entry(&self, date_str: &str) -> Option<FailureEntry> {
        self.data.read().await.get(date_str).cloned()
    }

    pub async fn retryable_dates(&self, candidates: &[String]) -> Vec<String> {
        let data = self.data.read().await;
        candidates
            .iter()
            .filter(|d| {
                data.get(*d)
                    .is_some_and(|e| !e.permanent && e.attempts < self.max_retries)
            })
            .cloned()
            .collect()
    }

    pub async fn exhausted_dates(&self) -> Vec<String> {
        let data = self.data.read().await;
        let mut out: Vec<String> = data
            .iter()
            .filter(|(_, e)| e.permanent || e.attempts >= self.max_retries)
            .map(|(d, _)| d.clone())
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_permanent_errors() {
        assert!(is_permanent_error("Client error 404: not found"));
        assert!(is_permanent_error("Client error 422: validation"));
        assert!(!is_permanent_error("Rate limit exceeded after 7 retries"));
        assert!(!is_permanent_error("Server error 503: timeout"));
    }

    #[tokio::test]
    async fn retryable_and_exhausted_are_disjoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = FailedDateStore::open_with_max_retries(dir.path().join("failed.json"), 2)
            .await
            .unwrap();

        store
            .record_failure("2025-02-16", "fetch", "Server error 503", false)
            .await
            .unwrap();
        store
            .record_failure("2025-02-16", "fetch", "Server error 503", false)
            .await
            .unwrap();
        store
            .record_failure("2025-02-17", "fetch", "Client error 404", true)
            .await
            .unwrap();

        let candidates = vec!["2025-02-16".to_string(), "2025-02-17".to_string()];
        let retryable = store.retryable_dates(&candidates).await;
        let exhausted = store.exhausted_dates().await;

        assert!(retryable.iter().all(|d| !exhausted.contains(d)));
        assert!(exhausted.contains(&"2025-02-16".to_string()));
        assert!(exhausted.contains(&"2025-02-17".to_string()));
    }
}
