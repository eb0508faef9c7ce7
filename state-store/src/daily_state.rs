use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::errors::Result;
use crate::file_store::{load_or_default, save};

pub const PHASE_FETCH: &str = "fetch";
pub const PHASE_NORMALIZE: &str = "normalize";
pub const PHASE_SUMMARIZE: &str = "summarize";

type PerDate = HashMap<String, HashMap<String, DateTime<Utc>>>;

/// Per-date, per-phase timestamps driving cascade reprocessing: a phase is
/// stale whenever its upstream phase's timestamp is newer than its own.
pub struct DailyStateStore {
    path: PathBuf,
    data: RwLock<PerDate>,
}

impl DailyStateStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = load_or_default(&path).await?;
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub async fn get_timestamp(&self, phase: &str, date_str: &str) -> Option<DateTime<Utc>> {
        self.data
            .read()
            .await
            .get(date_str)
            .and_then(|phases| phases.get(phase))
            .copied()
    }

    pub async fn set_timestamp(
        &self,
        phase: &str,
        date_str: &str,
        ts: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let ts = ts.unwrap_or_else(Utc::now);
        {
            let mut data = self.data.write().await;
            data.entry(date_str.to_string())
                .or_default()
                .insert(phase.to_string(), ts);
        }
        tracing::debug!(phase, date_str, %ts, "set_timestamp");
        let snapshot = self.data.read().await;
        save(&self.path, &*snapshot).await
    }

    /// Stale if no record, or the fetch ran on or before the target day — a
    /// same-day fetch is always considered incomplete and re-run.
    pub async fn is_fetch_stale(&self, date_str: &str) -> bool {
        let Some(fetch_ts) = self.get_timestamp(PHASE_FETCH, date_str).await else {
            return true;
        };
        let Ok(target) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            return true;
        };
        fetch_ts.date_naive() <= target
    }

    pub async fn is_normalize_stale(&self, date_str: &str) -> bool {
        let Some(norm_ts) = self.get_timestamp(PHASE_NORMALIZE, date_str).await else {
            return true;
        };
        let Some(fetch_ts) = self.get_timestamp(PHASE_FETCH, date_str).await else {
            return true;
        };
        fetch_ts > norm_ts
    }

    pub async fn is_summarize_stale(&self, date_str: &str) -> bool {
        let Some(summ_ts) = self.get_timestamp(PHASE_SUMMARIZE, date_str).await else {
            return true;
        };
        let Some(norm_ts) = self.get_timestamp(PHASE_NORMALIZE, date_str).await else {
            return true;
        };
        norm_ts > summ_ts
    }

    pub async fn stale_dates(&self, phase: &str, dates: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        for d in dates {
            let stale = match phase {
                PHASE_FETCH => self.is_fetch_stale(d).await,
                PHASE_NORMALIZE => self.is_normalize_stale(d).await,
                PHASE_SUMMARIZE => self.is_summarize_stale(d).await,
                other => {
                    tracing::warn!(phase = other, "unknown staleness phase, treating as stale");
                    true
                }
            };
            if stale {
                out.push(d.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_record_is_stale_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let store = DailyStateStore::open(dir.path().join("daily_state.json"))
            .await
            .unwrap();
        assert!(store.is_fetch_stale("2025-02-16").await);
        assert!(store.is_normalize_stale("2025-02-16").await);
        assert!(store.is_summarize_stale("2025-02-16").await);
    }

    #[tokio::test]
    async fn normalize_stale_when_fetch_newer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_state.json");
        let store = DailyStateStore::open(&path).await.unwrap();

        let t1 = DateTime::parse_from_rfc3339("2025-02-16T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let t2 = DateTime::parse_from_rfc3339("2025-02-16T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        store
            .set_timestamp(PHASE_NORMALIZE, "2025-02-16", Some(t1))
            .await
            .unwrap();
        store
            .set_timestamp(PHASE_FETCH, "2025-02-16", Some(t2))
            .await
            .unwrap();

        assert!(store.is_normalize_stale("2025-02-16").await);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_state.json");
        {
            let store = DailyStateStore::open(&path).await.unwrap();
            store
                .set_timestamp(PHASE_FETCH, "2025-02-16", None)
                .await
                .unwrap();
        }
        let reopened = DailyStateStore::open(&path).await.unwrap();
        assert!(reopened.get_timestamp(PHASE_FETCH, "2025-02-16").await.is_some());
    }
}
