use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::Result;
use crate::file_store::{load_or_default, save};

/// A calendar month's worth of search results, the unit at which a range
/// fetch caches progress so an interrupted backfill can resume mid-chunk
/// instead of re-querying months already paid for.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChunkProgress {
    pub chunk_key: String,
    #[serde(default)]
    pub completed_dates: Vec<String>,
    /// Raw search-result items for the chunk's whole `updated:since..until`
    /// window, bucketed by source so a resumed chunk can skip all three
    /// searches at once rather than just one.
    #[serde(default)]
    pub prs: Vec<Value>,
    #[serde(default)]
    pub commits: Vec<Value>,
    #[serde(default)]
    pub issues: Vec<Value>,
    pub done: bool,
    /// Set when any of the chunk's three searches hit the upstream
    /// 1000-result page cap — the bucket may be missing matches past
    /// page 10 (SPEC_FULL.md §4.9 step 2 / Open Question (a)).
    #[serde(default)]
    pub truncated: bool,
}

/// Per-chunk resumable cache keyed by `chunk_key` (typically `YYYY-MM`).
/// One JSON file per chunk under `state/fetch_progress/{chunk_key}.json`.
pub struct FetchProgressStore {
    dir: PathBuf,
    cache: RwLock<std::collections::HashMap<String, ChunkProgress>>,
}

impl FetchProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(std::collections::HashMap::new()),
        }
    }

    fn chunk_path(&self, chunk_key: &str) -> PathBuf {
        self.dir.join(format!("{chunk_key}.json"))
    }

    pub async fn load_chunk(&self, chunk_key: &str) -> Result<ChunkProgress> {
        if let Some(cached) = self.cache.read().await.get(chunk_key).cloned() {
            return Ok(cached);
        }
        let loaded: ChunkProgress = load_or_default(&self.chunk_path(chunk_key)).await?;
        let loaded = if loaded.chunk_key.is_empty() {
            ChunkProgress {
                chunk_key: chunk_key.to_string(),
                ..loaded
            }
        } else {
            loaded
        };
        self.cache
            .write()
            .await
            .insert(chunk_key.to_string(), loaded.clone());
        Ok(loaded)
    }

    pub async fn save_chunk(&self, chunk: ChunkProgress) -> Result<()> {
        let path = self.chunk_path(&chunk.chunk_key);
        save(&path, &chunk).await?;
        self.cache
            .write()
            .await
            .insert(chunk.chunk_key.clone(), chunk);
        Ok(())
    }

    pub async fn is_date_complete(&self, chunk_key: &str, date_str: &str) -> Result<bool> {
        let chunk = self.load_chunk(chunk_key).await?;
        Ok(chunk.completed_dates.iter().any(|d| d == date_str))
    }

    pub async fn mark_date_complete(&self, chunk_key: &str, date_str: &str) -> Result<()> {
        let mut chunk = self.load_chunk(chunk_key).await?;
        if !chunk.completed_dates.iter().any(|d| d == date_str) {
            chunk.completed_dates.push(date_str.to_string());
        }
        self.save_chunk(chunk).await
    }

    /// Drops a chunk's cached search results once every date in it has
    /// been processed, so a finished backfill doesn't keep paying disk
    /// space for data it will never resume from.
    pub async fn clear_chunk(&self, chunk_key: &str) -> Result<()> {
        self.cache.write().await.remove(chunk_key);
        let path = self.chunk_path(chunk_key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|source| crate::errors::StateError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn marks_and_checks_completion() {
        let dir = tempfile::tempdir().unwrap();
        let store = FetchProgressStore::new(dir.path());

        assert!(!store.is_date_complete("2025-02", "2025-02-16").await.unwrap());
        store.mark_date_complete("2025-02", "2025-02-16").await.unwrap();
        assert!(store.is_date_complete("2025-02", "2025-02-16").await.unwrap());
    }

    #[tokio::test]
    async fn persists_across_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FetchProgressStore::new(dir.path());
            store.mark_date_complete("2025-02", "2025-02-16").await.unwrap();
        }
        let reopened = FetchProgressStore::new(dir.path());
        assert!(reopened.is_date_complete("2025-02", "2025-02-16").await.unwrap());
    }
}
