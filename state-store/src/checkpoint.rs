use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::RwLock;

use crate::errors::Result;
use crate::file_store::{load_or_default, save};

pub const LAST_FETCH_DATE: &str = "last_fetch_date";
pub const LAST_NORMALIZE_DATE: &str = "last_normalize_date";
pub const LAST_SUMMARIZE_DATE: &str = "last_summarize_date";

/// `{last_fetch_date, last_normalize_date, last_summarize_date}`. Writes are
/// monotonic: a key only moves forward, never backward.
pub struct CheckpointStore {
    path: PathBuf,
    data: RwLock<HashMap<String, String>>,
}

impl CheckpointStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = load_or_default(&path).await?;
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.data.read().await.get(key).cloned()
    }

    /// Only writes when `date_str` compares strictly greater than the
    /// currently stored value (or nothing is stored yet).
    pub async fn update(&self, key: &str, date_str: &str) -> Result<()> {
        let should_write = {
            let data = self.data.read().await;
            match data.get(key) {
                Some(current) => date_str > current.as_str(),
                None => true,
            }
        };
        if !should_write {
            return Ok(());
        }
        {
            let mut data = self.data.write().await;
            data.insert(key.to_string(), date_str.to_string());
        }
        let snapshot = self.data.read().await;
        save(&self.path, &*snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().join("checkpoints.json"))
            .await
            .unwrap();

        store.update(LAST_FETCH_DATE, "2025-02-16").await.unwrap();
        store.update(LAST_FETCH_DATE, "2025-02-10").await.unwrap();

        assert_eq!(store.get(LAST_FETCH_DATE).await.as_deref(), Some("2025-02-16"));
    }
}
