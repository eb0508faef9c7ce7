use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{Result, StateError};

/// Loads a JSON-backed struct from disk, or `T::default()` if the file does
/// not exist yet — the same "lazily materialize on first touch" shape as the
/// teacher's bundle cache.
pub async fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StateError::Parse {
            path: path.display().to_string(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(source) => Err(StateError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Pretty-prints and persists immediately, creating parent directories as
/// needed. Every mutating call on a store ends with this.
pub async fn save<T: Serialize + Sync>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StateError::Io {
                path: parent.display().to_string(),
                source,
            })?;
    }
    let payload = serde_json::to_vec_pretty(data).map_err(|source| StateError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    tokio::fs::write(path, payload)
        .await
        .map_err(|source| StateError::Io {
            path: path.display().to_string(),
            source,
        })
}

pub fn canonical_parent(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}
