//! Best-effort relational and vector sinks (§9 Design Notes). The
//! filesystem under `data/` remains the pipeline's source of truth; this
//! crate mirrors activities, stats and summaries into Postgres and Qdrant
//! when they're configured and reachable, and silently does nothing when
//! they aren't. No method here returns an error to its caller: failures
//! are logged and swallowed at the sink boundary, per the orchestrator's
//! "storage exceptions never abort the pipeline" rule.

pub mod config;
pub mod errors;
pub mod relational_sink;
pub mod vector_sink;

use services::uuid::stable_uuid;
use tracing::warn;

pub use config::StorageConfig;
pub use errors::StorageError;
use relational_sink::RelationalSink;
use vector_sink::VectorSink;

pub struct StorageSink {
    relational: Option<RelationalSink>,
    vector: Option<VectorSink>,
}

impl StorageSink {
    /// Connects both sinks from configuration. Never fails: a sink that
    /// can't be reached is left as `None` and subsequent writes to it are
    /// no-ops.
    pub async fn connect(cfg: &StorageConfig) -> Self {
        let relational = match &cfg.database_url {
            Some(url) => RelationalSink::connect(url).await,
            None => None,
        };
        let vector = match &cfg.qdrant_url {
            Some(url) => VectorSink::connect(url, cfg.qdrant_api_key.as_deref(), &cfg.qdrant_collection).await,
            None => None,
        };
        Self { relational, vector }
    }

    /// A sink with both backends disabled, for tests and CLI invocations
    /// that never configured `DATABASE_URL`/`QDRANT_URL`.
    pub fn disabled() -> Self {
        Self {
            relational: None,
            vector: None,
        }
    }

    pub async fn store_activities(&self, date: &str, activities: &serde_json::Value) {
        self.mirror("activities", date, activities, &format!("activities for {date}")).await;
    }

    pub async fn store_stats(&self, date: &str, stats: &serde_json::Value) {
        self.mirror("stats", date, stats, &format!("stats for {date}")).await;
    }

    pub async fn store_summary(&self, kind: &str, key: &str, markdown: &str) {
        let payload = serde_json::json!({ "kind": kind, "key": key, "markdown": markdown });
        self.mirror(&format!("summary:{kind}"), key, &payload, markdown).await;
    }

    async fn mirror(&self, record_kind: &str, key: &str, payload: &serde_json::Value, text_for_vector: &str) {
        if let Some(relational) = &self.relational {
            if let Err(e) = relational.upsert(record_kind, key, payload).await {
                warn!(error = %e, kind = record_kind, key, "relational sink write failed, continuing");
            }
        }
        if let Some(vector) = &self.vector {
            let id = stable_uuid(&format!("{record_kind}:{key}")).as_u128() as u64;
            if let Err(e) = vector.upsert(id, text_for_vector, payload).await {
                warn!(error = %e, kind = record_kind, key, "vector sink write failed, continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_sink_is_a_harmless_no_op() {
        let sink = StorageSink::disabled();
        sink.store_activities("2025-02-16", &serde_json::json!([])).await;
        sink.store_stats("2025-02-16", &serde_json::json!({})).await;
        sink.store_summary("daily", "2025-02-16", "recap").await;
    }
}
