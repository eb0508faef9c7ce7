//! Postgres-backed mirror of the filesystem records (§4.12, §9). The
//! filesystem under `data/` is the pipeline's source of truth; this sink is
//! a queryable copy for anything downstream that wants SQL instead of
//! walking JSON files, and it is allowed to lag or be absent entirely.

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::{Result, StorageError};

const CONNECT_RETRIES: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct RelationalSink {
    pool: PgPool,
}

impl RelationalSink {
    /// Connects and runs the one-table schema migration. Returns `None`
    /// (rather than an error) on any failure, so callers can treat a
    /// missing `DATABASE_URL` and an unreachable database the same way:
    /// the sink is simply disabled.
    pub async fn connect(database_url: &str) -> Option<Self> {
        let mut last_err = None;
        for attempt in 1..=CONNECT_RETRIES {
            match PgPoolOptions::new().max_connections(5).acquire_timeout(Duration::from_secs(5)).connect(database_url).await {
                Ok(pool) => match Self::new(pool).await {
                    Ok(sink) => {
                        info!("relational sink connected");
                        return Some(sink);
                    }
                    Err(e) => last_err = Some(e),
                },
                Err(e) => last_err = Some(StorageError::Sqlx(e)),
            }
            if attempt < CONNECT_RETRIES {
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
        }
        warn!(error = ?last_err, "relational sink disabled: could not connect");
        None
    }

    async fn new(pool: PgPool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS work_recap_records (
                kind TEXT NOT NULL,
                record_key TEXT NOT NULL,
                payload JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (kind, record_key)
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    pub async fn upsert(&self, kind: &str, key: &str, payload: &serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO work_recap_records (kind, record_key, payload, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (kind, record_key)
            DO UPDATE SET payload = EXCLUDED.payload, updated_at = now()
            "#,
        )
        .bind(kind)
        .bind(key)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        debug!(kind, key, "relational sink upsert");
        Ok(())
    }

    pub async fn fetch(&self, kind: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let row: Option<PgRow> = sqlx::query("SELECT payload FROM work_recap_records WHERE kind = $1 AND record_key = $2")
            .bind(kind)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<serde_json::Value, _>("payload")))
    }
}
