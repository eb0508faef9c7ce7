//! `Job` (§3 Data Model, §6): the only contract the pipeline core
//! promises the surrounding (out-of-scope) HTTP API -- create a job,
//! flip it to `Running` when it starts, and leave it `Completed` with a
//! result or `Failed` with an error when it's done. Jobs are
//! process-lifetime only; nothing here is persisted to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Accepted,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn new(job_id: String) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Accepted,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self, result: String) {
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.updated_at = Utc::now();
    }
}
