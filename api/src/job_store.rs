//! In-memory job lifecycle store (§3: "Jobs are process-lifetime only").
//! The read path a real HTTP layer would expose over this is out of
//! scope (§1); this crate only owns the map and its mutations.

use std::collections::HashMap;
use std::sync::Arc;

use services::uuid::stable_uuid;
use tokio::sync::RwLock;

use crate::job::{Job, JobStatus};

#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `seed` need not be unique on its own -- a timestamp is folded in so
    /// two jobs submitted with the same description still get distinct
    /// ids.
    pub async fn create(&self, seed: &str) -> Job {
        let job_id = stable_uuid(&format!("{seed}:{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())).to_string();
        let job = Job::new(job_id.clone());
        self.jobs.write().await.insert(job_id, job.clone());
        job
    }

    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn set_running(&self, job_id: &str) {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            job.mark_running();
        }
    }

    pub async fn set_completed(&self, job_id: &str, result: String) {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            job.mark_completed(result);
        }
    }

    pub async fn set_failed(&self, job_id: &str, error: String) {
        if let Some(job) = self.jobs.write().await.get_mut(job_id) {
            job.mark_failed(error);
        }
    }

    pub async fn list_by_status(&self, status: JobStatus) -> Vec<Job> {
        self.jobs.read().await.values().filter(|j| j.status == status).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle_transitions_update_status_and_timestamp() {
        let store = JobStore::new();
        let job = store.create("fetch:2025-02-16").await;
        assert_eq!(job.status, JobStatus::Accepted);

        store.set_running(&job.job_id).await;
        let running = store.get(&job.job_id).await.unwrap();
        assert_eq!(running.status, JobStatus::Running);

        store.set_completed(&job.job_id, "ok".into()).await;
        let done = store.get(&job.job_id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.result.as_deref(), Some("ok"));
        assert!(done.updated_at >= running.updated_at);
    }

    #[tokio::test]
    async fn failed_jobs_carry_their_error() {
        let store = JobStore::new();
        let job = store.create("normalize:2025-02-16").await;
        store.set_failed(&job.job_id, "boom".into()).await;
        let failed = store.get(&job.job_id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn unknown_job_id_is_none() {
        let store = JobStore::new();
        assert!(store.get("does-not-exist").await.is_none());
    }
}
