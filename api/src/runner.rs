//! `JobRunner` (§6): wraps an async invocation of a core pipeline method
//! in the `Accepted -> Running -> Completed|Failed` lifecycle contract.
//! Every `submit_*` method returns the freshly `Accepted` job immediately
//! and drives the actual work on a spawned task -- the (out-of-scope)
//! HTTP layer polls `JobStore::get` to observe progress.

use std::sync::Arc;

use pipeline::{DateOutcome, Orchestrator, Summarizer, SourceType};

use crate::job::Job;
use crate::job_store::JobStore;

#[derive(Clone)]
pub struct JobRunner {
    store: JobStore,
}

impl JobRunner {
    pub fn new(store: JobStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub async fn submit_daily(&self, orchestrator: Arc<Orchestrator>, date: String, types: Option<Vec<SourceType>>) -> Job {
        let job = self.store.create(&format!("daily:{date}")).await;
        let job_id = job.job_id.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            store.set_running(&job_id).await;
            let types_ref = types.as_deref();
            match orchestrator.run_daily(&date, types_ref).await {
                Ok(outcome) => store.set_completed(&job_id, render_outcome(&outcome)).await,
                Err(e) => store.set_failed(&job_id, e.to_string()).await,
            }
        });
        job
    }

    pub async fn submit_range(
        &self,
        orchestrator: Arc<Orchestrator>,
        since: chrono::NaiveDate,
        until: chrono::NaiveDate,
        force: bool,
        types: Option<Vec<SourceType>>,
        max_workers: usize,
        batch: bool,
    ) -> Job {
        let job = self.store.create(&format!("range:{since}:{until}")).await;
        let job_id = job.job_id.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            store.set_running(&job_id).await;
            let types_ref = types.as_deref();
            let outcomes = orchestrator.run_range(since, until, force, types_ref, max_workers, batch, true).await;
            let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
            let failed = outcomes.iter().filter(|o| o.is_failed()).count();
            let skipped = outcomes.len() - succeeded - failed;
            let summary = format!("{succeeded} succeeded / {skipped} skipped / {failed} failed");
            if failed > 0 {
                store.set_failed(&job_id, summary).await;
            } else {
                store.set_completed(&job_id, summary).await;
            }
        });
        job
    }

    pub async fn submit_weekly(&self, summarizer: Arc<Summarizer>, year: i32, week: u32) -> Job {
        let job = self.store.create(&format!("weekly:{year}-W{week:02}")).await;
        self.run_summarizer_job(job.job_id.clone(), async move { summarizer.weekly(year, week).await.map(|p| p.display().to_string()) })
            .await;
        job
    }

    pub async fn submit_monthly(&self, summarizer: Arc<Summarizer>, year: i32, month: u32) -> Job {
        let job = self.store.create(&format!("monthly:{year}-{month:02}")).await;
        self.run_summarizer_job(job.job_id.clone(), async move { summarizer.monthly(year, month).await.map(|p| p.display().to_string()) })
            .await;
        job
    }

    pub async fn submit_yearly(&self, summarizer: Arc<Summarizer>, year: i32) -> Job {
        let job = self.store.create(&format!("yearly:{year}")).await;
        self.run_summarizer_job(job.job_id.clone(), async move { summarizer.yearly(year).await.map(|p| p.display().to_string()) })
            .await;
        job
    }

    pub async fn submit_query(&self, summarizer: Arc<Summarizer>, question: String, months_back: u32) -> Job {
        let job = self.store.create(&format!("query:{question}")).await;
        self.run_summarizer_job(job.job_id.clone(), async move { summarizer.query(&question, months_back).await })
            .await;
        job
    }

    async fn run_summarizer_job<Fut>(&self, job_id: String, work: Fut)
    where
        Fut: std::future::Future<Output = Result<String, pipeline::SummarizeError>> + Send + 'static,
    {
        let store = self.store.clone();
        store.set_running(&job_id).await;
        tokio::spawn(async move {
            match work.await {
                Ok(result) => store.set_completed(&job_id, result).await,
                Err(e) => store.set_failed(&job_id, e.to_string()).await,
            }
        });
    }
}

fn render_outcome(outcome: &DateOutcome) -> String {
    match &outcome.path {
        Some(path) => format!("{}: {}", outcome.date, path.display()),
        None => outcome.date.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_query_flips_through_the_lifecycle_on_success() {
        // Exercises the lifecycle transitions without a real LlmRouter:
        // `run_summarizer_job`'s generic `Fut` accepts any future
        // resolving to the same `Result` shape `Summarizer::query` does.
        let store = JobStore::new();
        let runner = JobRunner::new(store.clone());
        let job = store.create("query:test").await;
        runner
            .run_summarizer_job(job.job_id.clone(), async { Ok("answer".to_string()) })
            .await;
        tokio::task::yield_now().await;
        let updated = store.get(&job.job_id).await.unwrap();
        assert_eq!(updated.result.as_deref(), Some("answer"));
    }
}
