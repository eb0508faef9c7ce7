//! Orchestrator (§4.12): runs fetch → normalize → summarize as a single
//! daily pipeline, or the three `*_range` phases in sequence over a
//! backfill window, merging per-date outcomes at the end.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::error;

use crate::errors::StepFailedError;
use crate::fetcher::Fetcher;
use crate::model::SourceType;
use crate::normalizer::Normalizer;
use crate::outcome::DateOutcome;
use crate::summarizer::Summarizer;

pub struct Orchestrator {
    fetcher: Fetcher,
    normalizer: Normalizer,
    summarizer: Summarizer,
}

impl Orchestrator {
    pub fn new(fetcher: Fetcher, normalizer: Normalizer, summarizer: Summarizer) -> Self {
        Self {
            fetcher,
            normalizer,
            summarizer,
        }
    }

    /// Strict sequential fetch → normalize → summarize for one date. The
    /// first failing step wraps as `StepFailedError` and downstream steps
    /// never run.
    pub async fn run_daily(&self, date: &str, types: Option<&[SourceType]>) -> Result<DateOutcome, StepFailedError> {
        self.run_daily_with(date, types, true).await
    }

    /// Same as `run_daily`, but `enrich=false` suppresses the normalize
    /// phase's LLM call (§6 `--no-enrich`).
    pub async fn run_daily_with(&self, date: &str, types: Option<&[SourceType]>, enrich: bool) -> Result<DateOutcome, StepFailedError> {
        self.fetcher.fetch(date, types).await.map_err(|e| wrap(date, "fetch", e.to_string()))?;
        self.normalizer.normalize_with(date, enrich).await.map_err(|e| wrap(date, "normalize", e.to_string()))?;
        let summary_path = self.summarizer.daily(date).await.map_err(|e| wrap(date, "summarize", e.to_string()))?;
        Ok(DateOutcome::success(date, Some(summary_path)))
    }

    /// Calls the three `*_range` methods one after another (not
    /// interleaved), then merges their per-date outcomes: any failed
    /// phase fails the date, all-skipped stays skipped, else success.
    pub async fn run_range(
        &self,
        since: NaiveDate,
        until: NaiveDate,
        force: bool,
        types: Option<&[SourceType]>,
        max_workers: usize,
        batch: bool,
        enrich: bool,
    ) -> Vec<DateOutcome> {
        let fetch_outcomes = self.fetcher.fetch_range(since, until, types, force, max_workers).await;
        let normalize_outcomes = self
            .normalizer
            .normalize_range(since, until, force, max_workers, batch, enrich)
            .await;
        let summarize_outcomes = self.summarizer.daily_range(since, until, force, max_workers).await;

        merge_range_outcomes(&fetch_outcomes, &normalize_outcomes, &summarize_outcomes)
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }
}

fn wrap(date: &str, step: &'static str, cause: String) -> StepFailedError {
    error!(date, step, %cause, "pipeline step failed");
    StepFailedError { step, cause }
}

fn merge_range_outcomes(fetch: &[DateOutcome], normalize: &[DateOutcome], summarize: &[DateOutcome]) -> Vec<DateOutcome> {
    let mut by_date: HashMap<String, Vec<(&'static str, DateOutcome)>> = HashMap::new();
    for (phase, outcomes) in [("fetch", fetch), ("normalize", normalize), ("summarize", summarize)] {
        for outcome in outcomes {
            by_date.entry(outcome.date.clone()).or_default().push((phase, outcome.clone()));
        }
    }

    let mut dates: Vec<&String> = by_date.keys().collect();
    dates.sort();

    dates
        .into_iter()
        .map(|date| {
            let phases = &by_date[date];
            if let Some((phase, failed)) = phases.iter().find(|(_, o)| o.is_failed()) {
                return DateOutcome::failed(date, format!("Pipeline failed at '{phase}': {}", failed.error.clone().unwrap_or_default()));
            }
            if phases.iter().all(|(_, o)| matches!(o.status, crate::outcome::OutcomeStatus::Skipped)) {
                return DateOutcome::skipped(date);
            }
            let path = phases
                .iter()
                .find(|(phase, _)| *phase == "summarize")
                .and_then(|(_, o)| o.path.clone());
            DateOutcome::success(date, path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_failed_phase_fails_the_merge() {
        let fetch = vec![DateOutcome::success("2025-02-16", None)];
        let normalize = vec![DateOutcome::failed("2025-02-16", "boom")];
        let summarize = vec![DateOutcome::skipped("2025-02-16")];
        let merged = merge_range_outcomes(&fetch, &normalize, &summarize);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_failed());
        assert!(merged[0].error.as_deref().unwrap().contains("normalize"));
    }

    #[test]
    fn all_skipped_stays_skipped() {
        let fetch = vec![DateOutcome::skipped("2025-02-16")];
        let normalize = vec![DateOutcome::skipped("2025-02-16")];
        let summarize = vec![DateOutcome::skipped("2025-02-16")];
        let merged = merge_range_outcomes(&fetch, &normalize, &summarize);
        assert_eq!(merged[0].status, crate::outcome::OutcomeStatus::Skipped);
    }

    #[test]
    fn success_carries_the_summary_path() {
        let fetch = vec![DateOutcome::success("2025-02-16", None)];
        let normalize = vec![DateOutcome::success("2025-02-16", None)];
        let summarize = vec![DateOutcome::success("2025-02-16", Some(std::path::PathBuf::from("x.md")))];
        let merged = merge_range_outcomes(&fetch, &normalize, &summarize);
        assert!(merged[0].is_success());
        assert_eq!(merged[0].path, Some(std::path::PathBuf::from("x.md")));
    }
}
