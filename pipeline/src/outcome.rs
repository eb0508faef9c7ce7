//! Per-date outcome reporting shared by every range operation (fetch,
//! normalize, summarize, and the orchestrator's merge of all three).

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DateOutcome {
    pub date: String,
    pub status: OutcomeStatus,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub error: Option<String>,
    /// Set when this date's search results hit the upstream 1000-result
    /// page cap — the fetched bucket may be missing matches (§4.9 step 2 /
    /// Open Question (a)). Never set by normalize/summarize outcomes.
    #[serde(default)]
    pub truncated: bool,
}

impl DateOutcome {
    pub fn success(date: &str, path: Option<PathBuf>) -> Self {
        Self {
            date: date.to_string(),
            status: OutcomeStatus::Success,
            path,
            error: None,
            truncated: false,
        }
    }

    pub fn skipped(date: &str) -> Self {
        Self {
            date: date.to_string(),
            status: OutcomeStatus::Skipped,
            path: None,
            error: None,
            truncated: false,
        }
    }

    pub fn failed(date: &str, error: impl Into<String>) -> Self {
        Self {
            date: date.to_string(),
            status: OutcomeStatus::Failed,
            path: None,
            error: Some(error.into()),
            truncated: false,
        }
    }

    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

/// Merges per-phase outcomes for the same date into one overall outcome
/// (§4.12's range merge rule): any failed phase fails the date; all
/// skipped means skipped; otherwise success, carrying the last
/// successful phase's path forward.
pub fn merge_phase_outcomes(phases: &[DateOutcome]) -> DateOutcome {
    let date = phases
        .first()
        .map(|o| o.date.clone())
        .unwrap_or_default();

    if let Some(failed) = phases.iter().find(|o| o.is_failed()) {
        return DateOutcome::failed(&date, failed.error.clone().unwrap_or_default());
    }
    if phases.iter().all(|o| o.status == OutcomeStatus::Skipped) {
        return DateOutcome::skipped(&date);
    }
    let path = phases.iter().rev().find_map(|o| o.path.clone());
    DateOutcome::success(&date, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_failure_fails_the_merge() {
        let phases = vec![
            DateOutcome::success("2025-02-16", None),
            DateOutcome::failed("2025-02-16", "boom"),
            DateOutcome::skipped("2025-02-16"),
        ];
        let merged = merge_phase_outcomes(&phases);
        assert!(merged.is_failed());
    }

    #[test]
    fn all_skipped_stays_skipped() {
        let phases = vec![DateOutcome::skipped("2025-02-16"), DateOutcome::skipped("2025-02-16")];
        let merged = merge_phase_outcomes(&phases);
        assert_eq!(merged.status, OutcomeStatus::Skipped);
    }

    #[test]
    fn mixed_success_and_skip_is_success_with_last_path() {
        let phases = vec![
            DateOutcome::skipped("2025-02-16"),
            DateOutcome::success("2025-02-16", Some(PathBuf::from("a"))),
            DateOutcome::success("2025-02-16", Some(PathBuf::from("b"))),
        ];
        let merged = merge_phase_outcomes(&phases);
        assert!(merged.is_success());
        assert_eq!(merged.path, Some(PathBuf::from("b")));
    }
}
