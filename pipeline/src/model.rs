//! Canonical data model (§3): raw entities fetched from the hosting API,
//! the normalized `Activity` stream derived from them, and the per-day
//! `DailyStats` rollup. Every type round-trips through JSON identically —
//! these are the exact shapes persisted under `data/raw` and
//! `data/normalized`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------
// Raw entities
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrFile {
    pub filename: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub patch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrComment {
    pub author: String,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub line: Option<u64>,
    #[serde(default)]
    pub diff_hunk: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrReview {
    pub author: String,
    pub state: ReviewState,
    #[serde(default)]
    pub body: String,
    pub submitted_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrRaw {
    pub repo: String,
    pub number: u64,
    pub html_url: String,
    pub api_url: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub state: String,
    #[serde(default)]
    pub is_merged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    pub author: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub files: Vec<PrFile>,
    #[serde(default)]
    pub comments: Vec<PrComment>,
    #[serde(default)]
    pub reviews: Vec<PrReview>,
}

impl PrRaw {
    pub fn additions(&self) -> u64 {
        self.files.iter().map(|f| f.additions).sum()
    }

    pub fn deletions(&self) -> u64 {
        self.files.iter().map(|f| f.deletions).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRaw {
    pub sha: String,
    pub repo: String,
    pub html_url: String,
    pub api_url: String,
    pub message: String,
    pub author: String,
    pub committed_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

impl CommitRaw {
    pub fn additions(&self) -> u64 {
        self.files.iter().map(|f| f.additions).sum()
    }

    pub fn deletions(&self) -> u64 {
        self.files.iter().map(|f| f.deletions).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRaw {
    pub repo: String,
    pub number: u64,
    pub html_url: String,
    pub api_url: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub author: String,
    #[serde(default)]
    pub comments: Vec<PrComment>,
}

// ---------------------------------------------------------------------
// Normalized activity stream
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    PrAuthored,
    PrReviewed,
    PrCommented,
    Commit,
    IssueAuthored,
    IssueCommented,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::PrAuthored => "PR_AUTHORED",
            ActivityKind::PrReviewed => "PR_REVIEWED",
            ActivityKind::PrCommented => "PR_COMMENTED",
            ActivityKind::Commit => "COMMIT",
            ActivityKind::IssueAuthored => "ISSUE_AUTHORED",
            ActivityKind::IssueCommented => "ISSUE_COMMENTED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentContext {
    pub path: String,
    pub line: Option<u64>,
    pub diff_hunk: Option<String>,
    pub body: String,
}

/// A single user-attributable event on a calendar day. `date` is always the
/// first 10 characters of `timestamp` — see `Activity::invariants_hold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub date: String,
    pub source: String,
    pub kind: ActivityKind,
    pub external_id: u64,
    pub timestamp: DateTime<Utc>,
    pub repo: String,
    pub title: String,
    pub url: String,
    pub auto_summary: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub review_bodies: Vec<String>,
    #[serde(default)]
    pub comment_bodies: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub file_patches: HashMap<String, String>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub evidence_urls: Vec<String>,
    #[serde(default)]
    pub comment_contexts: Vec<CommentContext>,
    #[serde(default)]
    pub change_summary: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
}

impl Activity {
    /// `date` must always be the activity timestamp's calendar day — every
    /// constructor below derives it this way rather than taking it as an
    /// independent argument.
    pub fn date_matches_timestamp(&self) -> bool {
        self.timestamp.format("%Y-%m-%d").to_string() == self.date
    }
}

// ---------------------------------------------------------------------
// Daily statistics
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrSummary {
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSummary {
    pub repo: String,
    pub sha: String,
    pub message: String,
    pub url: String,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSummary {
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubStats {
    #[serde(default)]
    pub authored_count: u64,
    #[serde(default)]
    pub reviewed_count: u64,
    #[serde(default)]
    pub commented_count: u64,
    #[serde(default)]
    pub commit_count: u64,
    #[serde(default)]
    pub issue_authored_count: u64,
    #[serde(default)]
    pub issue_commented_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: String,
    #[serde(default)]
    pub github: GithubStats,
    #[serde(default)]
    pub total_additions: u64,
    #[serde(default)]
    pub total_deletions: u64,
    #[serde(default)]
    pub repos_touched: Vec<String>,
    #[serde(default)]
    pub authored_prs: Vec<PrSummary>,
    #[serde(default)]
    pub reviewed_prs: Vec<PrSummary>,
    #[serde(default)]
    pub commits: Vec<CommitSummary>,
    #[serde(default)]
    pub authored_issues: Vec<IssueSummary>,
}

impl DailyStats {
    pub fn empty(date: &str) -> Self {
        Self {
            date: date.to_string(),
            github: GithubStats::default(),
            total_additions: 0,
            total_deletions: 0,
            repos_touched: Vec::new(),
            authored_prs: Vec::new(),
            reviewed_prs: Vec::new(),
            commits: Vec::new(),
            authored_issues: Vec::new(),
        }
    }
}

/// Requested raw source, used to scope a `fetch`/`fetch_range` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Prs,
    Commits,
    Issues,
}

pub const ALL_SOURCES: [SourceType; 3] = [SourceType::Prs, SourceType::Commits, SourceType::Issues];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_activity_through_json() {
        let activity = Activity {
            date: "2025-02-16".into(),
            source: "github".into(),
            kind: ActivityKind::PrAuthored,
            external_id: 42,
            timestamp: DateTime::parse_from_rfc3339("2025-02-16T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            repo: "acme/widgets".into(),
            title: "Add widget".into(),
            url: "https://github.com/acme/widgets/pull/42".into(),
            auto_summary: "PR_AUTHORED: Add widget (acme/widgets) +10/-2".into(),
            body: "does a thing".into(),
            review_bodies: vec![],
            comment_bodies: vec![],
            files: vec!["src/widget.rs".into()],
            file_patches: HashMap::new(),
            additions: 10,
            deletions: 2,
            labels: vec!["enhancement".into()],
            evidence_urls: vec![],
            comment_contexts: vec![],
            change_summary: None,
            intent: None,
        };
        assert!(activity.date_matches_timestamp());

        let json = serde_json::to_string(&activity).unwrap();
        let restored: Activity = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.date, activity.date);
        assert_eq!(restored.kind, activity.kind);
        assert_eq!(restored.additions, activity.additions);
        assert_eq!(restored.files, activity.files);
    }

    #[test]
    fn daily_stats_round_trips() {
        let mut stats = DailyStats::empty("2025-02-16");
        stats.total_additions = 33;
        stats.repos_touched = vec!["a/b".into(), "c/d".into()];

        let json = serde_json::to_string(&stats).unwrap();
        let restored: DailyStats = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.total_additions, 33);
        assert_eq!(restored.repos_touched, stats.repos_touched);
    }
}
