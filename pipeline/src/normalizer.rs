//! Normalizer Service (§4.10): raw → canonical `Activity` stream + `DailyStats`,
//! with optional single-call or batch LLM enrichment.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use ai_llm_service::BatchItem;
use llm_router::{ChatOptions, LlmRouter};
use state_store::{CheckpointStore, DailyStateStore, LAST_NORMALIZE_DATE};
use storage::StorageSink;

use crate::errors::{NormalizeError, NormalizeResult};
use crate::model::{
    Activity, ActivityKind, CommentContext, CommitRaw, CommitSummary, DailyStats, GithubStats, IssueRaw, IssueSummary,
    PrRaw, PrSummary,
};
use crate::noise::logins_match;
use crate::outcome::DateOutcome;
use crate::paths;

const ENRICH_SYSTEM_PROMPT: &str = "You are a terse engineering log assistant. \
For each numbered activity you are given, produce a one-sentence `change_summary` \
(what changed) and a short `intent` phrase (why, if inferable, else \"unspecified\"). \
Respond with nothing but a JSON array of objects shaped \
`{\"index\": <int>, \"change_summary\": <string>, \"intent\": <string>}`, one entry \
per activity, in the same order you received them.\n<!-- SPLIT -->";

pub struct Normalizer {
    user: String,
    data_root: PathBuf,
    daily_state: Arc<DailyStateStore>,
    checkpoints: Arc<CheckpointStore>,
    router: Option<Arc<LlmRouter>>,
    storage: Arc<StorageSink>,
}

impl Normalizer {
    pub fn new(
        user: impl Into<String>,
        data_root: impl Into<PathBuf>,
        daily_state: Arc<DailyStateStore>,
        checkpoints: Arc<CheckpointStore>,
        router: Option<Arc<LlmRouter>>,
        storage: Arc<StorageSink>,
    ) -> Self {
        Self {
            user: user.into(),
            data_root: data_root.into(),
            daily_state,
            checkpoints,
            router,
            storage,
        }
    }

    pub async fn normalize(&self, date_str: &str) -> NormalizeResult<(PathBuf, PathBuf)> {
        self.normalize_with(date_str, true).await
    }

    /// Same as `normalize`, but `enrich=false` skips the LLM call
    /// entirely regardless of whether a router is configured (§6
    /// `--no-enrich`).
    pub async fn normalize_with(&self, date_str: &str, enrich: bool) -> NormalizeResult<(PathBuf, PathBuf)> {
        let (mut activities, stats) = self.build_activities_and_stats(date_str).await?;
        if enrich && self.router.is_some() {
            self.enrich_one(date_str, &mut activities).await;
        }
        self.persist(date_str, &activities, &stats).await
    }

    /// Loads raw files and produces the sorted activity list + stats,
    /// without any LLM call — the shared core of both the sequential and
    /// batch Phase-A paths.
    async fn build_activities_and_stats(&self, date_str: &str) -> NormalizeResult<(Vec<Activity>, DailyStats)> {
        let date = parse_date(date_str)?;
        let prs = self.load_prs(date).await?;
        let commits = self.load_commits(date).await;
        let issues = self.load_issues(date).await;

        let mut activities = Vec::new();
        for pr in &prs {
            activities.extend(activities_for_pr(&self.user, date_str, pr));
        }
        for commit in &commits {
            activities.extend(activity_for_commit(date_str, commit));
        }
        for issue in &issues {
            activities.extend(activities_for_issue(&self.user, date_str, issue));
        }
        activities.sort_by_key(|a| a.timestamp);

        let stats = build_stats(date_str, &prs, &commits, &issues, &activities);
        Ok((activities, stats))
    }

    async fn load_prs(&self, date: NaiveDate) -> NormalizeResult<Vec<PrRaw>> {
        let path = paths::raw_prs_path(&self.data_root, date);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| NormalizeError::MissingRaw(path.clone()))?;
        serde_json::from_slice(&bytes).map_err(|source| NormalizeError::MalformedRaw { path, source })
    }

    async fn load_commits(&self, date: NaiveDate) -> Vec<CommitRaw> {
        let path = paths::raw_commits_path(&self.data_root, date);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    async fn load_issues(&self, date: NaiveDate) -> Vec<IssueRaw> {
        let path = paths::raw_issues_path(&self.data_root, date);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    async fn persist(&self, date_str: &str, activities: &[Activity], stats: &DailyStats) -> NormalizeResult<(PathBuf, PathBuf)> {
        let date = parse_date(date_str)?;
        let activities_path = paths::activities_path(&self.data_root, date);
        let stats_path = paths::stats_path(&self.data_root, date);
        write_jsonl(&activities_path, activities).await?;
        write_json(&stats_path, stats).await?;
        self.daily_state.set_timestamp(state_store::PHASE_NORMALIZE, date_str, None).await?;
        self.checkpoints.update(LAST_NORMALIZE_DATE, date_str).await?;

        self.storage.store_activities(date_str, &json!(activities)).await;
        self.storage.store_stats(date_str, &json!(stats)).await;

        Ok((activities_path, stats_path))
    }

    /// Single-call enrichment (§4.10): one `task="enrich"` request per
    /// date covering every activity that day. Never fails the date.
    async fn enrich_one(&self, date_str: &str, activities: &mut [Activity]) {
        if activities.is_empty() {
            return;
        }
        let Some(router) = &self.router else { return };
        let user_content = render_enrich_user_content(activities);
        let opts = ChatOptions {
            task: "enrich".to_string(),
            json_mode: true,
            cache_system_prompt: true,
            max_tokens: None,
        };
        match router.chat(ENRICH_SYSTEM_PROMPT, &user_content, &opts).await {
            Ok(text) => apply_enrichment_response(&text, activities, date_str),
            Err(e) => warn!(date = date_str, error = %e, "enrichment call failed, continuing without it"),
        }
    }

    pub async fn normalize_range(
        &self,
        since: NaiveDate,
        until: NaiveDate,
        force: bool,
        max_workers: usize,
        batch: bool,
        enrich: bool,
    ) -> Vec<DateOutcome> {
        let dates = paths::date_range(since, until);
        let candidates: Vec<String> = if force {
            dates.clone()
        } else {
            self.daily_state.stale_dates(state_store::PHASE_NORMALIZE, &dates).await
        };

        if candidates.is_empty() {
            return dates.iter().map(|d| DateOutcome::skipped(d)).collect();
        }

        let mut results: HashMap<String, DateOutcome> = HashMap::new();

        if batch && enrich && self.router.is_some() {
            self.normalize_range_batched(&candidates, &mut results).await;
        } else if max_workers > 1 {
            // Concurrent, not OS-threaded: each date's normalize future is
            // polled together so file I/O and LLM round-trips overlap.
            let futs = candidates.iter().map(|date| self.normalize_one_isolated(date, enrich));
            let outcomes = futures::future::join_all(futs).await;
            for (date, outcome) in candidates.iter().zip(outcomes) {
                results.insert(date.clone(), outcome);
            }
        } else {
            for date in &candidates {
                let outcome = self.normalize_one_isolated(date, enrich).await;
                results.insert(date.clone(), outcome);
            }
        }

        dates.into_iter().map(|d| results.remove(&d).unwrap_or_else(|| DateOutcome::skipped(&d))).collect()
    }

    async fn normalize_one_isolated(&self, date: &str, enrich: bool) -> DateOutcome {
        match self.normalize_with(date, enrich).await {
            Ok((activities_path, _)) => DateOutcome::success(date, Some(activities_path)),
            Err(e) => DateOutcome::failed(date, e.to_string()),
        }
    }

    /// Phase-A/Phase-B batch enrichment (§4.10): normalize every candidate
    /// date without enrichment first, then submit one batch request per
    /// non-empty date and apply results once the batch completes. Only
    /// ever called with `enrich=true` (the caller routes `batch && enrich`
    /// here), so there is no un-enriched variant of this path.
    async fn normalize_range_batched(&self, candidates: &[String], results: &mut HashMap<String, DateOutcome>) {
        let Some(router) = self.router.clone() else { return };

        let mut phase_a: HashMap<String, (Vec<Activity>, DailyStats)> = HashMap::new();
        for date in candidates {
            match self.build_activities_and_stats(date).await {
                Ok((activities, stats)) => {
                    phase_a.insert(date.clone(), (activities, stats));
                }
                Err(e) => {
                    results.insert(date.clone(), DateOutcome::failed(date, e.to_string()));
                }
            }
        }

        let model = match router.resolve_for_task("enrich").await {
            Ok((_, model)) => model,
            Err(e) => {
                warn!(error = %e, "could not resolve enrich task's model, dates persist un-enriched");
                for (date, (activities, stats)) in phase_a {
                    match self.persist(&date, &activities, &stats).await {
                        Ok((path, _)) => {
                            results.insert(date.clone(), DateOutcome::success(&date, Some(path)));
                        }
                        Err(e) => {
                            results.insert(date.clone(), DateOutcome::failed(&date, e.to_string()));
                        }
                    }
                }
                return;
            }
        };

        let items: Vec<BatchItem> = phase_a
            .iter()
            .filter(|(_, (activities, _))| !activities.is_empty())
            .map(|(date, (activities, _))| {
                let system = ENRICH_SYSTEM_PROMPT.to_string();
                let user = render_enrich_user_content(activities);
                BatchItem {
                    custom_id: format!("enrich-{date}"),
                    request: ai_llm_service::ChatRequest::new(model.clone(), user)
                        .with_system(system)
                        .json_mode(true),
                }
            })
            .collect();

        let mut enrichment_results: HashMap<String, String> = HashMap::new();
        if !items.is_empty() {
            match router.submit_batch("enrich", items).await {
                Ok((provider_name, batch_id)) => {
                    if let Err(e) = poll_batch_until_done(&router, &provider_name, &batch_id).await {
                        warn!(batch_id, error = %e, "batch enrichment failed, dates persist un-enriched");
                    } else if let Ok(batch_results) = router.get_batch_results(&provider_name, &batch_id).await {
                        for r in batch_results {
                            if let (Some(text), None) = (r.text, r.error.as_ref()) {
                                enrichment_results.insert(r.custom_id, text);
                            }
                        }
                    }
                }
                Err(e) => warn!(error = %e, "batch submission failed, dates persist un-enriched"),
            }
        }

        for (date, (mut activities, stats)) in phase_a {
            if let Some(text) = enrichment_results.get(&format!("enrich-{date}")) {
                apply_enrichment_response(text, &mut activities, &date);
            }
            match self.persist(&date, &activities, &stats).await {
                Ok((path, _)) => {
                    results.insert(date.clone(), DateOutcome::success(&date, Some(path)));
                }
                Err(e) => {
                    results.insert(date.clone(), DateOutcome::failed(&date, e.to_string()));
                }
            }
        }
    }
}

async fn poll_batch_until_done(router: &LlmRouter, provider_name: &str, batch_id: &str) -> Result<(), String> {
    use ai_llm_service::BatchStatus;
    const MAX_POLLS: u32 = 60;
    for _ in 0..MAX_POLLS {
        match router.get_batch_status(provider_name, batch_id).await {
            Ok(BatchStatus::Completed) => return Ok(()),
            Ok(BatchStatus::Failed) | Ok(BatchStatus::Expired) => {
                return Err(format!("batch {batch_id} ended in a terminal failure state"));
            }
            Ok(_) => tokio::time::sleep(std::time::Duration::from_secs(5)).await,
            Err(e) => return Err(e.to_string()),
        }
    }
    Err(format!("batch {batch_id} did not complete within the poll budget"))
}

fn parse_date(date_str: &str) -> NormalizeResult<NaiveDate> {
    paths::parse_date(date_str).ok_or_else(|| NormalizeError::MissingRaw(PathBuf::from(date_str)))
}

// ---------------------------------------------------------------------
// Raw → Activity conversion (§3 invariants)
// ---------------------------------------------------------------------

fn activities_for_pr(user: &str, date_str: &str, pr: &PrRaw) -> Vec<Activity> {
    let mut out = Vec::new();
    let is_author = logins_match(&pr.author, user);

    if is_author && pr.created_at.format("%Y-%m-%d").to_string() == date_str {
        out.push(build_pr_activity(date_str, ActivityKind::PrAuthored, pr, pr.created_at, pr.additions(), pr.deletions(), Vec::new(), Vec::new()));
    }

    if !is_author {
        let mut todays_reviews: Vec<_> = pr
            .reviews
            .iter()
            .filter(|r| logins_match(&r.author, user) && r.submitted_at.format("%Y-%m-%d").to_string() == date_str)
            .collect();
        todays_reviews.sort_by_key(|r| r.submitted_at);
        if let Some(first) = todays_reviews.first() {
            let bodies: Vec<String> = todays_reviews.iter().map(|r| r.body.clone()).filter(|b| !b.is_empty()).collect();
            out.push(build_pr_activity(date_str, ActivityKind::PrReviewed, pr, first.submitted_at, 0, 0, bodies, Vec::new()));
        }
    }

    let mut todays_comments: Vec<_> = pr
        .comments
        .iter()
        .filter(|c| logins_match(&c.author, user) && c.created_at.format("%Y-%m-%d").to_string() == date_str)
        .collect();
    todays_comments.sort_by_key(|c| c.created_at);
    if let Some(first) = todays_comments.first() {
        let bodies: Vec<String> = todays_comments.iter().map(|c| c.body.clone()).collect();
        let contexts: Vec<CommentContext> = todays_comments
            .iter()
            .filter_map(|c| {
                c.path.clone().map(|path| CommentContext {
                    path,
                    line: c.line,
                    diff_hunk: c.diff_hunk.clone(),
                    body: c.body.clone(),
                })
            })
            .collect();
        out.push(build_pr_activity(date_str, ActivityKind::PrCommented, pr, first.created_at, 0, 0, bodies, contexts));
    }

    out
}

fn build_pr_activity(
    date_str: &str,
    kind: ActivityKind,
    pr: &PrRaw,
    timestamp: chrono::DateTime<Utc>,
    additions: u64,
    deletions: u64,
    extra_bodies: Vec<String>,
    comment_contexts: Vec<CommentContext>,
) -> Activity {
    let files: Vec<String> = pr.files.iter().map(|f| f.filename.clone()).collect();
    let file_patches: HashMap<String, String> = pr
        .files
        .iter()
        .filter_map(|f| f.patch.clone().filter(|p| !p.is_empty()).map(|p| (f.filename.clone(), p)))
        .collect();
    let summary = auto_summary(kind.as_str(), &pr.title, &pr.repo, &pr.body, additions, deletions, &files);

    let (review_bodies, comment_bodies) = match kind {
        ActivityKind::PrReviewed => (extra_bodies, Vec::new()),
        ActivityKind::PrCommented => (Vec::new(), extra_bodies),
        _ => (Vec::new(), Vec::new()),
    };

    Activity {
        date: date_str.to_string(),
        source: "github".to_string(),
        kind,
        external_id: pr.number,
        timestamp,
        repo: pr.repo.clone(),
        title: pr.title.clone(),
        url: pr.html_url.clone(),
        auto_summary: summary,
        body: pr.body.clone(),
        review_bodies,
        comment_bodies,
        files,
        file_patches,
        additions,
        deletions,
        labels: pr.labels.clone(),
        evidence_urls: vec![pr.html_url.clone()],
        comment_contexts,
        change_summary: None,
        intent: None,
    }
}

fn activity_for_commit(date_str: &str, commit: &CommitRaw) -> Vec<Activity> {
    if commit.committed_at.format("%Y-%m-%d").to_string() != date_str {
        return Vec::new();
    }
    let files: Vec<String> = commit.files.iter().map(|f| f.filename.clone()).collect();
    let title = commit.message.lines().next().unwrap_or_default().to_string();
    let additions = commit.additions();
    let deletions = commit.deletions();
    let summary = auto_summary(ActivityKind::Commit.as_str(), &title, &commit.repo, &commit.message, additions, deletions, &files);

    vec![Activity {
        date: date_str.to_string(),
        source: "github".to_string(),
        kind: ActivityKind::Commit,
        external_id: 0,
        timestamp: commit.committed_at,
        repo: commit.repo.clone(),
        title,
        url: commit.html_url.clone(),
        auto_summary: summary,
        body: commit.message.clone(),
        review_bodies: Vec::new(),
        comment_bodies: Vec::new(),
        files,
        file_patches: HashMap::new(),
        additions,
        deletions,
        labels: Vec::new(),
        evidence_urls: vec![commit.html_url.clone()],
        comment_contexts: Vec::new(),
        change_summary: None,
        intent: None,
    }]
}

fn activities_for_issue(user: &str, date_str: &str, issue: &IssueRaw) -> Vec<Activity> {
    let mut out = Vec::new();
    let is_author = logins_match(&issue.author, user);

    if is_author && issue.created_at.format("%Y-%m-%d").to_string() == date_str {
        out.push(build_issue_activity(date_str, ActivityKind::IssueAuthored, issue, issue.created_at, Vec::new()));
    }

    let mut todays_comments: Vec<_> = issue
        .comments
        .iter()
        .filter(|c| logins_match(&c.author, user) && c.created_at.format("%Y-%m-%d").to_string() == date_str)
        .collect();
    todays_comments.sort_by_key(|c| c.created_at);
    if let Some(first) = todays_comments.first() {
        let bodies: Vec<String> = todays_comments.iter().map(|c| c.body.clone()).collect();
        out.push(build_issue_activity(date_str, ActivityKind::IssueCommented, issue, first.created_at, bodies));
    }

    out
}

fn build_issue_activity(
    date_str: &str,
    kind: ActivityKind,
    issue: &IssueRaw,
    timestamp: chrono::DateTime<Utc>,
    comment_bodies: Vec<String>,
) -> Activity {
    let summary = format!("{}: {} ({})", kind.as_str(), issue.title, issue.repo);
    Activity {
        date: date_str.to_string(),
        source: "github".to_string(),
        kind,
        external_id: issue.number,
        timestamp,
        repo: issue.repo.clone(),
        title: issue.title.clone(),
        url: issue.html_url.clone(),
        auto_summary: summary,
        body: issue.body.clone(),
        review_bodies: Vec::new(),
        comment_bodies,
        files: Vec::new(),
        file_patches: HashMap::new(),
        additions: 0,
        deletions: 0,
        labels: issue.labels.clone(),
        evidence_urls: vec![issue.html_url.clone()],
        comment_contexts: Vec::new(),
        change_summary: None,
        intent: None,
    }
}

/// `"{kind}: {title} ({repo}) +{a}/-{d}"` when a body exists; otherwise a
/// directory-hint fallback naming up to 3 touched top-level directories.
fn auto_summary(kind: &str, title: &str, repo: &str, body: &str, additions: u64, deletions: u64, files: &[String]) -> String {
    if !body.trim().is_empty() {
        return format!("{kind}: {title} ({repo}) +{additions}/-{deletions}");
    }
    if files.is_empty() {
        return format!("{kind}: {title} ({repo}) +{additions}/-{deletions}");
    }
    let mut dirs: Vec<String> = files
        .iter()
        .map(|f| f.rsplit_once('/').map(|(dir, _)| dir.to_string()).unwrap_or_else(|| ".".to_string()))
        .collect();
    dirs.sort();
    dirs.dedup();
    let shown: Vec<&str> = dirs.iter().take(3).map(String::as_str).collect();
    let suffix = if dirs.len() > 3 { " 외" } else { "" };
    format!(
        "{kind}: [{}{}] {}개 파일 변경 ({repo}) +{additions}/-{deletions}",
        shown.join(", "),
        suffix,
        files.len()
    )
}

fn build_stats(date_str: &str, prs: &[PrRaw], commits: &[CommitRaw], issues: &[IssueRaw], activities: &[Activity]) -> DailyStats {
    let mut stats = DailyStats::empty(date_str);

    for activity in activities {
        match activity.kind {
            ActivityKind::PrAuthored => stats.github.authored_count += 1,
            ActivityKind::PrReviewed => stats.github.reviewed_count += 1,
            ActivityKind::PrCommented => stats.github.commented_count += 1,
            ActivityKind::Commit => stats.github.commit_count += 1,
            ActivityKind::IssueAuthored => stats.github.issue_authored_count += 1,
            ActivityKind::IssueCommented => stats.github.issue_commented_count += 1,
        }
        if matches!(activity.kind, ActivityKind::PrAuthored | ActivityKind::Commit) {
            stats.total_additions += activity.additions;
            stats.total_deletions += activity.deletions;
        }
    }

    let mut repos: Vec<String> = activities.iter().map(|a| a.repo.clone()).collect();
    repos.sort();
    repos.dedup();
    stats.repos_touched = repos;

    stats.authored_prs = prs
        .iter()
        .filter(|pr| activities.iter().any(|a| a.kind == ActivityKind::PrAuthored && a.external_id == pr.number && a.repo == pr.repo))
        .map(|pr| PrSummary {
            repo: pr.repo.clone(),
            number: pr.number,
            title: pr.title.clone(),
            url: pr.html_url.clone(),
            additions: pr.additions(),
            deletions: pr.deletions(),
        })
        .collect();

    stats.reviewed_prs = prs
        .iter()
        .filter(|pr| activities.iter().any(|a| a.kind == ActivityKind::PrReviewed && a.external_id == pr.number && a.repo == pr.repo))
        .map(|pr| PrSummary {
            repo: pr.repo.clone(),
            number: pr.number,
            title: pr.title.clone(),
            url: pr.html_url.clone(),
            additions: pr.additions(),
            deletions: pr.deletions(),
        })
        .collect();

    stats.commits = commits
        .iter()
        .filter(|c| c.committed_at.format("%Y-%m-%d").to_string() == date_str)
        .map(|c| CommitSummary {
            repo: c.repo.clone(),
            sha: c.sha.clone(),
            message: c.message.lines().next().unwrap_or_default().to_string(),
            url: c.html_url.clone(),
            additions: c.additions(),
            deletions: c.deletions(),
        })
        .collect();

    stats.authored_issues = issues
        .iter()
        .filter(|issue| activities.iter().any(|a| a.kind == ActivityKind::IssueAuthored && a.external_id == issue.number && a.repo == issue.repo))
        .map(|issue| IssueSummary {
            repo: issue.repo.clone(),
            number: issue.number,
            title: issue.title.clone(),
            url: issue.html_url.clone(),
        })
        .collect();

    stats
}

// ---------------------------------------------------------------------
// LLM enrichment
// ---------------------------------------------------------------------

fn render_enrich_user_content(activities: &[Activity]) -> String {
    let items: Vec<_> = activities
        .iter()
        .enumerate()
        .map(|(i, a)| {
            json!({
                "index": i,
                "kind": a.kind.as_str(),
                "title": a.title,
                "repo": a.repo,
                "body": truncate(&a.body, 500),
            })
        })
        .collect();
    serde_json::to_string_pretty(&items).unwrap_or_default()
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().map(|(i, _)| i).take_while(|&i| i <= max).last().unwrap_or(0);
        format!("{}…", &s[..end])
    }
}

#[derive(Debug, Deserialize)]
struct EnrichEntry {
    index: usize,
    change_summary: String,
    intent: String,
}

fn apply_enrichment_response(text: &str, activities: &mut [Activity], date_str: &str) {
    let entries: Vec<EnrichEntry> = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!(date = date_str, error = %e, "enrichment response was not valid JSON, skipping");
            return;
        }
    };
    for entry in entries {
        if let Some(activity) = activities.get_mut(entry.index) {
            activity.change_summary = Some(entry.change_summary);
            activity.intent = Some(entry.intent);
        } else {
            debug!(date = date_str, index = entry.index, "enrichment entry index out of range, ignored");
        }
    }
    info!(date = date_str, "applied LLM enrichment");
}

async fn write_jsonl(path: &std::path::Path, activities: &[Activity]) -> NormalizeResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|source| NormalizeError::Io { path: parent.to_path_buf(), source })?;
    }
    let mut buf = String::new();
    for a in activities {
        buf.push_str(&serde_json::to_string(a).unwrap_or_default());
        buf.push('\n');
    }
    tokio::fs::write(path, buf).await.map_err(|source| NormalizeError::Io { path: path.to_path_buf(), source })
}

async fn write_json<T: serde::Serialize>(path: &std::path::Path, data: &T) -> NormalizeResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|source| NormalizeError::Io { path: parent.to_path_buf(), source })?;
    }
    let bytes = serde_json::to_vec_pretty(data).unwrap_or_default();
    tokio::fs::write(path, bytes).await.map_err(|source| NormalizeError::Io { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn sample_pr() -> PrRaw {
        PrRaw {
            repo: "acme/widgets".to_string(),
            number: 42,
            html_url: "https://github.com/acme/widgets/pull/42".to_string(),
            api_url: "https://api.github.com/repos/acme/widgets/pulls/42".to_string(),
            title: "Add feature".to_string(),
            body: "Adds the thing".to_string(),
            state: "open".to_string(),
            is_merged: false,
            created_at: DateTime::parse_from_rfc3339("2025-02-16T10:00:00Z").unwrap().with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339("2025-02-16T10:00:00Z").unwrap().with_timezone(&Utc),
            merged_at: None,
            author: "octocat".to_string(),
            labels: Vec::new(),
            files: Vec::new(),
            comments: Vec::new(),
            reviews: Vec::new(),
        }
    }

    #[test]
    fn self_review_produces_no_activity() {
        let mut pr = sample_pr();
        pr.reviews.push(crate::model::PrReview {
            author: "OctoCat".to_string(),
            state: crate::model::ReviewState::Approved,
            body: "lgtm from myself".to_string(),
            submitted_at: pr.created_at,
            url: String::new(),
        });
        let activities = activities_for_pr("octocat", "2025-02-16", &pr);
        assert!(!activities.iter().any(|a| a.kind == ActivityKind::PrReviewed));
    }

    #[test]
    fn multiple_reviews_same_day_collapse_to_one_activity() {
        let mut pr = sample_pr();
        pr.author = "someone-else".to_string();
        let t1 = DateTime::parse_from_rfc3339("2025-02-16T09:00:00Z").unwrap().with_timezone(&Utc);
        let t2 = DateTime::parse_from_rfc3339("2025-02-16T15:00:00Z").unwrap().with_timezone(&Utc);
        pr.reviews.push(crate::model::PrReview {
            author: "octocat".to_string(),
            state: crate::model::ReviewState::Commented,
            body: "first pass".to_string(),
            submitted_at: t1,
            url: String::new(),
        });
        pr.reviews.push(crate::model::PrReview {
            author: "octocat".to_string(),
            state: crate::model::ReviewState::Approved,
            body: "looks good now".to_string(),
            submitted_at: t2,
            url: String::new(),
        });
        let activities = activities_for_pr("octocat", "2025-02-16", &pr);
        let reviewed: Vec<_> = activities.iter().filter(|a| a.kind == ActivityKind::PrReviewed).collect();
        assert_eq!(reviewed.len(), 1);
        assert_eq!(reviewed[0].timestamp, t1);
    }

    #[test]
    fn auto_summary_falls_back_to_directory_hint_without_body() {
        let summary = auto_summary("COMMIT", "fix bug", "acme/widgets", "", 3, 1, &["src/a.rs".to_string(), "src/b.rs".to_string()]);
        assert!(summary.contains("src"));
        assert!(summary.contains("개 파일 변경"));
    }

    #[test]
    fn auto_summary_uses_body_when_present() {
        let summary = auto_summary("PR_AUTHORED", "Add feature", "acme/widgets", "adds stuff", 3, 1, &["src/a.rs".to_string()]);
        assert_eq!(summary, "PR_AUTHORED: Add feature (acme/widgets) +3/-1");
    }

    #[test]
    fn enrichment_ignores_out_of_range_index() {
        let mut activities = vec![build_issue_activity(
            "2025-02-16",
            ActivityKind::IssueAuthored,
            &IssueRaw {
                repo: "acme/widgets".to_string(),
                number: 1,
                html_url: String::new(),
                api_url: String::new(),
                title: "Bug".to_string(),
                body: String::new(),
                state: "open".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                closed_at: None,
                labels: Vec::new(),
                author: "octocat".to_string(),
                comments: Vec::new(),
            },
            Utc::now(),
            Vec::new(),
        )];
        let response = json!([{"index": 0, "change_summary": "filed a bug", "intent": "tracking"}, {"index": 5, "change_summary": "ignored", "intent": "ignored"}]).to_string();
        apply_enrichment_response(&response, &mut activities, "2025-02-16");
        assert_eq!(activities[0].change_summary.as_deref(), Some("filed a bug"));
    }
}
