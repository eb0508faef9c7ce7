//! Fetcher Service (§4.9): search + enrich PRs/commits/issues for a date
//! or a range, writing `raw/{Y}/{M}/{D}/{prs,commits,issues}.json`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info, warn};

use gh_client::{ClientPool, GhClient};
use state_store::{CheckpointStore, DailyStateStore, FailedDateStore, FetchProgressStore, LAST_FETCH_DATE};

use crate::errors::{FetchError, FetchResult};
use crate::github_json::{commit_raw_from_get_commit, issue_raw_from_get_issue, owner_repo_from_repository_url, pr_api_url_of, pr_raw_from_get_pr, str_field, u64_field};
use crate::model::{ALL_SOURCES, SourceType};
use crate::noise::{is_bot_login, is_noise_body};
use crate::outcome::DateOutcome;
use crate::paths;

#[derive(Debug, Default, Clone)]
pub struct FetchPaths {
    pub prs: Option<PathBuf>,
    pub commits: Option<PathBuf>,
    pub issues: Option<PathBuf>,
    /// Set when any source's search hit the upstream 1000-result page
    /// cap for this date — the raw files may be missing matches.
    pub truncated: bool,
}

pub struct Fetcher {
    client: Arc<GhClient>,
    pool: Option<Arc<ClientPool>>,
    user: String,
    data_root: PathBuf,
    daily_state: Arc<DailyStateStore>,
    fetch_progress: Arc<FetchProgressStore>,
    failed_dates: Arc<FailedDateStore>,
    checkpoints: Arc<CheckpointStore>,
}

impl Fetcher {
    pub fn new(
        client: Arc<GhClient>,
        pool: Option<Arc<ClientPool>>,
        user: impl Into<String>,
        data_root: impl Into<PathBuf>,
        daily_state: Arc<DailyStateStore>,
        fetch_progress: Arc<FetchProgressStore>,
        failed_dates: Arc<FailedDateStore>,
        checkpoints: Arc<CheckpointStore>,
    ) -> Self {
        Self {
            client,
            pool,
            user: user.into(),
            data_root: data_root.into(),
            daily_state,
            fetch_progress,
            failed_dates,
            checkpoints,
        }
    }

    pub async fn fetch(&self, date_str: &str, types: Option<&[SourceType]>) -> FetchResult<FetchPaths> {
        self.fetch_with_client(&self.client, date_str, types).await
    }

    /// Runs the search+enrich for one date against an explicit client
    /// (used by range fetches so each worker holds its own pooled client).
    async fn fetch_with_client(
        &self,
        client: &GhClient,
        date_str: &str,
        types: Option<&[SourceType]>,
    ) -> FetchResult<FetchPaths> {
        let date = paths::parse_date(date_str).ok_or_else(|| FetchError::Client(gh_client::FetchError::Other(format!("invalid date: {date_str}"))))?;
        let sources = types.unwrap_or(&ALL_SOURCES);
        let mut out = FetchPaths::default();

        if sources.contains(&SourceType::Prs) {
            let (items, truncated) = self.search_prs(client, date_str, None).await?;
            out.truncated |= truncated;
            let prs = self.enrich_prs(client, items).await;
            let path = paths::raw_prs_path(&self.data_root, date);
            write_json(&path, &prs).await?;
            out.prs = Some(path);
        }

        if sources.contains(&SourceType::Commits) {
            let (items, truncated) = self.search_commits(client, date_str, None).await;
            out.truncated |= truncated;
            let commits = self.enrich_commits(client, items).await;
            let path = paths::raw_commits_path(&self.data_root, date);
            write_json(&path, &commits).await?;
            out.commits = Some(path);
        }

        if sources.contains(&SourceType::Issues) {
            let (items, truncated) = self.search_issues(client, date_str, None).await?;
            out.truncated |= truncated;
            let issues = self.enrich_issues(client, items).await;
            let path = paths::raw_issues_path(&self.data_root, date);
            write_json(&path, &issues).await?;
            out.issues = Some(path);
        }

        if out.truncated {
            warn!(date = date_str, "fetched date may be missing search results past the upstream page cap");
        }

        self.daily_state.set_timestamp(state_store::PHASE_FETCH, date_str, None).await?;
        Ok(out)
    }

    // -- search axes --

    /// `author:user updated:window`, `reviewed-by:user updated:window`
    /// (422 tolerated — unsupported on some GHES versions),
    /// `commenter:user updated:window`; deduped by PR API URL. `window`
    /// is either a single day (`date_str`) or an explicit `since..until`
    /// range passed by the chunked range fetch. The returned bool is set
    /// if any axis hit the upstream 1000-result page cap.
    async fn search_prs(&self, client: &GhClient, window: &str, range: Option<(&str, &str)>) -> FetchResult<(Vec<Value>, bool)> {
        let w = range.map(|(s, u)| format!("{s}..{u}")).unwrap_or_else(|| window.to_string());
        let mut by_url: HashMap<String, Value> = HashMap::new();
        let mut truncated = false;

        let author_q = format!("is:pr author:{} updated:{w}", self.user);
        let author_result = client.search_all_pages(&author_q).await?;
        truncated |= author_result.truncated;
        for item in author_result.items {
            if let Some(url) = pr_api_url_of(&item) {
                by_url.entry(url).or_insert(item);
            }
        }

        let reviewed_q = format!("is:pr reviewed-by:{} updated:{w}", self.user);
        match client.search_all_pages(&reviewed_q).await {
            Ok(result) => {
                truncated |= result.truncated;
                for item in result.items {
                    if let Some(url) = pr_api_url_of(&item) {
                        by_url.entry(url).or_insert(item);
                    }
                }
            }
            Err(gh_client::FetchError::ClientError { status: 422, .. }) => {
                debug!("reviewed-by search axis unsupported (422), skipping");
            }
            Err(e) => return Err(e.into()),
        }

        let commenter_q = format!("is:pr commenter:{} updated:{w}", self.user);
        let commenter_result = client.search_all_pages(&commenter_q).await?;
        truncated |= commenter_result.truncated;
        for item in commenter_result.items {
            if let Some(url) = pr_api_url_of(&item) {
                by_url.entry(url).or_insert(item);
            }
        }

        Ok((by_url.into_values().collect(), truncated))
    }

    /// Tolerates the whole commit-search path being unsupported by the
    /// upstream host (returns empty rather than failing the date).
    async fn search_commits(&self, client: &GhClient, window: &str, range: Option<(&str, &str)>) -> (Vec<Value>, bool) {
        let w = range.map(|(s, u)| format!("{s}..{u}")).unwrap_or_else(|| window.to_string());
        let q = format!("author:{} committer-date:{w}", self.user);
        match client.search_all_commit_pages(&q).await {
            Ok(result) => (result.items, result.truncated),
            Err(e) => {
                warn!(error = %e, "commit search unsupported or failed, treating as empty");
                (Vec::new(), false)
            }
        }
    }

    async fn search_issues(&self, client: &GhClient, window: &str, range: Option<(&str, &str)>) -> FetchResult<(Vec<Value>, bool)> {
        let w = range.map(|(s, u)| format!("{s}..{u}")).unwrap_or_else(|| window.to_string());
        let mut by_url: HashMap<String, Value> = HashMap::new();
        let mut truncated = false;

        let author_q = format!("type:issue author:{} updated:{w}", self.user);
        let author_result = client.search_all_pages(&author_q).await?;
        truncated |= author_result.truncated;
        for item in author_result.items {
            let url = str_field(&item, "url");
            if !url.is_empty() {
                by_url.entry(url).or_insert(item);
            }
        }

        let commenter_q = format!("type:issue commenter:{} updated:{w}", self.user);
        let commenter_result = client.search_all_pages(&commenter_q).await?;
        truncated |= commenter_result.truncated;
        for item in commenter_result.items {
            let url = str_field(&item, "url");
            if !url.is_empty() {
                by_url.entry(url).or_insert(item);
            }
        }

        Ok((by_url.into_values().collect(), truncated))
    }

    // -- enrichment --

    async fn enrich_prs(&self, client: &GhClient, items: Vec<Value>) -> Vec<crate::model::PrRaw> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Some((owner, repo)) = str_field(&item, "repository_url")
                .as_str()
                .pipe(owner_repo_from_repository_url)
            else {
                continue;
            };
            let number = u64_field(&item, "number");
            match self.enrich_one_pr(client, &owner, &repo, number).await {
                Ok(pr) => out.push(pr),
                Err(e) => warn!(owner, repo, number, error = %e, "skipping PR enrichment failure"),
            }
        }
        out
    }

    async fn enrich_one_pr(
        &self,
        client: &GhClient,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> FetchResult<crate::model::PrRaw> {
        let pr = client.get_pr(owner, repo, number).await?;
        let files = client.get_pr_files(owner, repo, number).await?;
        let comments: Vec<Value> = client
            .get_pr_comments(owner, repo, number)
            .await?
            .into_iter()
            .filter(|c| {
                let author = crate::github_json::login_of(c, "user");
                !is_bot_login(&author) && !is_noise_body(&str_field(c, "body"))
            })
            .collect();
        let reviews: Vec<Value> = client
            .get_pr_reviews(owner, repo, number)
            .await?
            .into_iter()
            .filter(|r| {
                let author = crate::github_json::login_of(r, "user");
                !is_bot_login(&author) && !is_noise_body(&str_field(r, "body"))
            })
            .collect();

        let repo_full = format!("{owner}/{repo}");
        Ok(pr_raw_from_get_pr(&repo_full, &pr, files, comments, reviews))
    }

    async fn enrich_commits(&self, client: &GhClient, items: Vec<Value>) -> Vec<crate::model::CommitRaw> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Some((owner, repo)) = str_field(&item, "repository_url")
                .as_str()
                .pipe(owner_repo_from_repository_url)
                .or_else(|| {
                    item.get("repository")
                        .and_then(|r| r.get("full_name"))
                        .and_then(Value::as_str)
                        .and_then(|full| full.split_once('/'))
                        .map(|(o, r)| (o.to_string(), r.to_string()))
                })
            else {
                continue;
            };
            let sha = str_field(&item, "sha");
            if sha.is_empty() {
                continue;
            }
            match client.get_commit(&owner, &repo, &sha).await {
                Ok(full) => out.push(commit_raw_from_get_commit(&format!("{owner}/{repo}"), &full)),
                Err(e) => warn!(owner, repo, sha, error = %e, "skipping commit enrichment failure"),
            }
        }
        out
    }

    async fn enrich_issues(&self, client: &GhClient, items: Vec<Value>) -> Vec<crate::model::IssueRaw> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Some((owner, repo)) = str_field(&item, "repository_url")
                .as_str()
                .pipe(owner_repo_from_repository_url)
            else {
                continue;
            };
            let number = u64_field(&item, "number");
            let result: FetchResult<crate::model::IssueRaw> = async {
                let issue = client.get_issue(&owner, &repo, number).await?;
                let comments: Vec<Value> = client
                    .get_issue_comments(&owner, &repo, number)
                    .await?
                    .into_iter()
                    .filter(|c| {
                        let author = crate::github_json::login_of(c, "user");
                        !is_bot_login(&author) && !is_noise_body(&str_field(c, "body"))
                    })
                    .collect();
                Ok(issue_raw_from_get_issue(&format!("{owner}/{repo}"), &issue, comments))
            }
            .await;
            match result {
                Ok(issue) => out.push(issue),
                Err(e) => warn!(owner, repo, number, error = %e, "skipping issue enrichment failure"),
            }
        }
        out
    }

    /// Backfill mode (§4.9): month-chunked, resumable, optionally
    /// parallel across dates through the client pool. Each chunk's three
    /// search axes run once over the whole `since..until` window and are
    /// bucketed by date in the Fetch-Progress Store, so a chunk spanning
    /// 30 candidate dates costs 3 searches, not 90.
    pub async fn fetch_range(
        &self,
        since: NaiveDate,
        until: NaiveDate,
        types: Option<&[SourceType]>,
        force: bool,
        max_workers: usize,
    ) -> Vec<DateOutcome> {
        let all_dates = paths::date_range(since, until);
        let mut results: HashMap<String, DateOutcome> = HashMap::new();

        for chunk in paths::month_chunks(since, until) {
            let chunk_dates = paths::date_range(chunk.since, chunk.until);

            let candidate_dates: Vec<String> = if force {
                chunk_dates.clone()
            } else {
                let stale = self.daily_state.stale_dates(state_store::PHASE_FETCH, &chunk_dates).await;
                let retryable = self.failed_dates.retryable_dates(&chunk_dates).await;
                let mut set: std::collections::BTreeSet<String> = stale.into_iter().collect();
                set.extend(retryable);
                let exhausted: std::collections::HashSet<String> =
                    self.failed_dates.exhausted_dates().await.into_iter().collect();
                set.into_iter().filter(|d| !exhausted.contains(d)).collect()
            };

            if candidate_dates.is_empty() {
                for d in &chunk_dates {
                    results.entry(d.clone()).or_insert(DateOutcome::skipped(d));
                }
                continue;
            }

            info!(chunk = %chunk.key, dates = candidate_dates.len(), "fetch_range: processing chunk");

            let chunk_progress = match self.load_or_search_chunk(&chunk, types).await {
                Ok(p) => p,
                Err(e) => {
                    for d in &candidate_dates {
                        let permanent = e.is_permanent();
                        let _ = self.failed_dates.record_failure(d, state_store::PHASE_FETCH, &e.to_string(), permanent).await;
                        results.insert(d.clone(), DateOutcome::failed(d, e.to_string()));
                    }
                    continue;
                }
            };

            let already_done: std::collections::HashSet<String> =
                chunk_progress.completed_dates.iter().cloned().collect();
            let pending: Vec<String> = candidate_dates.into_iter().filter(|d| !already_done.contains(d)).collect();

            if max_workers > 1 {
                if let Some(pool) = &self.pool {
                    let mut handles = Vec::new();
                    for date in pending.clone() {
                        let pool = pool.clone();
                        let this = self.clone_refs();
                        let prs = bucket_for_date(&chunk_progress.prs, &date, "updated_at");
                        let commits = bucket_for_date(&chunk_progress.commits, &date, "committer_date");
                        let issues = bucket_for_date(&chunk_progress.issues, &date, "updated_at");
                        let sources = types.map(|t| t.to_vec());
                        let chunk_truncated = chunk_progress.truncated;
                        handles.push(tokio::spawn(async move {
                            let lease = pool.acquire().await;
                            let outcome = this.fetch_one_date_from_buckets(&lease.client, &date, sources.as_deref(), prs, commits, issues).await;
                            (date, outcome.with_truncated(chunk_truncated))
                        }));
                    }
                    for h in handles {
                        if let Ok((date, outcome)) = h.await {
                            results.insert(date, outcome);
                        }
                    }
                } else {
                    warn!("max_workers > 1 requested but no client pool configured, running sequentially");
                    for date in &pending {
                        let prs = bucket_for_date(&chunk_progress.prs, date, "updated_at");
                        let commits = bucket_for_date(&chunk_progress.commits, date, "committer_date");
                        let issues = bucket_for_date(&chunk_progress.issues, date, "updated_at");
                        let outcome = self.fetch_one_date_from_buckets(&self.client, date, types, prs, commits, issues).await;
                        results.insert(date.clone(), outcome.with_truncated(chunk_progress.truncated));
                    }
                }
            } else {
                for date in &pending {
                    let prs = bucket_for_date(&chunk_progress.prs, date, "updated_at");
                    let commits = bucket_for_date(&chunk_progress.commits, date, "committer_date");
                    let issues = bucket_for_date(&chunk_progress.issues, date, "updated_at");
                    let outcome = self.fetch_one_date_from_buckets(&self.client, date, types, prs, commits, issues).await;
                    results.insert(date.clone(), outcome.with_truncated(chunk_progress.truncated));
                }
            }

            for d in &chunk_dates {
                if let Some(outcome) = results.get(d) {
                    if outcome.is_success() {
                        let _ = self.fetch_progress.mark_date_complete(&chunk.key, d).await;
                    }
                }
            }
            let reloaded = self.fetch_progress.load_chunk(&chunk.key).await.unwrap_or_default();
            if chunk_dates.iter().all(|d| reloaded.completed_dates.iter().any(|c| c == d)) {
                let _ = self.fetch_progress.clear_chunk(&chunk.key).await;
            }
        }

        let mut out: Vec<DateOutcome> = all_dates
            .into_iter()
            .map(|d| results.remove(&d).unwrap_or_else(|| DateOutcome::skipped(&d)))
            .collect();
        out.sort_by(|a, b| a.date.cmp(&b.date));
        out
    }

    /// Reuses a chunk already cached in the Fetch-Progress Store; otherwise
    /// runs the three chunk-wide searches once and saves the buckets.
    async fn load_or_search_chunk(&self, chunk: &paths::MonthChunk, types: Option<&[SourceType]>) -> FetchResult<state_store::ChunkProgress> {
        let existing = self.fetch_progress.load_chunk(&chunk.key).await?;
        if !existing.prs.is_empty() || !existing.commits.is_empty() || !existing.issues.is_empty() {
            return Ok(existing);
        }

        let sources = types.unwrap_or(&ALL_SOURCES);
        let since = chunk.since.format("%Y-%m-%d").to_string();
        let until = chunk.until.format("%Y-%m-%d").to_string();
        let mut truncated = false;

        let prs = if sources.contains(&SourceType::Prs) {
            let (items, t) = self.search_prs(&self.client, "", Some((&since, &until))).await?;
            truncated |= t;
            items
        } else {
            Vec::new()
        };
        let commits = if sources.contains(&SourceType::Commits) {
            let (items, t) = self.search_commits(&self.client, "", Some((&since, &until))).await;
            truncated |= t;
            items
        } else {
            Vec::new()
        };
        let issues = if sources.contains(&SourceType::Issues) {
            let (items, t) = self.search_issues(&self.client, "", Some((&since, &until))).await?;
            truncated |= t;
            items
        } else {
            Vec::new()
        };

        if truncated {
            warn!(chunk = %chunk.key, "chunk search results truncated at the upstream page cap, per-date buckets may be incomplete");
        }

        let chunk_progress = state_store::ChunkProgress {
            chunk_key: chunk.key.clone(),
            completed_dates: Vec::new(),
            prs,
            commits,
            issues,
            done: false,
            truncated,
        };
        self.fetch_progress.save_chunk(chunk_progress.clone()).await?;
        Ok(chunk_progress)
    }

    async fn fetch_one_date_from_buckets(
        &self,
        client: &GhClient,
        date: &str,
        types: Option<&[SourceType]>,
        prs: Vec<Value>,
        commits: Vec<Value>,
        issues: Vec<Value>,
    ) -> DateOutcome {
        match self.persist_date_from_buckets(client, date, types, prs, commits, issues).await {
            Ok(out) => {
                let _ = self.checkpoints.update(LAST_FETCH_DATE, date).await;
                let _ = self.failed_dates.record_success(date).await;
                DateOutcome::success(date, out.prs.or(out.commits).or(out.issues))
            }
            Err(e) => {
                let permanent = e.is_permanent();
                let _ = self
                    .failed_dates
                    .record_failure(date, state_store::PHASE_FETCH, &e.to_string(), permanent)
                    .await;
                DateOutcome::failed(date, e.to_string())
            }
        }
    }

    async fn persist_date_from_buckets(
        &self,
        client: &GhClient,
        date_str: &str,
        types: Option<&[SourceType]>,
        prs: Vec<Value>,
        commits: Vec<Value>,
        issues: Vec<Value>,
    ) -> FetchResult<FetchPaths> {
        let date = paths::parse_date(date_str).ok_or_else(|| FetchError::Client(gh_client::FetchError::Other(format!("invalid date: {date_str}"))))?;
        let sources = types.unwrap_or(&ALL_SOURCES);
        let mut out = FetchPaths::default();

        if sources.contains(&SourceType::Prs) {
            let enriched = self.enrich_prs(client, prs).await;
            let path = paths::raw_prs_path(&self.data_root, date);
            write_json(&path, &enriched).await?;
            out.prs = Some(path);
        }
        if sources.contains(&SourceType::Commits) {
            let enriched = self.enrich_commits(client, commits).await;
            let path = paths::raw_commits_path(&self.data_root, date);
            write_json(&path, &enriched).await?;
            out.commits = Some(path);
        }
        if sources.contains(&SourceType::Issues) {
            let enriched = self.enrich_issues(client, issues).await;
            let path = paths::raw_issues_path(&self.data_root, date);
            write_json(&path, &enriched).await?;
            out.issues = Some(path);
        }

        self.daily_state.set_timestamp(state_store::PHASE_FETCH, date_str, None).await?;
        Ok(out)
    }

    /// Cheap clone of the `Arc`-held dependencies, for spawning per-date
    /// workers without cloning the whole `Fetcher`.
    fn clone_refs(&self) -> Fetcher {
        Fetcher {
            client: self.client.clone(),
            pool: self.pool.clone(),
            user: self.user.clone(),
            data_root: self.data_root.clone(),
            daily_state: self.daily_state.clone(),
            fetch_progress: self.fetch_progress.clone(),
            failed_dates: self.failed_dates.clone(),
            checkpoints: self.checkpoints.clone(),
        }
    }
}

/// Extracts a search item's calendar date for chunk bucketing. Commits
/// carry their date nested at `commit.committer.date`; PRs and issues
/// carry `updated_at` at the top level (the field the chunk query window
/// was built against).
fn item_date(item: &Value, field: &str) -> Option<String> {
    let raw = if field == "committer_date" {
        item.get("commit")?.get("committer")?.get("date")?.as_str()
    } else {
        item.get(field)?.as_str()
    }?;
    raw.get(0..10).map(str::to_string)
}

fn bucket_for_date(items: &[Value], date: &str, field: &str) -> Vec<Value> {
    items
        .iter()
        .filter(|item| item_date(item, field).as_deref() == Some(date))
        .cloned()
        .collect()
}

async fn write_json<T: serde::Serialize>(path: &std::path::Path, data: &T) -> FetchResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|source| FetchError::Io { path: parent.to_path_buf(), source })?;
    }
    let bytes = serde_json::to_vec_pretty(data)?;
    tokio::fs::write(path, bytes).await.map_err(|source| FetchError::Io { path: path.to_path_buf(), source })
}

trait Pipe: Sized {
    fn pipe<T>(self, f: impl FnOnce(Self) -> T) -> T {
        f(self)
    }
}
impl Pipe for &str {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_helper_applies_function() {
        let result: Option<(String, String)> = "https://api.github.com/repos/a/b".pipe(owner_repo_from_repository_url);
        assert_eq!(result, Some(("a".to_string(), "b".to_string())));
    }
}
