//! Summarizer Service (§4.11): daily/weekly/monthly/yearly Markdown
//! rollups plus free-form `query`, all rendered via `LlmRouter` and
//! persisted under `data/summaries/...`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use tracing::warn;

use llm_router::{ChatOptions, LlmRouter};
use state_store::{CheckpointStore, DailyStateStore, LAST_SUMMARIZE_DATE};
use storage::StorageSink;

use crate::errors::{SummarizeError, SummarizeResult};
use crate::model::{Activity, DailyStats};
use crate::outcome::DateOutcome;
use crate::paths;

const DAILY_TEMPLATE: &str = include_str!("../prompts/daily.md");
const WEEKLY_TEMPLATE: &str = include_str!("../prompts/weekly.md");
const MONTHLY_TEMPLATE: &str = include_str!("../prompts/monthly.md");
const YEARLY_TEMPLATE: &str = include_str!("../prompts/yearly.md");
const QUERY_TEMPLATE: &str = include_str!("../prompts/query.md");

/// The literal sentinel persisted for a day with no activity, in place
/// of spending an LLM call on an empty recap.
const NO_ACTIVITY_SENTINEL: &str = "활동이 없는 날";

#[derive(Clone)]
pub struct Summarizer {
    data_root: PathBuf,
    daily_state: Arc<DailyStateStore>,
    checkpoints: Arc<CheckpointStore>,
    router: Arc<LlmRouter>,
    storage: Arc<StorageSink>,
}

impl Summarizer {
    pub fn new(
        data_root: impl Into<PathBuf>,
        daily_state: Arc<DailyStateStore>,
        checkpoints: Arc<CheckpointStore>,
        router: Arc<LlmRouter>,
        storage: Arc<StorageSink>,
    ) -> Self {
        Self {
            data_root: data_root.into(),
            daily_state,
            checkpoints,
            router,
            storage,
        }
    }

    pub async fn daily(&self, date_str: &str) -> SummarizeResult<PathBuf> {
        let date = parse_date(date_str)?;
        let activities = load_activities(&self.data_root, date).await?;
        let stats = load_stats(&self.data_root, date).await?;

        let path = paths::daily_summary_path(&self.data_root, date);
        let markdown = if activities.is_empty() {
            NO_ACTIVITY_SENTINEL.to_string()
        } else {
            let prompt = DAILY_TEMPLATE
                .replace("{{date}}", date_str)
                .replace("{{stats}}", &render_stats(&stats))
                .replace("{{activities}}", &render_activities(&activities));
            let opts = ChatOptions::for_task("daily");
            self.router.chat(&prompt, "Write the recap now.", &opts).await?
        };

        write_text(&path, &markdown).await?;
        self.daily_state.set_timestamp(state_store::PHASE_SUMMARIZE, date_str, None).await?;
        self.checkpoints.update(LAST_SUMMARIZE_DATE, date_str).await?;
        self.storage.store_summary("daily", date_str, &markdown).await;
        Ok(path)
    }

    pub async fn weekly(&self, iso_year: i32, iso_week: u32) -> SummarizeResult<PathBuf> {
        let dailies = collect_week_dailies(&self.data_root, iso_year, iso_week).await?;
        if dailies.is_empty() {
            return Err(SummarizeError::MissingInput(format!("no daily summaries for {iso_year}-W{iso_week:02}")));
        }
        let joined = dailies.join("\n\n---\n\n");
        let prompt = WEEKLY_TEMPLATE
            .replace("{{year}}", &iso_year.to_string())
            .replace("{{week}}", &format!("{iso_week:02}"))
            .replace("{{daily_summaries}}", &joined);
        let opts = ChatOptions::for_task("weekly");
        let markdown = self.router.chat(&prompt, "Write the weekly recap now.", &opts).await?;

        let path = paths::weekly_summary_path(&self.data_root, iso_year, iso_week);
        write_text(&path, &markdown).await?;
        self.storage.store_summary("weekly", &format!("{iso_year}-W{iso_week:02}"), &markdown).await;
        Ok(path)
    }

    pub async fn monthly(&self, year: i32, month: u32) -> SummarizeResult<PathBuf> {
        let weeklies = collect_month_weeklies(&self.data_root, year, month).await;
        if weeklies.is_empty() {
            return Err(SummarizeError::MissingInput(format!("no weekly summaries for {year}-{month:02}")));
        }
        let joined = weeklies.join("\n\n---\n\n");
        let prompt = MONTHLY_TEMPLATE
            .replace("{{year}}", &year.to_string())
            .replace("{{month}}", &format!("{month:02}"))
            .replace("{{weekly_summaries}}", &joined);
        let opts = ChatOptions::for_task("monthly");
        let markdown = self.router.chat(&prompt, "Write the monthly recap now.", &opts).await?;

        let path = paths::monthly_summary_path(&self.data_root, year, month);
        write_text(&path, &markdown).await?;
        self.storage.store_summary("monthly", &format!("{year}-{month:02}"), &markdown).await;
        Ok(path)
    }

    pub async fn yearly(&self, year: i32) -> SummarizeResult<PathBuf> {
        let mut monthlies = Vec::new();
        for month in 1..=12u32 {
            let path = paths::monthly_summary_path(&self.data_root, year, month);
            if let Ok(text) = tokio::fs::read_to_string(&path).await {
                monthlies.push(text);
            }
        }
        if monthlies.is_empty() {
            return Err(SummarizeError::MissingInput(format!("no monthly summaries for {year}")));
        }
        let joined = monthlies.join("\n\n---\n\n");
        let prompt = YEARLY_TEMPLATE.replace("{{year}}", &year.to_string()).replace("{{monthly_summaries}}", &joined);
        let opts = ChatOptions::for_task("yearly");
        let markdown = self.router.chat(&prompt, "Write the yearly retrospective now.", &opts).await?;

        let path = paths::yearly_summary_path(&self.data_root, year);
        write_text(&path, &markdown).await?;
        self.storage.store_summary("yearly", &year.to_string(), &markdown).await;
        Ok(path)
    }

    /// Walks backward from today across year boundaries collecting the
    /// last `months_back` monthly summaries that exist, then answers
    /// `question` against them via `task="query"`.
    pub async fn query(&self, question: &str, months_back: u32) -> SummarizeResult<String> {
        let today = Utc::now().date_naive();
        let mut monthlies = Vec::new();
        let mut cursor = (today.year(), today.month());
        for _ in 0..months_back {
            let (year, month) = cursor;
            let path = paths::monthly_summary_path(&self.data_root, year, month);
            if let Ok(text) = tokio::fs::read_to_string(&path).await {
                monthlies.push(text);
            }
            cursor = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
        }
        if monthlies.is_empty() {
            return Err(SummarizeError::MissingInput("no monthly summaries available for query context".to_string()));
        }
        monthlies.reverse();
        let joined = monthlies.join("\n\n---\n\n");
        let prompt = QUERY_TEMPLATE.replace("{{question}}", question).replace("{{monthly_summaries}}", &joined);
        let opts = ChatOptions::for_task("query");
        Ok(self.router.chat(&prompt, question, &opts).await?)
    }

    pub async fn daily_range(&self, since: NaiveDate, until: NaiveDate, force: bool, max_workers: usize) -> Vec<DateOutcome> {
        let dates = paths::date_range(since, until);
        let candidates: Vec<String> = if force {
            dates.clone()
        } else {
            self.daily_state.stale_dates(state_store::PHASE_SUMMARIZE, &dates).await
        };

        if candidates.is_empty() {
            return dates.iter().map(|d| DateOutcome::skipped(d)).collect();
        }

        let mut results: HashMap<String, DateOutcome> = HashMap::new();
        if max_workers > 1 {
            let futs = candidates.iter().map(|date| self.daily_one_isolated(date));
            let outcomes = futures::future::join_all(futs).await;
            for (date, outcome) in candidates.iter().zip(outcomes) {
                results.insert(date.clone(), outcome);
            }
        } else {
            for date in &candidates {
                let outcome = self.daily_one_isolated(date).await;
                results.insert(date.clone(), outcome);
            }
        }

        dates.into_iter().map(|d| results.remove(&d).unwrap_or_else(|| DateOutcome::skipped(&d))).collect()
    }

    async fn daily_one_isolated(&self, date: &str) -> DateOutcome {
        match self.daily(date).await {
            Ok(path) => DateOutcome::success(date, Some(path)),
            Err(e) => DateOutcome::failed(date, e.to_string()),
        }
    }
}

fn parse_date(date_str: &str) -> SummarizeResult<NaiveDate> {
    paths::parse_date(date_str).ok_or_else(|| SummarizeError::MissingInput(format!("invalid date: {date_str}")))
}

async fn load_activities(root: &std::path::Path, date: NaiveDate) -> SummarizeResult<Vec<Activity>> {
    let path = paths::activities_path(root, date);
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(t) => t,
        Err(_) => return Ok(Vec::new()),
    };
    let activities = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect();
    Ok(activities)
}

async fn load_stats(root: &std::path::Path, date: NaiveDate) -> SummarizeResult<DailyStats> {
    let path = paths::stats_path(root, date);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => serde_json::from_str(&text).map_err(|_| SummarizeError::MissingInput(format!("malformed stats at {}", path.display()))),
        Err(_) => Ok(DailyStats::empty(&date.format("%Y-%m-%d").to_string())),
    }
}

fn render_stats(stats: &DailyStats) -> String {
    serde_json::to_string_pretty(stats).unwrap_or_default()
}

fn render_activities(activities: &[Activity]) -> String {
    activities
        .iter()
        .map(|a| format!("- [{}] {} ({})", a.kind.as_str(), a.auto_summary, a.repo))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every ISO `(year, week)` a day in `[since, until]` belongs to, via the
/// 7 day-of-week offsets from that week's Monday.
async fn collect_week_dailies(root: &std::path::Path, iso_year: i32, iso_week: u32) -> SummarizeResult<Vec<String>> {
    let Some(monday) = NaiveDate::from_isoywd_opt(iso_year, iso_week, chrono::Weekday::Mon) else {
        return Err(SummarizeError::MissingInput(format!("invalid ISO week {iso_year}-W{iso_week:02}")));
    };
    let mut out = Vec::new();
    for offset in 0..7 {
        let day = monday + chrono::Duration::days(offset);
        let path = paths::daily_summary_path(root, day);
        if let Ok(text) = tokio::fs::read_to_string(&path).await {
            out.push(text);
        }
    }
    Ok(out)
}

/// Every ISO week whose Monday-anchored span overlaps the given calendar
/// month, deduplicated — a month typically spans 4-6 ISO weeks.
async fn collect_month_weeklies(root: &std::path::Path, year: i32, month: u32) -> Vec<String> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let last = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .and_then(|d| d.pred_opt())
    .unwrap_or(first);

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let mut cursor = first;
    while cursor <= last {
        let iso = cursor.iso_week();
        let key = (iso.year(), iso.week());
        if seen.insert(key) {
            let path = paths::weekly_summary_path(root, iso.year(), iso.week());
            if let Ok(text) = tokio::fs::read_to_string(&path).await {
                out.push(text);
            } else {
                warn!(year = iso.year(), week = iso.week(), "missing weekly summary while assembling monthly recap");
            }
        }
        cursor = cursor.succ_opt().expect("date overflow");
    }
    out
}

async fn write_text(path: &std::path::Path, text: &str) -> SummarizeResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|source| SummarizeError::Io { path: parent.to_path_buf(), source })?;
    }
    tokio::fs::write(path, text).await.map_err(|source| SummarizeError::Io { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_activities_formats_one_line_per_activity() {
        let activities = vec![Activity {
            date: "2025-02-16".into(),
            source: "github".into(),
            kind: crate::model::ActivityKind::Commit,
            external_id: 0,
            timestamp: Utc::now(),
            repo: "acme/widgets".into(),
            title: "fix bug".into(),
            url: String::new(),
            auto_summary: "COMMIT: fix bug (acme/widgets) +3/-1".into(),
            body: String::new(),
            review_bodies: Vec::new(),
            comment_bodies: Vec::new(),
            files: Vec::new(),
            file_patches: HashMap::new(),
            additions: 3,
            deletions: 1,
            labels: Vec::new(),
            evidence_urls: Vec::new(),
            comment_contexts: Vec::new(),
            change_summary: None,
            intent: None,
        }];
        let rendered = render_activities(&activities);
        assert!(rendered.contains("COMMIT"));
        assert!(rendered.contains("acme/widgets"));
    }

    #[test]
    fn templates_embed_successfully() {
        assert!(DAILY_TEMPLATE.contains("{{date}}"));
        assert!(WEEKLY_TEMPLATE.contains("{{week}}"));
        assert!(MONTHLY_TEMPLATE.contains("{{month}}"));
        assert!(YEARLY_TEMPLATE.contains("{{year}}"));
        assert!(QUERY_TEMPLATE.contains("{{question}}"));
    }
}
