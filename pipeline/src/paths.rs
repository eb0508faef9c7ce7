//! Filesystem layout (§6): `data/{raw,normalized,summaries,state}/...`.
//! Every path builder here is a pure function of a root + date/period so
//! fetcher, normalizer and summarizer agree on where things live without
//! passing paths between each other.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()
}

fn ymd(date: NaiveDate) -> (i32, u32, u32) {
    (date.year(), date.month(), date.day())
}

pub fn raw_dir(root: &Path, date: NaiveDate) -> PathBuf {
    let (y, m, d) = ymd(date);
    root.join("raw")
        .join(format!("{y:04}"))
        .join(format!("{m:02}"))
        .join(format!("{d:02}"))
}

pub fn raw_prs_path(root: &Path, date: NaiveDate) -> PathBuf {
    raw_dir(root, date).join("prs.json")
}

pub fn raw_commits_path(root: &Path, date: NaiveDate) -> PathBuf {
    raw_dir(root, date).join("commits.json")
}

pub fn raw_issues_path(root: &Path, date: NaiveDate) -> PathBuf {
    raw_dir(root, date).join("issues.json")
}

pub fn normalized_dir(root: &Path, date: NaiveDate) -> PathBuf {
    let (y, m, d) = ymd(date);
    root.join("normalized")
        .join(format!("{y:04}"))
        .join(format!("{m:02}"))
        .join(format!("{d:02}"))
}

pub fn activities_path(root: &Path, date: NaiveDate) -> PathBuf {
    normalized_dir(root, date).join("activities.jsonl")
}

pub fn stats_path(root: &Path, date: NaiveDate) -> PathBuf {
    normalized_dir(root, date).join("stats.json")
}

pub fn daily_summary_path(root: &Path, date: NaiveDate) -> PathBuf {
    let (y, m, d) = ymd(date);
    root.join("summaries")
        .join(format!("{y:04}"))
        .join("daily")
        .join(format!("{m:02}-{d:02}.md"))
}

pub fn weekly_summary_path(root: &Path, iso_year: i32, iso_week: u32) -> PathBuf {
    root.join("summaries")
        .join(format!("{iso_year:04}"))
        .join("weekly")
        .join(format!("W{iso_week:02}.md"))
}

pub fn monthly_summary_path(root: &Path, year: i32, month: u32) -> PathBuf {
    root.join("summaries")
        .join(format!("{year:04}"))
        .join("monthly")
        .join(format!("{month:02}.md"))
}

pub fn yearly_summary_path(root: &Path, year: i32) -> PathBuf {
    root.join("summaries")
        .join(format!("{year:04}"))
        .join("yearly.md")
}

pub fn state_dir(root: &Path) -> PathBuf {
    root.join("state")
}

pub fn checkpoints_path(root: &Path) -> PathBuf {
    state_dir(root).join("checkpoints.json")
}

pub fn daily_state_path(root: &Path) -> PathBuf {
    state_dir(root).join("daily_state.json")
}

pub fn failed_dates_path(root: &Path) -> PathBuf {
    state_dir(root).join("failed_dates.json")
}

pub fn fetch_progress_dir(root: &Path) -> PathBuf {
    state_dir(root).join("fetch_progress")
}

/// Every calendar date in `[since, until]`, inclusive, formatted `YYYY-MM-DD`.
pub fn date_range(since: NaiveDate, until: NaiveDate) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = since;
    while cur <= until {
        out.push(cur.format("%Y-%m-%d").to_string());
        cur = cur.succ_opt().expect("date overflow");
    }
    out
}

/// One entry per calendar month overlapping `[since, until]`: the chunk's
/// own `(chunk_since, chunk_until)` clamped to the overall range, and its
/// `chunk_key` (`since__until`, the literal query window — matches what
/// the Fetch-Progress Store keys on).
pub struct MonthChunk {
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub key: String,
}

pub fn month_chunks(since: NaiveDate, until: NaiveDate) -> Vec<MonthChunk> {
    let mut chunks = Vec::new();
    let mut cursor = NaiveDate::from_ymd_opt(since.year(), since.month(), 1).unwrap();
    while cursor <= until {
        let month_end = last_day_of_month(cursor);
        let chunk_since = cursor.max(since);
        let chunk_until = month_end.min(until);
        chunks.push(MonthChunk {
            since: chunk_since,
            until: chunk_until,
            key: format!(
                "{}__{}",
                chunk_since.format("%Y-%m-%d"),
                chunk_until.format("%Y-%m-%d")
            ),
        });
        cursor = next_month(cursor);
    }
    chunks
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let next = next_month(date);
    next.pred_opt().expect("date underflow")
}

fn next_month(date: NaiveDate) -> NaiveDate {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_chunks_splits_on_calendar_boundaries() {
        let since = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let until = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let chunks = month_chunks(since, until);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].since, since);
        assert_eq!(chunks[0].until, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        assert_eq!(chunks[2].since, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(chunks[2].until, until);
    }

    #[test]
    fn date_range_is_inclusive() {
        let since = NaiveDate::from_ymd_opt(2025, 2, 27).unwrap();
        let until = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let dates = date_range(since, until);
        assert_eq!(dates, vec!["2025-02-27", "2025-02-28", "2025-03-01"]);
    }

    #[test]
    fn path_builders_match_the_declared_layout() {
        let root = Path::new("data");
        let date = NaiveDate::from_ymd_opt(2025, 2, 16).unwrap();
        assert_eq!(raw_prs_path(root, date), Path::new("data/raw/2025/02/16/prs.json"));
        assert_eq!(
            activities_path(root, date),
            Path::new("data/normalized/2025/02/16/activities.jsonl")
        );
        assert_eq!(
            daily_summary_path(root, date),
            Path::new("data/summaries/2025/daily/02-16.md")
        );
        assert_eq!(weekly_summary_path(root, 2025, 7), Path::new("data/summaries/2025/weekly/W07.md"));
        assert_eq!(monthly_summary_path(root, 2025, 2), Path::new("data/summaries/2025/monthly/02.md"));
        assert_eq!(yearly_summary_path(root, 2025), Path::new("data/summaries/2025/yearly.md"));
    }
}
