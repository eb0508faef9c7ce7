//! Scheduler job bodies (§4.13): each builds its target, runs the
//! relevant pipeline step, records a [`SchedulerEvent`] in history, and
//! notifies — unconditionally, loss-tolerant, never propagating the
//! pipeline's error upward.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Utc};
use pipeline::{Orchestrator, Summarizer};

use crate::history::{SchedulerEvent, SchedulerHistory};
use crate::notifier::Notifier;

/// All ISO `(year, week)` pairs that overlap the given calendar month.
fn weeks_in_month(year: i32, month: u32) -> Vec<(i32, u32)> {
    let mut seen = BTreeSet::new();
    let mut result = Vec::new();
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return result;
    };
    let days_in_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .map(|next| (next - first).num_days())
    .unwrap_or(28);

    for offset in 0..days_in_month {
        let Some(day) = first.checked_add_signed(chrono::Duration::days(offset)) else {
            continue;
        };
        let iso = day.iso_week();
        let key = (iso.year(), iso.week());
        if seen.insert(key) {
            result.push(key);
        }
    }
    result
}

pub async fn run_daily_job(orchestrator: &Orchestrator, history: &SchedulerHistory, notifier: &dyn Notifier) {
    let yesterday = (Utc::now().date_naive() - chrono::Duration::days(1)).format("%Y-%m-%d").to_string();
    let triggered_at = Utc::now();

    let event = match orchestrator.run_daily(&yesterday, None).await {
        Ok(_) => SchedulerEvent::success("daily", &yesterday, triggered_at),
        Err(e) => {
            tracing::error!(date = %yesterday, error = %e, "scheduler daily job failed");
            SchedulerEvent::failed("daily", &yesterday, triggered_at, e.to_string())
        }
    };
    history.record(event.clone()).await;
    notifier.notify(&event).await;
}

pub async fn run_weekly_job(summarizer: &Summarizer, history: &SchedulerHistory, notifier: &dyn Notifier) {
    let last_week = Utc::now().date_naive() - chrono::Duration::weeks(1);
    let iso = last_week.iso_week();
    let target = format!("{}-W{:02}", iso.year(), iso.week());
    let triggered_at = Utc::now();

    let event = match summarizer.weekly(iso.year(), iso.week()).await {
        Ok(_) => SchedulerEvent::success("weekly", &target, triggered_at),
        Err(e) => {
            tracing::error!(target = %target, error = %e, "scheduler weekly job failed");
            SchedulerEvent::failed("weekly", &target, triggered_at, e.to_string())
        }
    };
    history.record(event.clone()).await;
    notifier.notify(&event).await;
}

pub async fn run_monthly_job(summarizer: &Summarizer, history: &SchedulerHistory, notifier: &dyn Notifier) {
    let today = Utc::now().date_naive();
    let (last_year, last_month) = if today.month() == 1 { (today.year() - 1, 12) } else { (today.year(), today.month() - 1) };
    let target = format!("{last_year}-{last_month:02}");
    let triggered_at = Utc::now();

    for (wy, ww) in weeks_in_month(last_year, last_month) {
        // Errors swallowed: a missing daily file for one of the month's
        // weeks must not stop the rest of the cascade.
        let _ = summarizer.weekly(wy, ww).await;
    }

    let event = match summarizer.monthly(last_year, last_month).await {
        Ok(_) => SchedulerEvent::success("monthly", &target, triggered_at),
        Err(e) => {
            tracing::error!(target = %target, error = %e, "scheduler monthly job failed");
            SchedulerEvent::failed("monthly", &target, triggered_at, e.to_string())
        }
    };
    history.record(event.clone()).await;
    notifier.notify(&event).await;
}

pub async fn run_yearly_job(summarizer: &Summarizer, history: &SchedulerHistory, notifier: &dyn Notifier) {
    let last_year = Utc::now().date_naive().year() - 1;
    let target = last_year.to_string();
    let triggered_at = Utc::now();

    for month in 1..=12u32 {
        for (wy, ww) in weeks_in_month(last_year, month) {
            let _ = summarizer.weekly(wy, ww).await;
        }
        let _ = summarizer.monthly(last_year, month).await;
    }

    let event = match summarizer.yearly(last_year).await {
        Ok(_) => SchedulerEvent::success("yearly", &target, triggered_at),
        Err(e) => {
            tracing::error!(target = %target, error = %e, "scheduler yearly job failed");
            SchedulerEvent::failed("yearly", &target, triggered_at, e.to_string())
        }
    };
    history.record(event.clone()).await;
    notifier.notify(&event).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weeks_in_month_covers_boundary_weeks() {
        // February 2025 starts on a Saturday and ends on a Friday -- its
        // first and last ISO weeks both spill into January/March.
        let weeks = weeks_in_month(2025, 2);
        assert!(weeks.contains(&(2025, 5)));
        assert!(weeks.len() >= 4);
    }

    #[test]
    fn december_rolls_into_next_years_first_week() {
        let weeks = weeks_in_month(2024, 12);
        assert!(weeks.iter().any(|&(y, w)| y == 2025 && w == 1));
    }
}
