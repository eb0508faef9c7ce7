//! `SchedulerService` (§4.13): a thin async wrapper around four
//! `cron`-driven loops, one per trigger, each invoking its job function
//! and recording the outcome. Mirrors the Python original's APScheduler
//! wrapper shape (`start`/`shutdown`/`pause`/`resume`/`status`) without
//! depending on APScheduler itself -- `cron::Schedule::upcoming` plus
//! `tokio::time::sleep_until` gives the same "compute next fire, sleep,
//! run" loop.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use pipeline::{Orchestrator, Summarizer};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ScheduleConfig;
use crate::errors::{Result, SchedulerError};
use crate::history::SchedulerHistory;
use crate::jobs::{run_daily_job, run_monthly_job, run_weekly_job, run_yearly_job};
use crate::notifier::Notifier;

#[derive(Debug, Clone, serde::Serialize)]
pub struct JobStatus {
    pub id: &'static str,
    pub next_run: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SchedulerStatus {
    pub state: &'static str,
    pub jobs: Vec<JobStatus>,
}

struct RunningTasks {
    daily: JoinHandle<()>,
    weekly: JoinHandle<()>,
    monthly: JoinHandle<()>,
    yearly: JoinHandle<()>,
}

pub struct SchedulerService {
    config: ScheduleConfig,
    tz: Tz,
    history: Arc<SchedulerHistory>,
    notifier: Arc<dyn Notifier>,
    orchestrator: Arc<Orchestrator>,
    summarizer: Arc<Summarizer>,
    paused: Arc<AtomicBool>,
    tasks: Option<RunningTasks>,
}

impl SchedulerService {
    pub fn new(
        config: ScheduleConfig,
        history: Arc<SchedulerHistory>,
        notifier: Arc<dyn Notifier>,
        orchestrator: Arc<Orchestrator>,
        summarizer: Arc<Summarizer>,
    ) -> Self {
        let tz: Tz = config.timezone.parse().unwrap_or(Tz::UTC);
        Self {
            config,
            tz,
            history,
            notifier,
            orchestrator,
            summarizer,
            paused: Arc::new(AtomicBool::new(false)),
            tasks: None,
        }
    }

    /// Spawns the four cron loops. A no-op, logged, when the config has
    /// `enabled = false` -- routes must keep answering status/history
    /// calls in this disabled mode, they just see an empty job list.
    pub fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            info!("scheduler disabled in config");
            return Ok(());
        }

        let daily_schedule = parse_schedule("daily", &self.config.daily_cron())?;
        let weekly_schedule = parse_schedule("weekly", &self.config.weekly_cron())?;
        let monthly_schedule = parse_schedule("monthly", &self.config.monthly_cron())?;
        let yearly_schedule = parse_schedule("yearly", &self.config.yearly_cron())?;

        let daily = self.spawn_loop(daily_schedule, {
            let orchestrator = self.orchestrator.clone();
            let history = self.history.clone();
            let notifier = self.notifier.clone();
            move || {
                let orchestrator = orchestrator.clone();
                let history = history.clone();
                let notifier = notifier.clone();
                async move { run_daily_job(&orchestrator, &history, notifier.as_ref()).await }
            }
        });

        let weekly = self.spawn_loop(weekly_schedule, {
            let summarizer = self.summarizer.clone();
            let history = self.history.clone();
            let notifier = self.notifier.clone();
            move || {
                let summarizer = summarizer.clone();
                let history = history.clone();
                let notifier = notifier.clone();
                async move { run_weekly_job(&summarizer, &history, notifier.as_ref()).await }
            }
        });

        let monthly = self.spawn_loop(monthly_schedule, {
            let summarizer = self.summarizer.clone();
            let history = self.history.clone();
            let notifier = self.notifier.clone();
            move || {
                let summarizer = summarizer.clone();
                let history = history.clone();
                let notifier = notifier.clone();
                async move { run_monthly_job(&summarizer, &history, notifier.as_ref()).await }
            }
        });

        let yearly = self.spawn_loop(yearly_schedule, {
            let summarizer = self.summarizer.clone();
            let history = self.history.clone();
            let notifier = self.notifier.clone();
            move || {
                let summarizer = summarizer.clone();
                let history = history.clone();
                let notifier = notifier.clone();
                async move { run_yearly_job(&summarizer, &history, notifier.as_ref()).await }
            }
        });

        self.tasks = Some(RunningTasks { daily, weekly, monthly, yearly });
        info!(tz = %self.config.timezone, "scheduler started");
        Ok(())
    }

    fn spawn_loop<F, Fut>(&self, schedule: Schedule, job: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let tz = self.tz;
        let paused = self.paused.clone();
        tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(tz).next() else {
                    warn!("cron schedule produced no further occurrences, stopping loop");
                    break;
                };
                let now = Utc::now().with_timezone(&tz);
                let wait = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);
                tokio::time::sleep(wait).await;
                if paused.load(Ordering::SeqCst) {
                    continue;
                }
                job().await;
            }
        })
    }

    /// `wait=false` best-effort shutdown (§5): aborts the loop tasks
    /// without waiting for an in-flight job to finish.
    pub fn shutdown(&mut self) {
        if let Some(tasks) = self.tasks.take() {
            tasks.daily.abort();
            tasks.weekly.abort();
            tasks.monthly.abort();
            tasks.yearly.abort();
        }
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn status(&self) -> SchedulerStatus {
        if !self.config.enabled {
            return SchedulerStatus { state: "disabled", jobs: Vec::new() };
        }
        if self.tasks.is_none() {
            return SchedulerStatus { state: "stopped", jobs: Vec::new() };
        }
        let state = if self.paused.load(Ordering::SeqCst) { "paused" } else { "running" };
        SchedulerStatus { state, jobs: self.next_runs() }
    }

    fn next_runs(&self) -> Vec<JobStatus> {
        let next = |cron_expr: String, id: &'static str| -> JobStatus {
            let next_run = Schedule::from_str(&cron_expr)
                .ok()
                .and_then(|s| s.upcoming(self.tz).next())
                .map(|dt| dt.with_timezone(&chrono::Utc));
            JobStatus { id, next_run }
        };
        vec![
            next(self.config.daily_cron(), "daily"),
            next(self.config.weekly_cron(), "weekly"),
            next(self.config.monthly_cron(), "monthly"),
            next(self.config.yearly_cron(), "yearly"),
        ]
    }
}

fn parse_schedule(job: &'static str, expr: &str) -> Result<Schedule> {
    Schedule::from_str(expr).map_err(|e| SchedulerError::InvalidCron { job, reason: e.to_string() })
}
