//! CLI surface (§6): one subcommand per pipeline phase, plus `run` for
//! the full daily pipeline, `query` for the free-form Q&A mode, and
//! `serve` to run the cron scheduler unattended.

use std::process::ExitCode;

use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pipeline::SourceType;

use crate::wiring;

#[derive(Parser)]
#[command(name = "work-recap", version, about = "Per-day GitHub activity recap pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Search + enrich raw PRs/commits/issues for a date or range.
    Fetch(RangeArgs),
    /// Raw activity -> canonical activities + daily stats.
    Normalize(RangeArgs),
    /// Render a Markdown rollup.
    Summarize {
        #[command(subcommand)]
        kind: SummarizeKind,
    },
    /// fetch -> normalize -> summarize, for one date or a backfill range.
    Run(RangeArgs),
    /// Answer a free-form question using recent monthly summaries as context.
    Query {
        question: String,
        #[arg(long, default_value_t = 3)]
        months_back: u32,
    },
    /// Run the cron-triggered daily/weekly/monthly/yearly scheduler and block.
    Serve,
}

#[derive(Subcommand)]
pub enum SummarizeKind {
    Daily(RangeArgs),
    Weekly {
        /// `YEAR-WW`, ISO week. Defaults to last week when omitted.
        year_week: Option<String>,
    },
    Monthly {
        /// `YEAR-MM`. Defaults to last month when omitted.
        year_month: Option<String>,
    },
    Yearly {
        /// Defaults to last year when omitted.
        year: Option<i32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SourceArg {
    Prs,
    Commits,
    Issues,
}

impl SourceArg {
    fn to_source_type(self) -> SourceType {
        match self {
            SourceArg::Prs => SourceType::Prs,
            SourceArg::Commits => SourceType::Commits,
            SourceArg::Issues => SourceType::Issues,
        }
    }
}

#[derive(Args)]
pub struct RangeArgs {
    /// A single calendar date, `YYYY-MM-DD`.
    date: Option<String>,
    #[arg(long)]
    since: Option<String>,
    #[arg(long)]
    until: Option<String>,
    #[arg(long)]
    force: bool,
    /// Restricts the operation to these raw source types; repeatable. All three when omitted.
    #[arg(long = "type", value_enum)]
    r#type: Vec<SourceArg>,
    #[arg(long, default_value_t = 1)]
    workers: usize,
    #[arg(long, overrides_with = "no_enrich", default_value_t = true)]
    enrich: bool,
    #[arg(long, overrides_with = "enrich")]
    no_enrich: bool,
    #[arg(long, overrides_with = "no_batch")]
    batch: bool,
    #[arg(long, overrides_with = "batch")]
    no_batch: bool,
}

impl RangeArgs {
    fn types(&self) -> Option<Vec<SourceType>> {
        if self.r#type.is_empty() {
            None
        } else {
            Some(self.r#type.iter().map(|t| t.to_source_type()).collect())
        }
    }

    fn enrich(&self) -> bool {
        !self.no_enrich && self.enrich
    }

    fn batch(&self) -> bool {
        self.batch && !self.no_batch
    }
}

/// Resolves the mutually-exclusive date selectors (§6) into a `[since,
/// until]` window. Exactly one of {positional date, `--since`/`--until`}
/// may be given; neither falls back to catch-up-from-checkpoint, else
/// today.
async fn resolve_range(args: &RangeArgs, checkpoint_key: &str, checkpoints: &state_store::CheckpointStore) -> Result<(NaiveDate, NaiveDate)> {
    let has_date = args.date.is_some();
    let has_since_until = args.since.is_some() || args.until.is_some();
    if has_date && has_since_until {
        bail!("--since/--until cannot be combined with a positional date");
    }

    if let Some(date) = &args.date {
        let d = parse_date(date)?;
        return Ok((d, d));
    }

    if has_since_until {
        let since = args.since.as_deref().ok_or_else(|| anyhow::anyhow!("--since is required when --until is given"))?;
        let until = args.until.as_deref().ok_or_else(|| anyhow::anyhow!("--until is required when --since is given"))?;
        return Ok((parse_date(since)?, parse_date(until)?));
    }

    let today = Utc::now().date_naive();
    match checkpoints.get(checkpoint_key).await {
        Some(last) => {
            let last_date = parse_date(&last)?;
            let since = last_date.succ_opt().unwrap_or(last_date);
            Ok((since, today))
        }
        None => Ok((today, today)),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| anyhow::anyhow!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn parse_year_week(s: &str) -> Result<(i32, u32)> {
    let (y, w) = s.split_once('-').ok_or_else(|| anyhow::anyhow!("invalid YEAR-WW '{s}'"))?;
    let w = w.strip_prefix('W').unwrap_or(w);
    Ok((y.parse()?, w.parse()?))
}

fn parse_year_month(s: &str) -> Result<(i32, u32)> {
    let (y, m) = s.split_once('-').ok_or_else(|| anyhow::anyhow!("invalid YEAR-MM '{s}'"))?;
    Ok((y.parse()?, m.parse()?))
}

/// Prints the `§7` one-line summary and an "exhausted" footer for any
/// date whose attempts are spent, and returns the process exit code.
async fn report_and_exit(outcomes: &[pipeline::DateOutcome], failed_dates: &state_store::FailedDateStore) -> ExitCode {
    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    let skipped = outcomes.len() - succeeded - failed;
    println!("{succeeded} succeeded / {skipped} skipped / {failed} failed");

    for outcome in outcomes.iter().filter(|o| o.is_failed()) {
        if let Some(error) = &outcome.error {
            println!("  {}: {error}", outcome.date);
        }
    }

    let exhausted = failed_dates.exhausted_dates().await;
    if !exhausted.is_empty() {
        println!("exhausted (no further retries): {}", exhausted.join(", "));
    }

    let truncated: Vec<&str> = outcomes.iter().filter(|o| o.truncated).map(|o| o.date.as_str()).collect();
    if !truncated.is_empty() {
        println!("truncated (hit the upstream 1000-result search cap, bucket may be incomplete): {}", truncated.join(", "));
    }

    if failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Fetch(args) => {
            let app = wiring::build(args.workers).await?;
            let (since, until) = resolve_range(&args, state_store::LAST_FETCH_DATE, &app.checkpoints).await?;
            let types = args.types();
            if since == until {
                match app.orchestrator.fetcher().fetch(&since.format("%Y-%m-%d").to_string(), types.as_deref()).await {
                    Ok(paths) => {
                        println!("1 succeeded / 0 skipped / 0 failed");
                        if paths.truncated {
                            println!("  {since}: truncated (hit the upstream 1000-result search cap, bucket may be incomplete)");
                        }
                        Ok(ExitCode::SUCCESS)
                    }
                    Err(e) => {
                        println!("0 succeeded / 0 skipped / 1 failed");
                        println!("  {since}: {e}");
                        Ok(ExitCode::FAILURE)
                    }
                }
            } else {
                let outcomes = app.orchestrator.fetcher().fetch_range(since, until, types.as_deref(), args.force, args.workers).await;
                Ok(report_and_exit(&outcomes, &app.failed_dates).await)
            }
        }

        Command::Normalize(args) => {
            let app = wiring::build(args.workers).await?;
            let (since, until) = resolve_range(&args, state_store::LAST_NORMALIZE_DATE, &app.checkpoints).await?;
            if since == until {
                match app.orchestrator.normalizer().normalize_with(&since.format("%Y-%m-%d").to_string(), args.enrich()).await {
                    Ok(_) => {
                        println!("1 succeeded / 0 skipped / 0 failed");
                        Ok(ExitCode::SUCCESS)
                    }
                    Err(e) => {
                        println!("0 succeeded / 0 skipped / 1 failed");
                        println!("  {since}: {e}");
                        Ok(ExitCode::FAILURE)
                    }
                }
            } else {
                let outcomes = app
                    .orchestrator
                    .normalizer()
                    .normalize_range(since, until, args.force, args.workers, args.batch(), args.enrich())
                    .await;
                Ok(report_and_exit(&outcomes, &app.failed_dates).await)
            }
        }

        Command::Summarize { kind } => run_summarize(kind).await,

        Command::Run(args) => {
            let app = wiring::build(args.workers).await?;
            let (since, until) = resolve_range(&args, state_store::LAST_SUMMARIZE_DATE, &app.checkpoints).await?;
            let types = args.types();
            if since == until {
                match app.orchestrator.run_daily_with(&since.format("%Y-%m-%d").to_string(), types.as_deref(), args.enrich()).await {
                    Ok(outcome) => {
                        println!("1 succeeded / 0 skipped / 0 failed");
                        if let Some(path) = &outcome.path {
                            println!("  {} -> {}", outcome.date, path.display());
                        }
                        Ok(ExitCode::SUCCESS)
                    }
                    Err(e) => {
                        println!("0 succeeded / 0 skipped / 1 failed");
                        println!("  {since}: {e}");
                        Ok(ExitCode::FAILURE)
                    }
                }
            } else {
                let outcomes = app
                    .orchestrator
                    .run_range(since, until, args.force, types.as_deref(), args.workers, args.batch(), args.enrich())
                    .await;
                Ok(report_and_exit(&outcomes, &app.failed_dates).await)
            }
        }

        Command::Query { question, months_back } => {
            let app = wiring::build(1).await?;
            match app.summarizer.query(&question, months_back).await {
                Ok(answer) => {
                    println!("{answer}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("query failed: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Command::Serve => run_serve().await,
    }
}

async fn run_summarize(kind: SummarizeKind) -> Result<ExitCode> {
    match kind {
        SummarizeKind::Daily(args) => {
            let app = wiring::build(args.workers).await?;
            let (since, until) = resolve_range(&args, state_store::LAST_SUMMARIZE_DATE, &app.checkpoints).await?;
            if since == until {
                match app.summarizer.daily(&since.format("%Y-%m-%d").to_string()).await {
                    Ok(path) => {
                        println!("{}", path.display());
                        Ok(ExitCode::SUCCESS)
                    }
                    Err(e) => {
                        eprintln!("{since}: {e}");
                        Ok(ExitCode::FAILURE)
                    }
                }
            } else {
                let outcomes = app.summarizer.daily_range(since, until, args.force, args.workers).await;
                Ok(report_and_exit(&outcomes, &app.failed_dates).await)
            }
        }

        SummarizeKind::Weekly { year_week } => {
            let app = wiring::build(1).await?;
            let (year, week) = match year_week {
                Some(s) => parse_year_week(&s)?,
                None => {
                    let last_week = Utc::now().date_naive() - chrono::Duration::weeks(1);
                    let iso = last_week.iso_week();
                    (iso.year(), iso.week())
                }
            };
            match app.summarizer.weekly(year, week).await {
                Ok(path) => {
                    println!("{}", path.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{year}-W{week:02}: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        SummarizeKind::Monthly { year_month } => {
            let app = wiring::build(1).await?;
            let (year, month) = match year_month {
                Some(s) => parse_year_month(&s)?,
                None => {
                    let today = Utc::now().date_naive();
                    if today.month() == 1 { (today.year() - 1, 12) } else { (today.year(), today.month() - 1) }
                }
            };
            match app.summarizer.monthly(year, month).await {
                Ok(path) => {
                    println!("{}", path.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{year}-{month:02}: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        SummarizeKind::Yearly { year } => {
            let app = wiring::build(1).await?;
            let year = year.unwrap_or_else(|| Utc::now().date_naive().year() - 1);
            match app.summarizer.yearly(year).await {
                Ok(path) => {
                    println!("{}", path.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("{year}: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

async fn run_serve() -> Result<ExitCode> {
    let app = wiring::build(1).await?;
    let schedule_path = std::env::var("SCHEDULE_CONFIG_PATH").unwrap_or_else(|_| "config/schedule.toml".to_string());
    let config = scheduler::ScheduleConfig::from_toml(&schedule_path).await?;
    let history = std::sync::Arc::new(
        scheduler::SchedulerHistory::open(app.data_root.join("state").join("scheduler_history.json")).await?,
    );
    let notifier: std::sync::Arc<dyn scheduler::Notifier> = std::sync::Arc::new(scheduler::LogNotifier);

    let mut service = scheduler::SchedulerService::new(config, history, notifier, app.orchestrator.clone(), app.summarizer.clone());
    service.start()?;

    tracing::info!("scheduler running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await.ok();
    service.shutdown();
    Ok(ExitCode::SUCCESS)
}
