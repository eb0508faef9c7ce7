//! CLI entry point (§6): wires every store, the gh-client pool, the LLM
//! router, and the storage sinks into an `Orchestrator`, then dispatches
//! `fetch` / `normalize` / `summarize {daily|weekly|monthly|yearly}` /
//! `run` / `query` / `serve`. Exit code is 0 on all-success, 1 on any
//! failure or invalid argument combination (§6, §7).

mod cli;
mod wiring;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "work-recap failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
