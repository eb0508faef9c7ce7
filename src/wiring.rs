//! Builds every store, client and service the CLI needs from environment
//! variables (§6's configuration collaborator). Kept as one function so
//! every subcommand sees the same fully-wired `Orchestrator`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use gh_client::{ClientPool, GhClient};
use llm_router::{LlmRouter, PricingTable, RouterConfig, UsageTracker};
use pipeline::{Fetcher, Normalizer, Orchestrator, Summarizer};
use state_store::{CheckpointStore, DailyStateStore, FailedDateStore, FetchProgressStore};
use storage::{StorageConfig, StorageSink};

pub struct App {
    pub orchestrator: Arc<Orchestrator>,
    pub summarizer: Arc<Summarizer>,
    pub daily_state: Arc<DailyStateStore>,
    pub failed_dates: Arc<FailedDateStore>,
    pub checkpoints: Arc<CheckpointStore>,
    pub data_root: PathBuf,
}

fn must_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set in the environment"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

pub async fn build(workers: usize) -> Result<App> {
    let gh_token = must_env("GH_TOKEN")?;
    let gh_user = must_env("GH_USER")?;
    let gh_base_url = env_or("GH_BASE_URL", "https://api.github.com");
    let data_root = PathBuf::from(env_or("DATA_ROOT", "data"));
    let state_dir = data_root.join("state");
    let max_retries = env_usize("MAX_RETRIES", 5) as u32;

    let client = Arc::new(GhClient::new(&gh_base_url, gh_token.clone()).context("building gh-client")?);
    let pool = if workers > 1 {
        Some(Arc::new(ClientPool::new(&gh_base_url, &gh_token, workers).context("building gh-client pool")?))
    } else {
        None
    };

    let daily_state = Arc::new(DailyStateStore::open(state_dir.join("daily_state.json")).await.context("opening daily_state.json")?);
    let fetch_progress = Arc::new(FetchProgressStore::new(state_dir.join("fetch_progress")));
    let failed_dates = Arc::new(
        FailedDateStore::open_with_max_retries(state_dir.join("failed_dates.json"), max_retries)
            .await
            .context("opening failed_dates.json")?,
    );
    let checkpoints = Arc::new(CheckpointStore::open(state_dir.join("checkpoints.json")).await.context("opening checkpoints.json")?);

    let router = match std::env::var("PROVIDER_CONFIG_PATH") {
        Ok(path) => {
            let config = RouterConfig::load(&path).await.with_context(|| format!("loading provider config from {path}"))?;
            let problems = config.validate();
            if !problems.is_empty() {
                anyhow::bail!("invalid provider config: {}", problems.join("; "));
            }
            let tracker = UsageTracker::new(Some(PricingTable::new()));
            Some(Arc::new(LlmRouter::new(config, Some(tracker))))
        }
        Err(_) => {
            tracing::warn!("PROVIDER_CONFIG_PATH not set, running without LLM enrichment or summarization");
            None
        }
    };

    let storage = Arc::new(StorageSink::connect(&StorageConfig::from_env()).await);

    let fetcher = Fetcher::new(
        client,
        pool,
        gh_user.clone(),
        data_root.clone(),
        daily_state.clone(),
        fetch_progress,
        failed_dates.clone(),
        checkpoints.clone(),
    );

    let normalizer = Normalizer::new(
        gh_user,
        data_root.clone(),
        daily_state.clone(),
        checkpoints.clone(),
        router.clone(),
        storage.clone(),
    );

    // `default()` (empty `[tasks]`) is only reachable when enrichment is
    // disabled; `weekly`/`monthly`/`yearly`/`query` all fail fast with
    // `UnknownTask` in that configuration, which is the correct behavior
    // for a router with no configured provider.
    let router_for_summarizer = router.unwrap_or_else(|| Arc::new(LlmRouter::new(RouterConfig::parse("").expect("empty TOML parses"), None)));
    let summarizer = Summarizer::new(data_root.clone(), daily_state.clone(), checkpoints.clone(), router_for_summarizer, storage);

    let orchestrator = Arc::new(Orchestrator::new(fetcher, normalizer, summarizer.clone()));

    Ok(App {
        orchestrator,
        summarizer: Arc::new(summarizer),
        daily_state,
        failed_dates,
        checkpoints,
        data_root,
    })
}
