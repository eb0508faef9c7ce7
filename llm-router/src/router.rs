//! Task-based LLM routing: resolves `(provider, model, use_escalation)`
//! from a task name + strategy mode, lazily builds and memoizes provider
//! adapters, and folds every call's usage into the aggregate + tracker.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use ai_llm_service::{
    BatchItem, BatchResult, BatchStatus, ChatRequest, ProviderAdapter,
    ProviderConfig as AdapterConfig, ProviderKind, TokenUsage,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{RouterConfig, StrategyMode, TaskConfig};
use crate::errors::{Result, RouterError};
use crate::escalation::{EscalationRequest, chat_with_escalation};
use crate::usage_tracker::UsageTracker;

pub struct ChatOptions {
    pub task: String,
    pub json_mode: bool,
    pub cache_system_prompt: bool,
    pub max_tokens: Option<u32>,
}

impl ChatOptions {
    pub fn for_task(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            json_mode: false,
            cache_system_prompt: false,
            max_tokens: None,
        }
    }
}

pub struct LlmRouter {
    config: RouterConfig,
    providers: RwLock<HashMap<String, Arc<ProviderAdapter>>>,
    usage: Mutex<TokenUsage>,
    tracker: Option<UsageTracker>,
}

impl LlmRouter {
    pub fn new(config: RouterConfig, tracker: Option<UsageTracker>) -> Self {
        Self {
            config,
            providers: RwLock::new(HashMap::new()),
            usage: Mutex::new(TokenUsage::default()),
            tracker,
        }
    }

    pub async fn chat(&self, system_prompt: &str, user_content: &str, opts: &ChatOptions) -> Result<String> {
        let task_config = self.config.task_config(&opts.task)?.clone();
        let strategy = self.config.strategy_mode();

        let (provider_name, model, use_escalation) = resolve_model(&task_config, strategy);

        info!(task = %opts.task, provider = %provider_name, model = %model, strategy = strategy.as_str(), "LLM call");
        debug!(system_len = system_prompt.len(), user_len = user_content.len(), "LLM request sizes");

        let provider = self.get_or_init_provider(&provider_name).await?;
        let max_tokens = opts.max_tokens.or(task_config.max_tokens);

        let (text, usage) = if use_escalation && task_config.escalation_model.is_some() {
            let escalation_model = task_config.escalation_model.as_deref().expect("checked above");
            chat_with_escalation(EscalationRequest {
                base: &provider,
                base_model: model.as_str(),
                escalation: &provider,
                escalation_model,
                system_prompt,
                user_content,
                json_mode: opts.json_mode,
                max_tokens,
            })
            .await?
        } else {
            let request = ChatRequest::new(model.as_str(), user_content)
                .with_system(system_prompt)
                .json_mode(opts.json_mode)
                .cache_system_prompt(opts.cache_system_prompt)
                .max_tokens(max_tokens);
            provider.chat(&request).await?
        };

        {
            let mut total = self.usage.lock().expect("router usage mutex poisoned");
            *total += usage;
        }
        if let Some(tracker) = &self.tracker {
            tracker.record(&provider_name, &model, usage);
        }

        debug!(response_len = text.len(), "LLM response");
        Ok(text)
    }

    pub fn total_usage(&self) -> TokenUsage {
        *self.usage.lock().expect("router usage mutex poisoned")
    }

    pub fn usage_tracker(&self) -> Option<&UsageTracker> {
        self.tracker.as_ref()
    }

    /// Resolves a task to its base model's provider+model, without making a
    /// call — used by the batch-submission path, which has no escalation
    /// concept (batches are submitted and polled, not self-assessed).
    pub async fn resolve_for_task(&self, task: &str) -> Result<(Arc<ProviderAdapter>, String)> {
        let task_config = self.config.task_config(task)?.clone();
        let provider = self.get_or_init_provider(&task_config.provider).await?;
        Ok((provider, task_config.model))
    }

    /// Submits a batch of requests under `task`'s resolved base model.
    /// Returns `(provider_name, batch_id)` so the caller can poll status
    /// without re-resolving the task.
    pub async fn submit_batch(&self, task: &str, items: Vec<BatchItem>) -> Result<(String, String)> {
        let task_config = self.config.task_config(task)?.clone();
        let provider = self.get_or_init_provider(&task_config.provider).await?;
        let batch_id = provider.submit_batch(&items).await?;
        Ok((task_config.provider, batch_id))
    }

    pub async fn get_batch_status(&self, provider_name: &str, batch_id: &str) -> Result<BatchStatus> {
        let provider = self.get_or_init_provider(provider_name).await?;
        Ok(provider.get_batch_status(batch_id).await?)
    }

    pub async fn get_batch_results(&self, provider_name: &str, batch_id: &str) -> Result<Vec<BatchResult>> {
        let provider = self.get_or_init_provider(provider_name).await?;
        Ok(provider.get_batch_results(batch_id).await?)
    }

    /// Lazily builds a provider adapter and memoizes it, double-checking
    /// under the write lock so concurrent callers never build it twice.
    async fn get_or_init_provider(&self, provider_name: &str) -> Result<Arc<ProviderAdapter>> {
        if let Some(adapter) = self.providers.read().await.get(provider_name) {
            return Ok(adapter.clone());
        }

        let mut providers = self.providers.write().await;
        if let Some(adapter) = providers.get(provider_name) {
            return Ok(adapter.clone());
        }

        let entry = self.config.provider_entry(provider_name)?;
        let kind = ProviderKind::from_str(provider_name).map_err(ai_llm_service::AiLlmError::from)?;

        let mut adapter_cfg = AdapterConfig::new(provider_name, kind);
        if !entry.api_key.is_empty() {
            adapter_cfg = adapter_cfg.with_api_key(entry.api_key.clone());
        }
        if let Some(base_url) = &entry.base_url {
            adapter_cfg = adapter_cfg.with_base_url(base_url.clone());
        }

        let adapter = Arc::new(ProviderAdapter::new(&adapter_cfg)?);
        providers.insert(provider_name.to_string(), adapter.clone());
        Ok(adapter)
    }
}

fn resolve_model(task_config: &TaskConfig, strategy: StrategyMode) -> (String, String, bool) {
    let provider_name = task_config.provider.clone();
    let base_model = task_config.model.clone();
    let escalation_model = task_config.escalation_model.clone();

    match strategy {
        StrategyMode::Economy | StrategyMode::Fixed => (provider_name, base_model, false),
        StrategyMode::Premium => {
            let model = escalation_model.unwrap_or(base_model);
            (provider_name, model, false)
        }
        StrategyMode::Standard | StrategyMode::Adaptive => {
            let use_escalation = escalation_model.is_some();
            (provider_name, base_model, use_escalation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(provider: &str, model: &str, escalation: Option<&str>) -> TaskConfig {
        TaskConfig {
            provider: provider.to_string(),
            model: model.to_string(),
            escalation_model: escalation.map(str::to_string),
            max_tokens: None,
        }
    }

    #[test]
    fn economy_never_escalates() {
        let t = task("openai", "gpt-4o-mini", Some("gpt-4o"));
        let (_, model, escalate) = resolve_model(&t, StrategyMode::Economy);
        assert_eq!(model, "gpt-4o-mini");
        assert!(!escalate);
    }

    #[test]
    fn premium_prefers_escalation_model_directly() {
        let t = task("openai", "gpt-4o-mini", Some("gpt-4o"));
        let (_, model, escalate) = resolve_model(&t, StrategyMode::Premium);
        assert_eq!(model, "gpt-4o");
        assert!(!escalate);
    }

    #[test]
    fn premium_falls_back_to_base_without_escalation_model() {
        let t = task("openai", "gpt-4o-mini", None);
        let (_, model, _) = resolve_model(&t, StrategyMode::Premium);
        assert_eq!(model, "gpt-4o-mini");
    }

    #[test]
    fn standard_and_adaptive_escalate_only_if_configured() {
        let with_escalation = task("openai", "gpt-4o-mini", Some("gpt-4o"));
        let without_escalation = task("openai", "gpt-4o-mini", None);

        let (_, _, escalate) = resolve_model(&with_escalation, StrategyMode::Standard);
        assert!(escalate);
        let (_, _, escalate) = resolve_model(&without_escalation, StrategyMode::Adaptive);
        assert!(!escalate);
    }
}
