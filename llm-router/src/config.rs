//! TOML-only router configuration: `[strategy]`, `[providers.<name>]`,
//! `[tasks.<task>]`.
//!
//! ```toml
//! [strategy]
//! mode = "adaptive"
//!
//! [providers.openai]
//! api_key = "sk-..."
//!
//! [providers.custom]
//! base_url = "http://localhost:11434/v1"
//!
//! [tasks.daily]
//! provider = "openai"
//! model = "gpt-4o-mini"
//! escalation_model = "gpt-4o"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{Result, RouterError};

pub const KNOWN_TASKS: &[&str] = &["enrich", "daily", "weekly", "monthly", "yearly", "query"];
pub const VALID_STRATEGIES: &[&str] = &["economy", "standard", "premium", "adaptive", "fixed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    Economy,
    Standard,
    Premium,
    Adaptive,
    Fixed,
}

impl StrategyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyMode::Economy => "economy",
            StrategyMode::Standard => "standard",
            StrategyMode::Premium => "premium",
            StrategyMode::Adaptive => "adaptive",
            StrategyMode::Fixed => "fixed",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub escalation_model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StrategySection {
    #[serde(default = "default_strategy")]
    mode: StrategyMode,
}

fn default_strategy() -> StrategyMode {
    StrategyMode::Fixed
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    strategy: Option<StrategySection>,
    #[serde(default)]
    providers: HashMap<String, ProviderEntry>,
    #[serde(default)]
    tasks: HashMap<String, TaskConfig>,
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    strategy_mode: StrategyMode,
    providers: HashMap<String, ProviderEntry>,
    tasks: HashMap<String, TaskConfig>,
}

impl RouterConfig {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RouterError::ConfigIo {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let parsed: RawConfig = toml::from_str(raw).map_err(RouterError::ConfigParse)?;
        Ok(Self {
            strategy_mode: parsed.strategy.map(|s| s.mode).unwrap_or(StrategyMode::Fixed),
            providers: parsed.providers,
            tasks: parsed.tasks,
        })
    }

    pub fn strategy_mode(&self) -> StrategyMode {
        self.strategy_mode
    }

    pub fn providers(&self) -> &HashMap<String, ProviderEntry> {
        &self.providers
    }

    /// Falls back to the `default` task when `task` has no entry of its own.
    pub fn task_config(&self, task: &str) -> Result<&TaskConfig> {
        self.tasks
            .get(task)
            .or_else(|| self.tasks.get("default"))
            .ok_or_else(|| RouterError::UnknownTask(task.to_string()))
    }

    pub fn provider_entry(&self, provider: &str) -> Result<&ProviderEntry> {
        self.providers
            .get(provider)
            .ok_or_else(|| RouterError::UnknownProvider(provider.to_string()))
    }

    /// Mirrors the Python `ProviderConfig.validate()`: collects every
    /// problem instead of failing on the first one.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !VALID_STRATEGIES.contains(&self.strategy_mode.as_str()) {
            errors.push(format!(
                "invalid strategy mode '{}'. Must be one of: {}",
                self.strategy_mode.as_str(),
                VALID_STRATEGIES.join(", ")
            ));
        }

        for (task_name, task_config) in &self.tasks {
            if task_name == "default" {
                continue;
            }
            if !self.providers.contains_key(&task_config.provider) {
                errors.push(format!(
                    "task '{task_name}' references provider '{}' which is not defined in [providers]",
                    task_config.provider
                ));
            }
        }

        for (name, entry) in &self.providers {
            if name == "custom" {
                continue;
            }
            if entry.api_key.is_empty() {
                errors.push(format!("provider '{name}' has empty api_key"));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [strategy]
        mode = "adaptive"

        [providers.openai]
        api_key = "sk-test"

        [providers.custom]
        base_url = "http://localhost:11434/v1"

        [tasks.daily]
        provider = "openai"
        model = "gpt-4o-mini"
        escalation_model = "gpt-4o"
    "#;

    #[test]
    fn parses_strategy_providers_and_tasks() {
        let cfg = RouterConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.strategy_mode(), StrategyMode::Adaptive);
        assert_eq!(cfg.task_config("daily").unwrap().model, "gpt-4o-mini");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn falls_back_to_default_task() {
        let raw = r#"
            [providers.custom]
            base_url = "http://localhost:11434/v1"

            [tasks.default]
            provider = "custom"
            model = "llama3"
        "#;
        let cfg = RouterConfig::parse(raw).unwrap();
        assert_eq!(cfg.task_config("enrich").unwrap().provider, "custom");
    }

    #[test]
    fn flags_missing_provider_and_empty_api_key() {
        let raw = r#"
            [providers.openai]
            api_key = ""

            [tasks.daily]
            provider = "anthropic"
            model = "claude-3-5-sonnet"
        "#;
        let cfg = RouterConfig::parse(raw).unwrap();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.contains("anthropic")));
        assert!(errors.iter().any(|e| e.contains("empty api_key")));
    }
}
