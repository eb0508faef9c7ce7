//! Thread-safe per-model usage tracking with optional cost estimation.

use std::collections::HashMap;
use std::sync::Mutex;

use ai_llm_service::TokenUsage;
use serde::Serialize;

use crate::pricing::PricingTable;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelUsage {
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub call_count: u64,
    pub estimated_cost_usd: f64,
}

pub struct UsageTracker {
    pricing: Option<PricingTable>,
    usages: Mutex<HashMap<String, ModelUsage>>,
}

impl UsageTracker {
    pub fn new(pricing: Option<PricingTable>) -> Self {
        Self {
            pricing,
            usages: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, provider: &str, model: &str, usage: TokenUsage) {
        let cost = self
            .pricing
            .as_ref()
            .map(|p| p.estimate_cost(provider, model, usage.prompt_tokens, usage.completion_tokens))
            .unwrap_or(0.0);

        let key = format!("{provider}/{model}");
        let mut usages = self.usages.lock().expect("usage tracker mutex poisoned");
        let entry = usages.entry(key).or_insert_with(|| ModelUsage {
            provider: provider.to_string(),
            model: model.to_string(),
            ..Default::default()
        });
        entry.prompt_tokens += usage.prompt_tokens;
        entry.completion_tokens += usage.completion_tokens;
        entry.total_tokens += usage.total_tokens;
        entry.call_count += usage.call_count;
        entry.estimated_cost_usd += cost;
    }

    pub fn model_usages(&self) -> Vec<ModelUsage> {
        self.usages
            .lock()
            .expect("usage tracker mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn total_usage(&self) -> TokenUsage {
        self.usages
            .lock()
            .expect("usage tracker mutex poisoned")
            .values()
            .fold(TokenUsage::default(), |acc, mu| {
                acc + TokenUsage {
                    prompt_tokens: mu.prompt_tokens,
                    completion_tokens: mu.completion_tokens,
                    total_tokens: mu.total_tokens,
                    call_count: mu.call_count,
                    cache_read_tokens: 0,
                    cache_write_tokens: 0,
                }
            })
    }

    pub fn format_report(&self) -> String {
        let usages = self.model_usages();
        if usages.is_empty() {
            return "No LLM usage recorded.".to_string();
        }

        let mut lines = vec!["LLM Usage Report:".to_string()];
        let (mut total_calls, mut total_prompt, mut total_completion, mut total_tokens, mut total_cost) =
            (0u64, 0u64, 0u64, 0u64, 0.0f64);

        for mu in &usages {
            let calls_str = format!("{} call{}", mu.call_count, if mu.call_count != 1 { "s" } else { "" });
            let cost_str = if mu.estimated_cost_usd > 0.0 {
                format!(" (~${:.3})", mu.estimated_cost_usd)
            } else {
                String::new()
            };
            lines.push(format!(
                "  {} / {}: {calls_str}, {}+{}={} tokens{cost_str}",
                mu.provider, mu.model, mu.prompt_tokens, mu.completion_tokens, mu.total_tokens
            ));
            total_calls += mu.call_count;
            total_prompt += mu.prompt_tokens;
            total_completion += mu.completion_tokens;
            total_tokens += mu.total_tokens;
            total_cost += mu.estimated_cost_usd;
        }

        if usages.len() > 1 {
            lines.push(format!("  {}", "─".repeat(50)));
            let cost_str = if total_cost > 0.0 {
                format!(" (~${total_cost:.3})")
            } else {
                String::new()
            };
            let calls_str = format!("{total_calls} call{}", if total_calls != 1 { "s" } else { "" });
            lines.push(format!(
                "  Total: {calls_str}, {total_prompt}+{total_completion}={total_tokens} tokens{cost_str}"
            ));
        }

        lines.join("\n")
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_usage_per_model() {
        let tracker = UsageTracker::new(None);
        tracker.record("openai", "gpt-4o-mini", TokenUsage::single_call(100, 50));
        tracker.record("openai", "gpt-4o-mini", TokenUsage::single_call(200, 75));

        let usages = tracker.model_usages();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].call_count, 2);
        assert_eq!(usages[0].total_tokens, 425);
    }

    #[test]
    fn empty_tracker_reports_no_usage() {
        let tracker = UsageTracker::new(None);
        assert_eq!(tracker.format_report(), "No LLM usage recorded.");
    }
}
