//! Optional per-model USD cost estimation. Absent entirely, usage tracking
//! still works — every call's `estimated_cost_usd` just stays `0.0`.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct PriceRates {
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    rates: HashMap<String, PriceRates>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(
        mut self,
        provider: impl Into<String>,
        model: impl Into<String>,
        rates: PriceRates,
    ) -> Self {
        self.rates.insert(key(&provider.into(), &model.into()), rates);
        self
    }

    pub fn estimate_cost(
        &self,
        provider: &str,
        model: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> f64 {
        let Some(rates) = self.rates.get(&key(provider, model)) else {
            return 0.0;
        };
        let prompt_cost = prompt_tokens as f64 / 1_000_000.0 * rates.prompt_per_million;
        let completion_cost = completion_tokens as f64 / 1_000_000.0 * rates.completion_per_million;
        prompt_cost + completion_cost
    }
}

fn key(provider: &str, model: &str) -> String {
    format!("{provider}/{model}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_cost_for_known_model() {
        let table = PricingTable::new().with_rate(
            "openai",
            "gpt-4o-mini",
            PriceRates {
                prompt_per_million: 0.15,
                completion_per_million: 0.60,
            },
        );
        let cost = table.estimate_cost("openai", "gpt-4o-mini", 1_000_000, 1_000_000);
        assert!((cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_costs_nothing() {
        let table = PricingTable::new();
        assert_eq!(table.estimate_cost("openai", "gpt-4o-mini", 1000, 1000), 0.0);
    }
}
