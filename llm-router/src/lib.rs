//! Task-based multi-provider LLM routing: strategy-driven model selection,
//! adaptive escalation, and per-model usage/cost tracking.

pub mod config;
pub mod errors;
pub mod escalation;
pub mod pricing;
pub mod router;
pub mod usage_tracker;

pub use config::{ProviderEntry, RouterConfig, StrategyMode, TaskConfig};
pub use errors::{Result, RouterError};
pub use pricing::{PriceRates, PricingTable};
pub use router::{ChatOptions, LlmRouter};
pub use usage_tracker::{ModelUsage, UsageTracker};
