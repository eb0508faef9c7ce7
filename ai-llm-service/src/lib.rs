//! Provider adapters for the language-model layer.
//!
//! Every adapter speaks a different wire protocol but exposes the same
//! `chat`/`list_models` surface (plus `submit_batch`/`get_batch_status`/
//! `get_batch_results` where the provider supports batching), dispatched
//! through [`adapters::ProviderAdapter`]. `llm-router` is the only other
//! crate that should depend on this one directly — everything upstream of
//! it talks to the router's task-based API instead.

pub mod adapters;
pub mod config;
pub mod error_handler;
pub mod errors;
pub mod health_service;
pub mod telemetry;
pub mod types;

pub use adapters::ProviderAdapter;
pub use config::{ProviderConfig, ProviderKind};
pub use errors::{AiLlmError, Result};
pub use health_service::{HealthService, HealthStatus};
pub use types::{BatchItem, BatchResult, BatchStatus, ChatRequest, ModelInfo, TokenUsage};
