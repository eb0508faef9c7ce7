pub mod anthropic;
pub mod custom;
pub mod gemini;
pub mod openai_compatible;

use crate::config::{ProviderConfig, ProviderKind};
use crate::errors::{AiLlmError, Result};
use crate::types::{BatchItem, BatchResult, BatchStatus, ChatRequest, ModelInfo, TokenUsage};

use anthropic::AnthropicAdapter;
use custom::CustomAdapter;
use gemini::GeminiAdapter;
use openai_compatible::OpenAiCompatibleAdapter;

/// Enum-dispatch over the four wire protocols this system speaks. Every
/// variant implements `chat`/`list_models`; batch support varies and is
/// reported through `AiLlmError::UnsupportedCapability` where absent.
pub enum ProviderAdapter {
    OpenAiCompatible(OpenAiCompatibleAdapter),
    Anthropic(AnthropicAdapter),
    Gemini(GeminiAdapter),
    Custom(CustomAdapter),
}

impl ProviderAdapter {
    pub fn new(cfg: &ProviderConfig) -> Result<Self> {
        Ok(match cfg.kind {
            ProviderKind::OpenAiCompatible => {
                ProviderAdapter::OpenAiCompatible(OpenAiCompatibleAdapter::new(cfg)?)
            }
            ProviderKind::Anthropic => ProviderAdapter::Anthropic(AnthropicAdapter::new(cfg)?),
            ProviderKind::Gemini => ProviderAdapter::Gemini(GeminiAdapter::new(cfg)?),
            ProviderKind::Custom => ProviderAdapter::Custom(CustomAdapter::new(cfg)?),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderAdapter::OpenAiCompatible(_) => ProviderKind::OpenAiCompatible,
            ProviderAdapter::Anthropic(_) => ProviderKind::Anthropic,
            ProviderAdapter::Gemini(_) => ProviderKind::Gemini,
            ProviderAdapter::Custom(_) => ProviderKind::Custom,
        }
    }

    pub async fn chat(&self, req: &ChatRequest) -> Result<(String, TokenUsage)> {
        match self {
            ProviderAdapter::OpenAiCompatible(a) => a.chat(req).await,
            ProviderAdapter::Anthropic(a) => a.chat(req).await,
            ProviderAdapter::Gemini(a) => a.chat(req).await,
            ProviderAdapter::Custom(a) => a.chat(req).await,
        }
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        match self {
            ProviderAdapter::OpenAiCompatible(a) => a.list_models().await,
            ProviderAdapter::Anthropic(a) => a.list_models().await,
            ProviderAdapter::Gemini(a) => a.list_models().await,
            ProviderAdapter::Custom(a) => a.list_models().await,
        }
    }

    pub fn batch_capable(&self) -> bool {
        matches!(
            self,
            ProviderAdapter::OpenAiCompatible(_) | ProviderAdapter::Anthropic(_)
        )
    }

    pub async fn submit_batch(&self, items: &[BatchItem]) -> Result<String> {
        match self {
            ProviderAdapter::OpenAiCompatible(a) => a.submit_batch(items).await,
            ProviderAdapter::Anthropic(a) => a.submit_batch(items).await,
            _ => Err(AiLlmError::UnsupportedCapability {
                provider: provider_name(self),
                capability: "batch submission",
            }),
        }
    }

    pub async fn get_batch_status(&self, batch_id: &str) -> Result<BatchStatus> {
        match self {
            ProviderAdapter::OpenAiCompatible(a) => a.get_batch_status(batch_id).await,
            ProviderAdapter::Anthropic(a) => a.get_batch_status(batch_id).await,
            _ => Err(AiLlmError::UnsupportedCapability {
                provider: provider_name(self),
                capability: "batch status",
            }),
        }
    }

    pub async fn get_batch_results(&self, batch_id: &str) -> Result<Vec<BatchResult>> {
        match self {
            ProviderAdapter::OpenAiCompatible(a) => a.get_batch_results(batch_id).await,
            ProviderAdapter::Anthropic(a) => a.get_batch_results(batch_id).await,
            _ => Err(AiLlmError::UnsupportedCapability {
                provider: provider_name(self),
                capability: "batch results",
            }),
        }
    }
}

fn provider_name(adapter: &ProviderAdapter) -> &'static str {
    match adapter {
        ProviderAdapter::OpenAiCompatible(_) => "openai",
        ProviderAdapter::Anthropic(_) => "anthropic",
        ProviderAdapter::Gemini(_) => "gemini",
        ProviderAdapter::Custom(_) => "custom",
    }
}
