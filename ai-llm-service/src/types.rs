//! Provider-agnostic request/response shapes shared by every adapter.

use serde::{Deserialize, Serialize};

/// A single chat invocation. `system` and `user` are plain text; adapters
/// translate them into whatever wire shape their provider expects.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub user: String,
    pub json_mode: bool,
    pub cache_system_prompt: bool,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            user: user.into(),
            json_mode: false,
            cache_system_prompt: false,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn json_mode(mut self, on: bool) -> Self {
        self.json_mode = on;
        self
    }

    pub fn cache_system_prompt(mut self, on: bool) -> Self {
        self.cache_system_prompt = on;
        self
    }

    pub fn max_tokens(mut self, tokens: Option<u32>) -> Self {
        self.max_tokens = tokens;
        self
    }
}

/// Token accounting for a single call, or the sum of a base + escalation
/// call pair. Mirrors the pipeline's `TokenUsage` data-model fields plus
/// the two Anthropic prompt-caching counters this layer alone produces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub call_count: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
}

impl TokenUsage {
    pub fn single_call(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            call_count: 1,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
        }
    }

    pub fn with_cache(mut self, cache_read: u64, cache_write: u64) -> Self {
        self.cache_read_tokens = cache_read;
        self.cache_write_tokens = cache_write;
        self
    }
}

impl std::ops::Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, other: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
            call_count: self.call_count + other.call_count,
            cache_read_tokens: self.cache_read_tokens + other.cache_read_tokens,
            cache_write_tokens: self.cache_write_tokens + other.cache_write_tokens,
        }
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: TokenUsage) {
        *self = *self + other;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: Option<String>,
}

/// Union of batch-job states across every provider that offers one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Submitted,
    Processing,
    Completed,
    Failed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub custom_id: String,
    pub text: Option<String>,
    pub usage: Option<TokenUsage>,
    pub error: Option<String>,
}

/// A single item of a batch submission, tagged so its result can be
/// matched back up by the caller.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub custom_id: String,
    pub request: ChatRequest,
}
