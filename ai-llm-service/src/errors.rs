//! Runtime error type for provider adapters.
//!
//! [`ConfigError`](crate::error_handler::ConfigError) covers setup-time
//! mistakes; [`AiLlmError`] wraps those plus everything that can go wrong
//! once a call actually reaches a provider.

use thiserror::Error;

use crate::error_handler::ConfigError;

pub type Result<T> = std::result::Result<T, AiLlmError>;

#[derive(Debug, Error)]
pub enum AiLlmError {
    #[error("[AI LLM Service] {0}")]
    Config(#[from] ConfigError),

    #[error("[AI LLM Service] transport error calling {provider}: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("[AI LLM Service] {provider} returned {status}: {snippet}")]
    Api {
        provider: &'static str,
        status: u16,
        snippet: String,
    },

    #[error("[AI LLM Service] could not decode {provider} response: {reason}")]
    Decode { provider: &'static str, reason: String },

    #[error("[AI LLM Service] {provider} does not support {capability}")]
    UnsupportedCapability {
        provider: &'static str,
        capability: &'static str,
    },

    #[error("[AI LLM Service] {provider} batch {batch_id} failed: {reason}")]
    BatchFailed {
        provider: &'static str,
        batch_id: String,
        reason: String,
    },
}

/// Truncates a response body to a safe log/error snippet length.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 300;
    if body.len() <= MAX {
        return body.to_string();
    }
    let end = body
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= MAX)
        .last()
        .unwrap_or(0);
    format!("{}…", &body[..end])
}
