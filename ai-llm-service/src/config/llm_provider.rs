//! Provider family selection.

use std::fmt;

/// Which wire protocol an adapter speaks. Distinct from a *named* provider
/// in the router's `providers.<name>` map — several named providers can
/// share the `OpenAiCompatible` kind (OpenAI itself, Azure OpenAI, Groq, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAiCompatible,
    Anthropic,
    Gemini,
    /// Self-hosted, OpenAI-compatible `base_url` (e.g. Ollama's `/v1` surface,
    /// vLLM, llama.cpp server). Tolerates missing `usage` in responses.
    Custom,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderKind::OpenAiCompatible => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Custom => "custom",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = crate::error_handler::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "openai_compatible" | "openai-compatible" => Ok(ProviderKind::OpenAiCompatible),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "custom" | "ollama" | "self_hosted" | "self-hosted" => Ok(ProviderKind::Custom),
            other => Err(crate::error_handler::ConfigError::UnsupportedProvider(
                other.to_string(),
            )),
        }
    }
}
