use crate::config::llm_provider::ProviderKind;

/// Configuration for a single named provider invocation.
///
/// `name` is the router's `providers.<name>` key (e.g. `"openai"`,
/// `"anthropic-fast"`, `"local-vllm"`); `kind` selects which wire protocol
/// [`ProviderAdapter`](crate::adapters::ProviderAdapter) speaks to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            api_key: None,
            base_url: None,
            timeout_secs: Some(120),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }
}
