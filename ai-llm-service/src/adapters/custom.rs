//! Adapter for self-hosted, OpenAI-compatible endpoints (Ollama's `/v1`
//! surface, vLLM, llama.cpp server, ...). Shares the OpenAI wire format but
//! never assumes an API key is present and tolerates a missing `usage`
//! block, which several self-hosted servers omit.

use std::time::Duration;

use reqwest::Client;
use tracing::instrument;

use crate::adapters::openai_compatible::{build_chat_body, parse_chat_response};
use crate::config::ProviderConfig;
use crate::errors::{AiLlmError, Result, make_snippet};
use crate::types::{ChatRequest, ModelInfo, TokenUsage};

const PROVIDER: &str = "custom";

pub struct CustomAdapter {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CustomAdapter {
    pub fn new(cfg: &ProviderConfig) -> Result<Self> {
        let base_url = cfg.base_url.clone().ok_or_else(|| {
            AiLlmError::Config(crate::error_handler::ConfigError::MissingVar(
                "providers.<name>.base_url (required for the custom adapter)",
            ))
        })?;
        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(180));

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| AiLlmError::Transport {
                provider: PROVIDER,
                source,
            })?;

        Ok(Self {
            http,
            base_url,
            api_key: cfg.api_key.clone(),
        })
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    #[instrument(skip(self, req), fields(model = %req.model))]
    pub async fn chat(&self, req: &ChatRequest) -> Result<(String, TokenUsage)> {
        let body = build_chat_body(req);
        let url = format!("{}/chat/completions", self.base_url);

        let resp = self
            .authed(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(|source| AiLlmError::Transport {
                provider: PROVIDER,
                source,
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|source| AiLlmError::Transport {
            provider: PROVIDER,
            source,
        })?;

        if !status.is_success() {
            return Err(AiLlmError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                snippet: make_snippet(&text),
            });
        }

        parse_chat_response(PROVIDER, &text)
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.base_url);
        let resp = self
            .authed(self.http.get(&url))
            .send()
            .await
            .map_err(|source| AiLlmError::Transport {
                provider: PROVIDER,
                source,
            })?;
        let status = resp.status();
        let text = resp.text().await.map_err(|source| AiLlmError::Transport {
            provider: PROVIDER,
            source,
        })?;
        if !status.is_success() {
            // Several self-hosted servers have no /models endpoint at all;
            // treat that as "no models reported" rather than a hard error.
            return Ok(Vec::new());
        }

        #[derive(serde::Deserialize)]
        struct Entry {
            id: String,
        }
        #[derive(serde::Deserialize)]
        struct Listing {
            #[serde(default)]
            data: Vec<Entry>,
        }

        let parsed: Listing = serde_json::from_str(&text).unwrap_or(Listing { data: Vec::new() });
        Ok(parsed
            .data
            .into_iter()
            .map(|e| ModelInfo {
                id: e.id,
                owned_by: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;

    #[test]
    fn requires_base_url() {
        let cfg = ProviderConfig::new("local", ProviderKind::Custom);
        assert!(CustomAdapter::new(&cfg).is_err());
    }

    #[test]
    fn accepts_configured_base_url() {
        let cfg = ProviderConfig::new("local", ProviderKind::Custom)
            .with_base_url("http://localhost:11434/v1");
        assert!(CustomAdapter::new(&cfg).is_ok());
    }
}
