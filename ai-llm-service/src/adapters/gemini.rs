//! Adapter for the Gemini `generateContent` API.
//!
//! Neither batch submission nor prompt caching is implemented here: Gemini's
//! batch API and explicit-cache API exist but nothing in this system needs
//! them yet, so `submit_batch`/`get_batch_status`/`get_batch_results` all
//! report [`AiLlmError::UnsupportedCapability`].

use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};
use tracing::instrument;

use crate::config::ProviderConfig;
use crate::errors::{AiLlmError, Result, make_snippet};
use crate::types::{ChatRequest, ModelInfo, TokenUsage};

const PROVIDER: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiAdapter {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GeminiAdapter {
    pub fn new(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = cfg.api_key.clone().ok_or_else(|| {
            AiLlmError::Config(crate::error_handler::ConfigError::MissingVar(
                "providers.<name>.api_key (required for gemini)",
            ))
        })?;
        let base_url = cfg
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(120));

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
            api_key,
        })
    }

    #[instrument(skip(self, req), fields(model = %req.model))]
    pub async fn chat(&self, req: &ChatRequest) -> Result<(String, TokenUsage)> {
        let body = build_generate_body(req);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, req.model, self.api_key
        );

        let resp = self
            .http
            .post(&url)
            .json(&body)
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

        parse_generate_response(&text)
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);
        let resp = self
            .http
            .get(&url)
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
        let parsed: Value = serde_json::from_str(&text).map_err(|e| AiLlmError::Decode {
            provider: PROVIDER,
            reason: e.to_string(),
        })?;
        let models = parsed
            .get("models")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(models
            .into_iter()
            .filter_map(|m| {
                m.get("name").and_then(Value::as_str).map(|name| ModelInfo {
                    id: name.trim_start_matches("models/").to_string(),
                    owned_by: Some("google".to_string()),
                })
            })
            .collect())
    }
}

fn build_generate_body(req: &ChatRequest) -> Value {
    let mut body = json!({
        "contents": [{"role": "user", "parts": [{"text": req.user}]}],
    });

    if let Some(system) = &req.system {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }

    let mut generation_config = serde_json::Map::new();
    if req.json_mode {
        generation_config.insert("response_mime_type".to_string(), json!("application/json"));
    }
    if let Some(max_tokens) = req.max_tokens {
        generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
    }
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }

    body
}

fn parse_generate_response(text: &str) -> Result<(String, TokenUsage)> {
    let parsed: Value = serde_json::from_str(text).map_err(|e| AiLlmError::Decode {
        provider: PROVIDER,
        reason: e.to_string(),
    })?;

    let answer = parsed
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .and_then(|parts| parts.iter().find_map(|p| p.get("text")).and_then(Value::as_str))
        .ok_or_else(|| AiLlmError::Decode {
            provider: PROVIDER,
            reason: "no candidate text returned".to_string(),
        })?
        .to_string();

    let usage = parsed
        .get("usageMetadata")
        .map(|u| {
            let prompt = u
                .get("promptTokenCount")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let completion = u
                .get("candidatesTokenCount")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            TokenUsage::single_call(prompt, completion)
        })
        .unwrap_or_default();

    Ok((answer, usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_json_response_mime_type() {
        let req = ChatRequest::new("gemini-1.5-pro", "hi").json_mode(true);
        let body = build_generate_body(&req);
        assert_eq!(body["generationConfig"]["response_mime_type"], "application/json");
    }

    #[test]
    fn parses_generate_response() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"hello"}]}}],"usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":2}}"#;
        let (text, usage) = parse_generate_response(raw).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(usage.total_tokens, 6);
    }
}
