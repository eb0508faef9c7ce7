//! Adapter for the Anthropic Messages API.
//!
//! JSON mode has no native flag on this API, so it is emulated with an
//! assistant-turn prefill of `[` — the standard trick to bias Claude into
//! opening a JSON array/object. Prompt caching is native: when requested,
//! the system prompt is sent as a content block tagged
//! `cache_control: {type: "ephemeral"}` and the response's
//! `cache_read_input_tokens`/`cache_creation_input_tokens` are surfaced.

use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};
use tracing::instrument;

use crate::config::ProviderConfig;
use crate::errors::{AiLlmError, Result, make_snippet};
use crate::types::{BatchItem, BatchResult, BatchStatus, ChatRequest, ModelInfo, TokenUsage};

const PROVIDER: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    http: Client,
    base_url: String,
    api_key: String,
}

impl AnthropicAdapter {
    pub fn new(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = cfg.api_key.clone().ok_or_else(|| {
            AiLlmError::Config(crate::error_handler::ConfigError::MissingVar(
                "providers.<name>.api_key (required for anthropic)",
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

    fn headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }

    #[instrument(skip(self, req), fields(model = %req.model))]
    pub async fn chat(&self, req: &ChatRequest) -> Result<(String, TokenUsage)> {
        let body = build_message_body(req);
        let url = format!("{}/v1/messages", self.base_url);

        let resp = self
            .headers(self.http.post(&url).json(&body))
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

        parse_message_response(&text, req.json_mode)
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/v1/models", self.base_url);
        let resp = self
            .headers(self.http.get(&url))
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
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(models
            .into_iter()
            .filter_map(|m| {
                m.get("id").and_then(Value::as_str).map(|id| ModelInfo {
                    id: id.to_string(),
                    owned_by: Some("anthropic".to_string()),
                })
            })
            .collect())
    }

    pub async fn submit_batch(&self, items: &[BatchItem]) -> Result<String> {
        let requests: Vec<Value> = items
            .iter()
            .map(|item| {
                json!({
                    "custom_id": item.custom_id,
                    "params": build_message_body(&item.request),
                })
            })
            .collect();

        let url = format!("{}/v1/messages/batches", self.base_url);
        let resp = self
            .headers(self.http.post(&url).json(&json!({"requests": requests})))
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
        parsed
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AiLlmError::Decode {
                provider: PROVIDER,
                reason: "batch response missing id".to_string(),
            })
    }

    pub async fn get_batch_status(&self, batch_id: &str) -> Result<BatchStatus> {
        let (_, status) = self.fetch_batch(batch_id).await?;
        Ok(status)
    }

    pub async fn get_batch_results(&self, batch_id: &str) -> Result<Vec<BatchResult>> {
        let (parsed, status) = self.fetch_batch(batch_id).await?;
        if status != BatchStatus::Completed {
            return Err(AiLlmError::BatchFailed {
                provider: PROVIDER,
                batch_id: batch_id.to_string(),
                reason: format!("batch not completed yet (status={status:?})"),
            });
        }
        let results_url = parsed
            .get("results_url")
            .and_then(Value::as_str)
            .ok_or_else(|| AiLlmError::Decode {
                provider: PROVIDER,
                reason: "completed batch missing results_url".to_string(),
            })?;

        let resp = self
            .headers(self.http.get(results_url))
            .send()
            .await
            .map_err(|source| AiLlmError::Transport {
                provider: PROVIDER,
                source,
            })?;
        let text = resp.text().await.map_err(|source| AiLlmError::Transport {
            provider: PROVIDER,
            source,
        })?;

        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .map(parse_batch_result_line)
            .collect())
    }

    async fn fetch_batch(&self, batch_id: &str) -> Result<(Value, BatchStatus)> {
        let url = format!("{}/v1/messages/batches/{batch_id}", self.base_url);
        let resp = self
            .headers(self.http.get(&url))
            .send()
            .await
            .map_err(|source| AiLlmError::Transport {
                provider: PROVIDER,
                source,
            })?;
        let text = resp.text().await.map_err(|source| AiLlmError::Transport {
            provider: PROVIDER,
            source,
        })?;
        let parsed: Value = serde_json::from_str(&text).map_err(|e| AiLlmError::Decode {
            provider: PROVIDER,
            reason: e.to_string(),
        })?;
        let raw = parsed
            .get("processing_status")
            .and_then(Value::as_str)
            .unwrap_or("");
        let status = match raw {
            "in_progress" => BatchStatus::Processing,
            "canceling" | "canceled" | "errored" => BatchStatus::Failed,
            "ended" => BatchStatus::Completed,
            "expired" => BatchStatus::Expired,
            _ => BatchStatus::Submitted,
        };
        Ok((parsed, status))
    }
}

fn parse_batch_result_line(line: Value) -> BatchResult {
    let custom_id = line
        .get("custom_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let result = line.get("result");
    let outcome_type = result
        .and_then(|r| r.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("");

    if outcome_type != "succeeded" {
        return BatchResult {
            custom_id,
            text: None,
            usage: None,
            error: Some(format!("batch item outcome: {outcome_type}")),
        };
    }

    let message = result.and_then(|r| r.get("message"));
    match message.map(|m| extract_text_and_usage(m, false)) {
        Some(Ok((text, usage))) => BatchResult {
            custom_id,
            text: Some(text),
            usage: Some(usage),
            error: None,
        },
        _ => BatchResult {
            custom_id,
            text: None,
            usage: None,
            error: Some("unparseable batch message".to_string()),
        },
    }
}

pub(crate) fn build_message_body(req: &ChatRequest) -> Value {
    let mut body = json!({
        "model": req.model,
        "max_tokens": req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": [{"role": "user", "content": req.user}],
    });

    if let Some(system) = &req.system {
        body["system"] = if req.cache_system_prompt {
            json!([{
                "type": "text",
                "text": system,
                "cache_control": {"type": "ephemeral"},
            }])
        } else {
            json!(system)
        };
    }

    if req.json_mode {
        body["messages"]
            .as_array_mut()
            .expect("messages is an array")
            .push(json!({"role": "assistant", "content": "["}));
    }

    body
}

fn parse_message_response(text: &str, json_mode: bool) -> Result<(String, TokenUsage)> {
    let parsed: Value = serde_json::from_str(text).map_err(|e| AiLlmError::Decode {
        provider: PROVIDER,
        reason: e.to_string(),
    })?;
    extract_text_and_usage(&parsed, json_mode).map_err(|e| AiLlmError::Decode {
        provider: PROVIDER,
        reason: e,
    })
}

fn extract_text_and_usage(parsed: &Value, json_mode: bool) -> std::result::Result<(String, TokenUsage), String> {
    let mut text = parsed
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.iter().find(|b| b.get("type").and_then(Value::as_str) == Some("text")))
        .and_then(|b| b.get("text"))
        .and_then(Value::as_str)
        .ok_or_else(|| "no text content block".to_string())?
        .to_string();

    // Re-prepend the assistant prefill we used to force JSON mode.
    if json_mode && !text.trim_start().starts_with('[') {
        text = format!("[{text}");
    }

    let usage_block = parsed.get("usage");
    let prompt_tokens = usage_block
        .and_then(|u| u.get("input_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let completion_tokens = usage_block
        .and_then(|u| u.get("output_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let cache_read = usage_block
        .and_then(|u| u.get("cache_read_input_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let cache_write = usage_block
        .and_then(|u| u.get("cache_creation_input_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let usage = TokenUsage::single_call(prompt_tokens, completion_tokens).with_cache(cache_read, cache_write);
    Ok((text, usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_system_prompt_when_requested() {
        let req = ChatRequest::new("claude-3-5-sonnet", "hi")
            .with_system("be terse")
            .cache_system_prompt(true);
        let body = build_message_body(&req);
        assert_eq!(body["system"][0]["cache_control"]["type"], "ephemeral");
    }

    #[test]
    fn json_mode_appends_assistant_prefill() {
        let req = ChatRequest::new("claude-3-5-sonnet", "hi").json_mode(true);
        let body = build_message_body(&req);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.last().unwrap()["role"], "assistant");
        assert_eq!(messages.last().unwrap()["content"], "[");
    }

    #[test]
    fn parses_message_response_with_cache_usage() {
        let raw = r#"{"content":[{"type":"text","text":"hello"}],"usage":{"input_tokens":10,"output_tokens":5,"cache_read_input_tokens":3,"cache_creation_input_tokens":1}}"#;
        let (text, usage) = parse_message_response(raw, false).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(usage.cache_read_tokens, 3);
        assert_eq!(usage.cache_write_tokens, 1);
    }
}
