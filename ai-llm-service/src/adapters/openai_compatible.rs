//! Adapter for the OpenAI Chat Completions wire format.
//!
//! Used both for OpenAI itself and for any provider that mirrors its API
//! (Azure OpenAI, Groq, Together, ...). [`super::custom::CustomAdapter`]
//! reuses these request/response shapes against a self-hosted `base_url`.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::config::ProviderConfig;
use crate::errors::{AiLlmError, Result, make_snippet};
use crate::types::{BatchItem, BatchResult, BatchStatus, ChatRequest, ModelInfo, TokenUsage};

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiCompatibleAdapter {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleAdapter {
    pub fn new(cfg: &ProviderConfig) -> Result<Self> {
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
            return Err(AiLlmError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                snippet: make_snippet(&text),
            });
        }
        let parsed: ModelListResponse =
            serde_json::from_str(&text).map_err(|e| AiLlmError::Decode {
                provider: PROVIDER,
                reason: e.to_string(),
            })?;
        Ok(parsed
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                owned_by: m.owned_by,
            })
            .collect())
    }

    pub async fn submit_batch(&self, items: &[BatchItem]) -> Result<String> {
        let lines: Vec<String> = items
            .iter()
            .map(|item| {
                let body = build_chat_body(&item.request);
                json!({
                    "custom_id": item.custom_id,
                    "method": "POST",
                    "url": "/v1/chat/completions",
                    "body": body,
                })
                .to_string()
            })
            .collect();
        let jsonl = lines.join("\n");

        let file_id = self.upload_batch_input(jsonl).await?;

        let url = format!("{}/batches", self.base_url);
        let payload = json!({
            "input_file_id": file_id,
            "endpoint": "/v1/chat/completions",
            "completion_window": "24h",
        });
        let resp = self
            .authed(self.http.post(&url).json(&payload))
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

    async fn upload_batch_input(&self, jsonl: String) -> Result<String> {
        let url = format!("{}/files", self.base_url);
        let part = reqwest::multipart::Part::text(jsonl)
            .file_name("batch.jsonl")
            .mime_str("application/jsonl")
            .map_err(|source| AiLlmError::Transport {
                provider: PROVIDER,
                source,
            })?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", "batch")
            .part("file", part);
        let resp = self
            .authed(self.http.post(&url).multipart(form))
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
                reason: "file upload response missing id".to_string(),
            })
    }

    pub async fn get_batch_status(&self, batch_id: &str) -> Result<BatchStatus> {
        let url = format!("{}/batches/{batch_id}", self.base_url);
        let resp = self
            .authed(self.http.get(&url))
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
        let raw_status = parsed.get("status").and_then(Value::as_str).unwrap_or("");
        Ok(map_batch_status(raw_status))
    }

    pub async fn get_batch_results(&self, batch_id: &str) -> Result<Vec<BatchResult>> {
        let url = format!("{}/batches/{batch_id}", self.base_url);
        let resp = self
            .authed(self.http.get(&url))
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
        let output_file_id = parsed
            .get("output_file_id")
            .and_then(Value::as_str)
            .ok_or_else(|| AiLlmError::BatchFailed {
                provider: PROVIDER,
                batch_id: batch_id.to_string(),
                reason: "no output_file_id (batch not completed yet)".to_string(),
            })?;

        let content_url = format!("{}/files/{output_file_id}/content", self.base_url);
        let resp = self
            .authed(self.http.get(&content_url))
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
            .map(parse_batch_output_line)
            .collect())
    }
}

fn parse_batch_output_line(line: Value) -> BatchResult {
    let custom_id = line
        .get("custom_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let body = line.get("response").and_then(|r| r.get("body"));
    match body.and_then(|b| serde_json::from_value::<ChatCompletionResponse>(b.clone()).ok()) {
        Some(parsed) => match extract_text_and_usage(&parsed) {
            Ok((text, usage)) => BatchResult {
                custom_id,
                text: Some(text),
                usage: Some(usage),
                error: None,
            },
            Err(e) => BatchResult {
                custom_id,
                text: None,
                usage: None,
                error: Some(e.to_string()),
            },
        },
        None => BatchResult {
            custom_id,
            text: None,
            usage: None,
            error: Some("unparseable batch output line".to_string()),
        },
    }
}

fn map_batch_status(raw: &str) -> BatchStatus {
    match raw {
        "validating" | "in_progress" | "finalizing" => BatchStatus::Processing,
        "completed" => BatchStatus::Completed,
        "failed" | "cancelled" | "cancelling" => BatchStatus::Failed,
        "expired" => BatchStatus::Expired,
        _ => BatchStatus::Submitted,
    }
}

pub(crate) fn build_chat_body(req: &ChatRequest) -> Value {
    let mut messages = Vec::new();
    if let Some(system) = &req.system {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({"role": "user", "content": req.user}));

    let mut body = json!({
        "model": req.model,
        "messages": messages,
    });
    if let Some(max_tokens) = req.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if req.json_mode {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

pub(crate) fn parse_chat_response(provider: &'static str, text: &str) -> Result<(String, TokenUsage)> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(text).map_err(|e| AiLlmError::Decode {
            provider,
            reason: e.to_string(),
        })?;
    extract_text_and_usage(&parsed).map_err(|_| AiLlmError::Decode {
        provider,
        reason: "no choice with non-empty content".to_string(),
    })
}

fn extract_text_and_usage(parsed: &ChatCompletionResponse) -> std::result::Result<(String, TokenUsage), ()> {
    let text = parsed
        .choices
        .iter()
        .find_map(|c| c.message.content.clone())
        .ok_or(())?;

    let usage = parsed
        .usage
        .as_ref()
        .map(|u| TokenUsage::single_call(u.prompt_tokens as u64, u.completion_tokens as u64))
        .unwrap_or_default();

    Ok((text, usage))
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<UsageBlock>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageBlock {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelListResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_chat_body_with_system_and_json_mode() {
        let req = ChatRequest::new("gpt-4o", "hi")
            .with_system("be terse")
            .json_mode(true)
            .max_tokens(Some(128));
        let body = build_chat_body(&req);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_tokens"], 128);
    }

    #[test]
    fn parses_chat_response_text_and_usage() {
        let raw = r#"{"choices":[{"message":{"content":"hello"}}],"usage":{"prompt_tokens":10,"completion_tokens":5}}"#;
        let (text, usage) = parse_chat_response("openai", raw).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn maps_batch_statuses() {
        assert_eq!(map_batch_status("in_progress"), BatchStatus::Processing);
        assert_eq!(map_batch_status("completed"), BatchStatus::Completed);
        assert_eq!(map_batch_status("expired"), BatchStatus::Expired);
    }
}
