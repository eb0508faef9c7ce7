//! Adaptive escalation: the base model self-assesses confidence and the
//! router re-calls the escalation model when it says it's out of its depth.
//!
//! Protocol: wrap the system prompt so the base model must answer with a
//! strict JSON envelope, call the base model, parse the envelope. A parse
//! failure is a graceful fallback to the raw text (the model ignored the
//! envelope instruction, which still produced *an* answer). Otherwise,
//! escalate only when `needs_escalation && confidence < CONFIDENCE_THRESHOLD`.

use ai_llm_service::{AiLlmError, ChatRequest, ProviderAdapter, TokenUsage};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

const ESCALATION_WRAPPER: &str = r#"You must respond ONLY with a JSON object (no markdown, no extra text).

First, complete the task described below. Then self-assess your confidence.

Task system prompt:
---
{system_prompt}
---

Respond with this exact JSON structure:
{{
  "needs_escalation": true/false,
  "confidence": 0.0 to 1.0,
  "reason": "brief explanation if escalation needed",
  "response": "your full response to the task"
}}

Rules:
- Set confidence based on how well you handled the task
- Set needs_escalation=true if the task is too complex for your capabilities
- The "response" field must contain your complete answer to the task
"#;

#[derive(Debug, Deserialize)]
struct Decision {
    #[serde(default)]
    needs_escalation: bool,
    confidence: f64,
    #[serde(default)]
    #[allow(dead_code)]
    reason: String,
    response: String,
}

fn parse_decision(text: &str) -> Option<Decision> {
    let value: Value = serde_json::from_str(text).ok()?;
    if !value.is_object() {
        return None;
    }
    if value.get("response").is_none() || value.get("confidence").is_none() {
        return None;
    }
    serde_json::from_value(value).ok()
}

pub struct EscalationRequest<'a> {
    pub base: &'a ProviderAdapter,
    pub base_model: &'a str,
    pub escalation: &'a ProviderAdapter,
    pub escalation_model: &'a str,
    pub system_prompt: &'a str,
    pub user_content: &'a str,
    pub json_mode: bool,
    pub max_tokens: Option<u32>,
}

pub async fn chat_with_escalation(
    req: EscalationRequest<'_>,
) -> Result<(String, TokenUsage), AiLlmError> {
    let wrapped_system = ESCALATION_WRAPPER.replace("{system_prompt}", req.system_prompt);
    let base_request = ChatRequest::new(req.base_model, req.user_content)
        .with_system(wrapped_system)
        .max_tokens(req.max_tokens);
    let (base_text, base_usage) = req.base.chat(&base_request).await?;

    let Some(decision) = parse_decision(&base_text) else {
        warn!("escalation JSON parse failed, using raw response");
        return Ok((base_text, base_usage));
    };

    if decision.needs_escalation && decision.confidence < CONFIDENCE_THRESHOLD {
        info!(
            confidence = decision.confidence,
            "escalating to premium model"
        );
        let escalation_request = ChatRequest::new(req.escalation_model, req.user_content)
            .with_system(req.system_prompt)
            .json_mode(req.json_mode)
            .max_tokens(req.max_tokens);
        let (esc_text, esc_usage) = req.escalation.chat(&escalation_request).await?;
        return Ok((esc_text, base_usage + esc_usage));
    }

    Ok((decision.response, base_usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_decision() {
        let raw = r#"{"needs_escalation": true, "confidence": 0.4, "reason": "complex", "response": "draft answer"}"#;
        let decision = parse_decision(raw).unwrap();
        assert!(decision.needs_escalation);
        assert_eq!(decision.response, "draft answer");
    }

    #[test]
    fn missing_required_fields_is_none() {
        assert!(parse_decision(r#"{"confidence": 0.9}"#).is_none());
        assert!(parse_decision("not json").is_none());
    }

    #[test]
    fn defaults_needs_escalation_to_false() {
        let raw = r#"{"confidence": 0.9, "response": "ok"}"#;
        let decision = parse_decision(raw).unwrap();
        assert!(!decision.needs_escalation);
    }
}
