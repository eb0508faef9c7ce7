use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RateLimitState {
    pub remaining: Option<i64>,
    pub reset_epoch: Option<i64>,
}

impl RateLimitState {
    pub(crate) const fn empty() -> Self {
        Self {
            remaining: None,
            reset_epoch: None,
        }
    }
}
