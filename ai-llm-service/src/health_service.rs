//! Lightweight readiness probes for provider configs.
//!
//! [`HealthService::check`] is resilient and never fails: any transport or
//! API error is converted into `HealthStatus { ok: false, .. }`, which is
//! convenient to surface on a `/health` endpoint.

use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::ProviderAdapter;
use crate::config::ProviderConfig;

/// A serializable health snapshot for a single provider config.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub provider: String,
    pub kind: String,
    pub ok: bool,
    pub latency_ms: u128,
    pub message: Option<String>,
}

impl HealthStatus {
    fn ok(cfg: &ProviderConfig, latency_ms: u128) -> Self {
        Self {
            provider: cfg.name.clone(),
            kind: cfg.kind.to_string(),
            ok: true,
            latency_ms,
            message: None,
        }
    }

    fn fail(cfg: &ProviderConfig, latency_ms: u128, message: impl Into<String>) -> Self {
        Self {
            provider: cfg.name.clone(),
            kind: cfg.kind.to_string(),
            ok: false,
            latency_ms,
            message: Some(message.into()),
        }
    }
}

/// A probe that builds an adapter on demand and checks it can list models.
#[derive(Debug, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    pub async fn check(&self, cfg: &ProviderConfig) -> HealthStatus {
        let started = Instant::now();

        let status = match ProviderAdapter::new(cfg) {
            Ok(adapter) => match adapter.list_models().await {
                Ok(_) => HealthStatus::ok(cfg, started.elapsed().as_millis()),
                Err(e) => HealthStatus::fail(cfg, started.elapsed().as_millis(), e.to_string()),
            },
            Err(e) => HealthStatus::fail(cfg, started.elapsed().as_millis(), e.to_string()),
        };

        if status.ok {
            info!(provider = %status.provider, kind = %status.kind, latency_ms = status.latency_ms, "health probe completed");
        } else {
            warn!(provider = %status.provider, kind = %status.kind, message = ?status.message, "health probe failed");
        }
        status
    }

    pub async fn check_many(&self, configs: &[ProviderConfig]) -> Vec<HealthStatus> {
        let mut out = Vec::with_capacity(configs.len());
        for cfg in configs {
            out.push(self.check(cfg).await);
        }
        out
    }
}
