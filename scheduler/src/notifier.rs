//! Notification boundary (§1: "deliberately out of scope" — the Telegram
//! wire protocol belongs to an external collaborator). This crate only
//! owns the contract a scheduler job calls into: `Notifier::notify`.
//! `LogNotifier` is the one concrete implementation built here;
//! `CompositeNotifier` fans a single event out to several.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::history::SchedulerEvent;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &SchedulerEvent);
}

/// Always-available fallback: logs the event at `info` (success) or `warn`
/// (failure). Every scheduler composes this one in even when a richer
/// notifier is configured, so an event is never silently dropped.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &SchedulerEvent) {
        match event.status {
            "success" => info!(job = event.job, target = %event.target, "scheduler job succeeded"),
            _ => warn!(job = event.job, target = %event.target, error = ?event.error, "scheduler job failed"),
        }
    }
}

/// Fans a single notification out to several notifiers; a notifier that
/// panics or errors internally does not stop the others (each `notify`
/// call is infallible by contract).
pub struct CompositeNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    async fn notify(&self, event: &SchedulerEvent) {
        for notifier in &self.notifiers {
            notifier.notify(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn composite_notifies_every_member() {
        let composite = CompositeNotifier::new(vec![Box::new(LogNotifier), Box::new(LogNotifier)]);
        let event = SchedulerEvent::success("daily", "2025-02-16", chrono::Utc::now());
        composite.notify(&event).await;
    }
}
