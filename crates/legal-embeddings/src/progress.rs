//! Progress notifications for model loading and embedding generation.
//!
//! Events go out on a `tokio::sync::broadcast` channel. Nobody has to listen:
//! with no subscribers, events are dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Buffered events per subscriber before slow receivers start lagging.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Active,
    Completed,
    Error,
}

/// A single progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Pipeline stage (e.g. "initialize", "download", "generate")
    pub stage: String,
    pub status: ProgressStatus,
    /// Human-readable description
    pub message: String,
    /// Optional structured payload (counts, provider, file names)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(stage: impl Into<String>, status: ProgressStatus, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            status,
            message: message.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Cloneable handle for publishing progress events.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Publish an event.
    pub fn emit(&self, event: ProgressEvent) {
        debug!(
            stage = %event.stage,
            status = ?event.status,
            message = %event.message,
            "Progress"
        );
        // An error only means there are no subscribers right now
        let _ = self.sender.send(event);
    }

    pub fn active(&self, stage: &str, message: impl Into<String>) {
        self.emit(ProgressEvent::new(stage, ProgressStatus::Active, message));
    }

    pub fn completed(&self, stage: &str, message: impl Into<String>) {
        self.emit(ProgressEvent::new(stage, ProgressStatus::Completed, message));
    }

    pub fn error(&self, stage: &str, message: impl Into<String>) {
        self.emit(ProgressEvent::new(stage, ProgressStatus::Error, message));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();

        reporter.active("initialize", "Loading model");
        reporter.emit(
            ProgressEvent::new("initialize", ProgressStatus::Completed, "Loaded")
                .with_details(serde_json::json!({ "dimensions": 384 })),
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.status, ProgressStatus::Active);
        assert_eq!(first.message, "Loading model");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.status, ProgressStatus::Completed);
        assert_eq!(second.details.unwrap()["dimensions"], 384);
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let reporter = ProgressReporter::new();
        reporter.error("generate", "nobody listening");
    }

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent::new("download", ProgressStatus::Active, "config.json");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "active");
        assert!(json.get("details").is_none());
    }
}
