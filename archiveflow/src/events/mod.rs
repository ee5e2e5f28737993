//! Pipeline events for observability.
//!
//! The pipeline reports stage transitions, scheduled retries and item
//! outcomes to an [`EventSink`]. Sinks never influence control flow.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A stage was entered.
    #[serde(rename = "stage.started")]
    StageStarted,
    /// A stage completed.
    #[serde(rename = "stage.completed")]
    StageCompleted,
    /// A retryable stage parked the item for a later retry.
    #[serde(rename = "stage.retry_scheduled")]
    RetryScheduled,
    /// The item went through every stage.
    #[serde(rename = "item.completed")]
    ItemCompleted,
    /// The item was canceled while waiting for a retry.
    #[serde(rename = "item.canceled")]
    ItemCanceled,
    /// A stage failed fatally.
    #[serde(rename = "item.failed")]
    ItemFailed,
}

impl EventKind {
    /// The dotted event name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StageStarted => "stage.started",
            Self::StageCompleted => "stage.completed",
            Self::RetryScheduled => "stage.retry_scheduled",
            Self::ItemCompleted => "item.completed",
            Self::ItemCanceled => "item.canceled",
            Self::ItemFailed => "item.failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single pipeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Event type.
    pub kind: EventKind,
    /// Description of the item (`Item <ident>` or `Item <id>`).
    pub item: String,
    /// Stage the event refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// When the event was created.
    pub timestamp: Timestamp,
    /// Extra payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl PipelineEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(kind: EventKind, item: impl Into<String>) -> Self {
        Self {
            kind,
            item: item.into(),
            stage: None,
            timestamp: now_utc(),
            data: None,
        }
    }

    /// Sets the stage.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_names() {
        assert_eq!(EventKind::StageStarted.to_string(), "stage.started");
        assert_eq!(EventKind::RetryScheduled.as_str(), "stage.retry_scheduled");
        assert_eq!(
            serde_json::to_value(EventKind::ItemCanceled).unwrap(),
            json!("item.canceled")
        );
    }

    #[test]
    fn test_event_serialization_skips_empty_fields() {
        let event = PipelineEvent::new(EventKind::ItemCompleted, "Item abc123");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["kind"], "item.completed");
        assert_eq!(value["item"], "Item abc123");
        assert!(value.get("stage").is_none());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_builder_fields() {
        let event = PipelineEvent::new(EventKind::RetryScheduled, "Item abc123")
            .with_stage("ReserveJob")
            .with_data(json!({"delay_secs": 5}));

        assert_eq!(event.stage.as_deref(), Some("ReserveJob"));
        assert_eq!(event.data, Some(json!({"delay_secs": 5})));
    }
}
