//! Event sink trait and implementations.

use super::{EventKind, PipelineEvent};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, Level};

/// Receives pipeline events.
///
/// Implementations must not fail; anything that goes wrong inside a sink is
/// the sink's own business.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    async fn emit(&self, event: &PipelineEvent);
}

/// A sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: &PipelineEvent) {}
}

/// A sink that logs events through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the given level.
    ///
    /// Anything other than `DEBUG` logs at `INFO`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: &PipelineEvent) {
        let stage = event.stage.as_deref().unwrap_or("-");
        if self.level == Level::DEBUG {
            debug!(
                event_type = %event.kind,
                item = %event.item,
                stage,
                event_data = ?event.data,
                "Event: {}", event.kind
            );
        } else {
            info!(
                event_type = %event.kind,
                item = %event.item,
                stage,
                event_data = ?event.data,
                "Event: {}", event.kind
            );
        }
    }
}

/// A sink that keeps every event, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns events of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: EventKind) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Counts events of one kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.read().iter().filter(|e| e.kind == kind).count()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind) -> PipelineEvent {
        PipelineEvent::new(kind, "Item abc123").with_stage("ReserveJob")
    }

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_events() {
        NoOpEventSink.emit(&event(EventKind::StageStarted)).await;
        LoggingEventSink::default().emit(&event(EventKind::StageStarted)).await;
        LoggingEventSink::debug().emit(&event(EventKind::ItemFailed)).await;
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(&event(EventKind::StageStarted)).await;
        sink.emit(&event(EventKind::StageCompleted)).await;
        sink.emit(&event(EventKind::StageStarted)).await;

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count(EventKind::StageStarted), 2);
        assert_eq!(sink.of_kind(EventKind::StageCompleted).len(), 1);
        assert_eq!(sink.events()[0].kind, EventKind::StageStarted);
    }

    #[tokio::test]
    async fn test_collecting_sink_clear() {
        let sink = CollectingEventSink::new();
        sink.emit(&event(EventKind::ItemCompleted)).await;
        sink.clear();
        assert!(sink.is_empty());
    }
}
