//! Unified event bus trait for emitting lifecycle events from any module.
//!
//! Modules accept an `Arc<dyn EventSink>` and emit events into whatever
//! pipeline the host wires up (analytics, webhooks, message bus).

use crate::types::{EventType, LifecycleEvent};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Trait for emitting lifecycle events. Implementations route events to
/// the host orchestration layer.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent);
}

/// No-op sink for tests and modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: LifecycleEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().expect("event bus mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("event bus mutex poisoned").len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .expect("event bus mutex poisoned")
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event bus mutex poisoned").clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: LifecycleEvent) {
        self.events.lock().expect("event bus mutex poisoned").push(event);
    }
}

/// Convenience builder for creating `LifecycleEvent` with minimal boilerplate.
pub fn make_event(
    event_type: EventType,
    user_id: impl Into<String>,
    email: Option<String>,
    step: Option<usize>,
    payload: serde_json::Value,
) -> LifecycleEvent {
    LifecycleEvent {
        event_id: Uuid::new_v4(),
        event_type,
        user_id: user_id.into(),
        email,
        step,
        payload,
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus for modules that don't need it.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        sink.emit(make_event(
            EventType::SequenceStarted,
            "user-1",
            Some("u1@example.com".into()),
            Some(0),
            serde_json::json!({}),
        ));
        sink.emit(make_event(
            EventType::EmailQueued,
            "user-1",
            Some("u1@example.com".into()),
            Some(0),
            serde_json::json!({"template_id": "welcome_day0"}),
        ));

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.count_type(EventType::SequenceStarted), 1);
        assert_eq!(sink.count_type(EventType::EmailQueued), 1);

        let events = sink.events();
        assert_eq!(events[0].user_id, "user-1");
        assert_eq!(events[1].step, Some(0));
    }

    #[test]
    fn test_noop_sink() {
        let sink = noop_sink();
        // Should not panic
        sink.emit(make_event(
            EventType::SequenceCompleted,
            "user-1",
            None,
            None,
            serde_json::json!({}),
        ));
    }
}
