//! UI event bus
//!
//! Views publish toasts and change notifications here; the host rendering
//! layer subscribes. Lagging subscribers lose old events rather than blocking
//! producers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Events the rendering layer reacts to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// Transient notification
    Notice { level: NoticeLevel, message: String },
    TranscriptChanged { recording_id: i64 },
    MinutesChanged { recording_id: i64 },
    RecordingChanged { recording_id: i64 },
    SessionsChanged { project_id: i64 },
    KnowledgeBaseChanged { project_id: i64 },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: UiEvent) {
        // No subscribers is fine: nothing is rendering right now
        if self.tx.send(event).is_err() {
            crate::hot_trace!("UI event dropped, no subscribers");
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notice(NoticeLevel::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notice(NoticeLevel::Success, message.into());
    }

    /// Error toast; also logged since it is user-visible
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.notice(NoticeLevel::Error, message);
    }

    fn notice(&self, level: NoticeLevel, message: String) {
        self.emit(UiEvent::Notice { level, message });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.error("nobody listening");
    }

    #[tokio::test]
    async fn test_subscriber_receives_notice() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.success("Saved");
        assert_eq!(
            rx.recv().await.unwrap(),
            UiEvent::Notice { level: NoticeLevel::Success, message: "Saved".to_string() }
        );
    }
}
