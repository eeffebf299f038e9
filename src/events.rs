//! Session events published to UI and console bridges

use serde::Serialize;
use tokio::sync::broadcast;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Human-readable outcome of an action
    Status { message: String },
    /// Tethering macro finished and the countdown began
    Started { session_name: String, minutes: u32 },
    Tick { remaining_seconds: u32 },
    Reminder { minutes: u32, message: String },
    Expired,
    Ended,
    Failed { reason: String },
}

impl SessionEvent {
    pub fn status(message: impl Into<String>) -> Self {
        SessionEvent::Status {
            message: message.into(),
        }
    }
}

/// `mm:ss` for a remaining-seconds count
pub fn format_clock(remaining_seconds: u32) -> String {
    format!("{:02}:{:02}", remaining_seconds / 60, remaining_seconds % 60)
}

/// Broadcast fan-out of session events.
///
/// Publishing never blocks and never fails; with no subscribers the event is
/// dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(1800), "30:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(0), "00:00");
    }

    #[test]
    fn test_events_serialize_tagged() {
        let json = serde_json::to_string(&SessionEvent::Tick {
            remaining_seconds: 42,
        })
        .unwrap();
        assert_eq!(json, r#"{"event":"tick","remaining_seconds":42}"#);
        let json = serde_json::to_string(&SessionEvent::Expired).unwrap();
        assert_eq!(json, r#"{"event":"expired"}"#);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.publish(SessionEvent::Ended);
        let mut rx = bus.subscribe();
        bus.publish(SessionEvent::status("ok"));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::status("ok"));
    }
}
