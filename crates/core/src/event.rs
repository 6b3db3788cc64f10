//! Runtime events for observers that are not part of an exchange.
//!
//! The orchestrator reports what each exchange did here; the binary logs
//! it. Publishing never blocks and never fails, and a subscriber that falls
//! behind loses the oldest events rather than slowing exchanges down.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Something observable that happened during an exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// Taken off the inbound queue.
    MessageReceived {
        channel: String,
        sender_id: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// Terminal assistant turn produced after `iterations` model calls.
    ResponseGenerated {
        channel: String,
        model: String,
        iterations: usize,
        timestamp: DateTime<Utc>,
    },

    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Stopped at the model-call cap with tool calls still pending.
    ExchangeTruncated {
        channel: String,
        max_turns: usize,
        timestamp: DateTime<Utc>,
    },

    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Fan-out of [`DomainEvent`]s to any number of subscribers.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// A bus that buffers up to `capacity` events per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        // Err only means nobody is listening.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truncated(max_turns: usize) -> DomainEvent {
        DomainEvent::ExchangeTruncated {
            channel: "console".into(),
            max_turns,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let bus = EventBus::new(16);
        let mut logger = bus.subscribe();
        let mut audit = bus.subscribe();

        bus.publish(DomainEvent::ToolExecuted {
            tool_name: "shell_run".into(),
            success: false,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        for rx in [&mut logger, &mut audit] {
            let event = rx.recv().await.unwrap();
            let DomainEvent::ToolExecuted { tool_name, success, .. } = event.as_ref() else {
                panic!("unexpected event {event:?}");
            };
            assert_eq!(tool_name, "shell_run");
            assert!(!success);
        }
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        EventBus::new(16).publish(truncated(5));
    }

    #[tokio::test]
    async fn lagging_subscriber_loses_oldest_events() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for turns in 1..=3 {
            bus.publish(truncated(turns));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        let next = rx.recv().await.unwrap();
        assert!(matches!(next.as_ref(), DomainEvent::ExchangeTruncated { max_turns: 2, .. }));
    }
}
