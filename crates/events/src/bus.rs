//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans every sequenced [`LogEvent`] out to all subscribers.
//! It is designed to be shared via `Arc` across the engine and gateway.

use flowgate_core::event::LogEvent;
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`LogEvent`].
pub struct EventBus {
    sender: broadcast::Sender<LogEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// the [`EventStore`](crate::EventStore) keeps the durable copy.
    pub fn publish(&self, event: LogEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use flowgate_core::event::EventKind;

    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let run_id = flowgate_core::types::RunId::new_v4();

        bus.publish(LogEvent::new(run_id, EventKind::RunStart, "Started").with_step("a"));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.run_id, run_id);
        assert_eq!(received.step_key.as_deref(), Some("a"));
        assert_eq!(received.kind, EventKind::RunStart);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(LogEvent::new(
            flowgate_core::types::RunId::nil(),
            EventKind::EngineEvent,
            "hello",
        ));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.message, "hello");
        assert_eq!(e2.message, "hello");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(LogEvent::new(
            flowgate_core::types::RunId::nil(),
            EventKind::EngineEvent,
            "orphan",
        ));
    }
}
