//! Broadcast event bus for distributing `CompanionEvent` to multiple subscribers.
//!
//! Built on `tokio::sync::broadcast`, the `EventBus` supports multiple
//! concurrent subscribers (one per open SSE stream). Publishing with no
//! active subscribers is a no-op.

use kindred_types::event::CompanionEvent;
use tokio::sync::broadcast;

/// Default channel capacity. A slow client lags after this many events.
pub const DEFAULT_CAPACITY: usize = 256;

/// Multi-consumer event bus for companion events.
///
/// Cloning the bus clones the sender, allowing multiple producers and
/// consumers.
pub struct EventBus {
    sender: broadcast::Sender<CompanionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<CompanionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: CompanionEvent) {
        tracing::trace!(event = event.name(), "publishing event");
        let _ = self.sender.send(event);
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

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn message(text: &str) -> CompanionEvent {
        CompanionEvent::MessageReceived {
            character_id: Uuid::now_v7(),
            character_name: "Luna".to_string(),
            content: text.to_string(),
            kind: "text".to_string(),
            media_path: None,
            autonomous: false,
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe_delivers_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(message("hello"));

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, CompanionEvent::MessageReceived { ref content, .. } if content == "hello"));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(CompanionEvent::SceneStopped { scene_id: Uuid::now_v7() });

        assert!(matches!(rx1.recv().await.unwrap(), CompanionEvent::SceneStopped { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), CompanionEvent::SceneStopped { .. }));
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(message("into the void"));
    }

    #[tokio::test]
    async fn lagged_receiver_reports_lag() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        for i in 0..10 {
            bus.publish(message(&format!("msg {i}")));
        }

        match rx.try_recv() {
            Err(broadcast::error::TryRecvError::Lagged(n)) => assert!(n > 0),
            other => panic!("expected lag, got {other:?}"),
        }
    }

    #[test]
    fn clone_shares_channel() {
        let bus = EventBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(message("via clone"));

        assert!(rx.try_recv().is_ok());
        assert!(format!("{bus:?}").contains("receiver_count"));
    }
}
