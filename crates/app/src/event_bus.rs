//! In-process event bus backed by a tokio broadcast channel.
//!
//! An explicit instance is handed to producers and to the trigger matcher
//! at construction time — there is no process-wide singleton, so tests can
//! run isolated buses side by side.

use std::future::Future;

use tokio::sync::broadcast;

use dripline_domain::error::DriplineError;
use dripline_domain::event::Event;

use crate::ports::EventPublisher;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing never blocks the caller and succeeds even when there are no
/// active subscribers (the event is simply dropped).
pub struct InProcessEventBus {
    sender: broadcast::Sender<Event>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), DriplineError>> + Send {
        // broadcast::send fails only when there are zero receivers,
        // which is fine — the event just has no audience yet.
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dripline_domain::event::EventType;
    use dripline_domain::id::SubscriberId;

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        let event = Event::new(
            EventType::NewLead,
            Some(SubscriberId::new()),
            serde_json::json!({"country": "US"}),
        );
        let event_id = event.id;

        bus.publish(event).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, event_id);
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let event = Event::new(EventType::Click, None, serde_json::json!({}));
        let event_id = event.id;

        bus.publish(event).await.unwrap();

        let r1 = rx1.recv().await.unwrap();
        let r2 = rx2.recv().await.unwrap();
        assert_eq!(r1.id, event_id);
        assert_eq!(r2.id, event_id);
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        let event = Event::new(EventType::Unsubscribed, None, serde_json::json!({}));
        let result = bus.publish(event).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);

        let early = Event::new(EventType::NewLead, None, serde_json::json!({}));
        bus.publish(early).await.unwrap();

        let mut rx = bus.subscribe();

        let later = Event::new(EventType::Click, None, serde_json::json!({}));
        let later_id = later.id;
        bus.publish(later).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, later_id);
    }
}
