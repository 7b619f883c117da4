//! Event bus port — publish/subscribe for domain events.

use std::future::Future;

use dripline_domain::error::DriplineError;
use dripline_domain::event::Event;

/// Publishes domain events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), DriplineError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), DriplineError>> + Send {
        (**self).publish(event)
    }
}
