//! Event — an immutable record of something that happened to a subscriber.
//!
//! Events are produced by the surrounding system (form submissions, link
//! clicks, …) and consumed by the trigger matcher. The engine never
//! publishes trigger events itself.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::{EventId, SubscriberId};
use crate::time::Timestamp;

/// Closed enumeration of domain event types an automation can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A new lead entered the system.
    NewLead,
    /// A subscriber clicked a tracked link.
    Click,
    /// A subscriber submitted a form.
    FormSubmitted,
    /// A subscriber opened an email.
    EmailOpened,
    /// A subscriber unsubscribed.
    Unsubscribed,
}

impl EventType {
    /// Stable string form used on the wire and in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewLead => "new_lead",
            Self::Click => "click",
            Self::FormSubmitted => "form_submitted",
            Self::EmailOpened => "email_opened",
            Self::Unsubscribed => "unsubscribed",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing failure for [`EventType`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_lead" => Ok(Self::NewLead),
            "click" => Ok(Self::Click),
            "form_submitted" => Ok(Self::FormSubmitted),
            "email_opened" => Ok(Self::EmailOpened),
            "unsubscribed" => Ok(Self::Unsubscribed),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

/// A single event occurrence.
///
/// The event id identifies the occurrence itself: the idempotency triple
/// `(automation, subscriber, event)` is keyed on it, so re-delivering the
/// same event never starts a second run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub subscriber_id: Option<SubscriberId>,
    pub payload: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create a new event stamped with the current time.
    #[must_use]
    pub fn new(
        event_type: EventType,
        subscriber_id: Option<SubscriberId>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            subscriber_id,
            payload,
            timestamp: crate::time::now(),
        }
    }

    /// Resolve the subscriber this event concerns.
    ///
    /// Prefers the typed field; falls back to a `subscriber_id` key in the
    /// payload for producers that only ship a raw record.
    #[must_use]
    pub fn resolve_subscriber(&self) -> Option<SubscriberId> {
        self.subscriber_id.or_else(|| {
            self.payload
                .get("subscriber_id")
                .and_then(serde_json::Value::as_str)
                .and_then(|raw| raw.parse().ok())
        })
    }
}
