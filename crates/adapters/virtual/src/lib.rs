//! # dripline-adapter-virtual
//!
//! Simulated collaborators for testing and demonstration purposes. No
//! network, no credentials: email "deliveries" are recorded in memory,
//! tags live in a map, and webhooks go to the log.
//!
//! ## Provided collaborators
//!
//! | Collaborator | Port | Behaviour |
//! |--------------|------|-----------|
//! | [`RecordingMailer`] | `Mailer` | Records every send, returns a fake message id |
//! | [`InMemoryTagStore`] | `TagStore` | Keeps tags per subscriber in a map |
//! | [`LoggingWebhookSink`] | `WebhookSink` | Emits the delivery as a tracing event |
//!
//! ## Dependency rule
//!
//! Depends on `dripline-app` (port traits) and `dripline-domain` only.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use serde_json::{Value, json};

use dripline_app::ports::{Mailer, TagStore, WebhookSink};
use dripline_domain::error::ActionError;
use dripline_domain::id::SubscriberId;

/// One recorded email delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer that records deliveries instead of speaking SMTP.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    /// Everything "delivered" so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().expect("mailer lock poisoned").clone()
    }
}

impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<Value, ActionError> {
        let message_id = format!("virtual-{}", uuid::Uuid::new_v4());
        self.sent.lock().expect("mailer lock poisoned").push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        tracing::debug!(to, subject, %message_id, "virtual mailer delivered email");
        Ok(json!({ "message_id": message_id, "relay": "virtual" }))
    }
}

/// Tag store keeping subscriber tags in memory.
#[derive(Debug, Default)]
pub struct InMemoryTagStore {
    tags: Mutex<HashMap<SubscriberId, BTreeSet<String>>>,
}

impl InMemoryTagStore {
    /// Current tags of one subscriber, sorted.
    #[must_use]
    pub fn tags_of(&self, subscriber_id: SubscriberId) -> Vec<String> {
        self.tags
            .lock()
            .expect("tag store lock poisoned")
            .get(&subscriber_id)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl TagStore for InMemoryTagStore {
    async fn add_tag(&self, subscriber_id: SubscriberId, tag: &str) -> Result<(), ActionError> {
        self.tags
            .lock()
            .expect("tag store lock poisoned")
            .entry(subscriber_id)
            .or_default()
            .insert(tag.to_string());
        Ok(())
    }

    async fn remove_tag(&self, subscriber_id: SubscriberId, tag: &str) -> Result<(), ActionError> {
        if let Some(tags) = self
            .tags
            .lock()
            .expect("tag store lock poisoned")
            .get_mut(&subscriber_id)
        {
            tags.remove(tag);
        }
        Ok(())
    }
}

/// Webhook sink that logs deliveries instead of making HTTP calls.
#[derive(Debug, Default)]
pub struct LoggingWebhookSink {
    delivered: Mutex<Vec<(String, Value)>>,
}

impl LoggingWebhookSink {
    /// Deliveries so far as `(url, payload)` pairs.
    #[must_use]
    pub fn delivered(&self) -> Vec<(String, Value)> {
        self.delivered
            .lock()
            .expect("webhook sink lock poisoned")
            .clone()
    }
}

impl WebhookSink for LoggingWebhookSink {
    async fn deliver(&self, url: &str, payload: &Value) -> Result<(), ActionError> {
        tracing::info!(url, %payload, "virtual webhook delivery");
        self.delivered
            .lock()
            .expect("webhook sink lock poisoned")
            .push((url.to_string(), payload.clone()));
        Ok(())
    }
}
