//! Collaborator ports — one narrow interface per action concern.
//!
//! Each action node type resolves to exactly one of these traits. The
//! implementations are thin adapters over external services (SMTP relay,
//! subscriber directory, outbound HTTP); their failure modes are expressed
//! uniformly as [`ActionError`] so the executor's retry policy applies
//! without knowing who it is talking to.

use std::future::Future;

use dripline_domain::error::ActionError;
use dripline_domain::id::SubscriberId;

/// Sends transactional email on behalf of the engine.
pub trait Mailer {
    /// Send a message; returns a structured delivery acknowledgement
    /// (message id, relay, …) that is merged into the run context.
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<serde_json::Value, ActionError>> + Send;
}

/// Manages tags on subscriber records.
pub trait TagStore {
    /// Attach `tag` to the subscriber.
    fn add_tag(
        &self,
        subscriber_id: SubscriberId,
        tag: &str,
    ) -> impl Future<Output = Result<(), ActionError>> + Send;

    /// Remove `tag` from the subscriber.
    fn remove_tag(
        &self,
        subscriber_id: SubscriberId,
        tag: &str,
    ) -> impl Future<Output = Result<(), ActionError>> + Send;
}

/// Delivers run context snapshots to external webhooks.
pub trait WebhookSink {
    /// POST `payload` to `url`.
    fn deliver(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<(), ActionError>> + Send;
}

impl<T: Mailer + Send + Sync> Mailer for std::sync::Arc<T> {
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<serde_json::Value, ActionError>> + Send {
        (**self).send(to, subject, body)
    }
}

impl<T: TagStore + Send + Sync> TagStore for std::sync::Arc<T> {
    fn add_tag(
        &self,
        subscriber_id: SubscriberId,
        tag: &str,
    ) -> impl Future<Output = Result<(), ActionError>> + Send {
        (**self).add_tag(subscriber_id, tag)
    }

    fn remove_tag(
        &self,
        subscriber_id: SubscriberId,
        tag: &str,
    ) -> impl Future<Output = Result<(), ActionError>> + Send {
        (**self).remove_tag(subscriber_id, tag)
    }
}

impl<T: WebhookSink + Send + Sync> WebhookSink for std::sync::Arc<T> {
    fn deliver(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<(), ActionError>> + Send {
        (**self).deliver(url, payload)
    }
}
