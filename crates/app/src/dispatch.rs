//! Action dispatch — a typed registry from node actions to collaborators.
//!
//! The dispatcher is pure routing: each [`Action`] variant maps to exactly
//! one collaborator port, and the structured output of a successful
//! dispatch is what the executor merges into the run context. Anything
//! heavier (templates, throttling, provider fallback) belongs behind the
//! ports, not here.

use serde_json::{Value, json};

use dripline_domain::automation::Action;
use dripline_domain::error::ActionError;
use dripline_domain::id::SubscriberId;
use dripline_domain::run::RunContext;

use crate::ports::{Mailer, TagStore, WebhookSink};

/// Routes actions to the collaborator ports they need.
pub struct ActionDispatcher<M, T, W> {
    mailer: M,
    tags: T,
    webhooks: W,
}

impl<M, T, W> ActionDispatcher<M, T, W>
where
    M: Mailer,
    T: TagStore,
    W: WebhookSink,
{
    /// Create a dispatcher over the given collaborators.
    pub fn new(mailer: M, tags: T, webhooks: W) -> Self {
        Self {
            mailer,
            tags,
            webhooks,
        }
    }

    /// Execute one action for one subscriber against the current context.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidParams`] when the context lacks data
    /// the action needs (e.g. a recipient address), or whatever failure the
    /// collaborator reports.
    pub async fn execute(
        &self,
        action: &Action,
        subscriber_id: SubscriberId,
        context: &RunContext,
    ) -> Result<Value, ActionError> {
        match action {
            Action::SendEmail { subject, body } => {
                let to = context
                    .get("email")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ActionError::InvalidParams(
                            "send_email requires an `email` field in the run context".to_string(),
                        )
                    })?;
                let delivery = self.mailer.send(to, subject, body).await?;
                Ok(json!({
                    "sent_to": to,
                    "subject": subject,
                    "delivery": delivery,
                }))
            }
            Action::AddTag { tag } => {
                self.tags.add_tag(subscriber_id, tag).await?;
                Ok(json!({ "tag": tag, "tagged": true }))
            }
            Action::RemoveTag { tag } => {
                self.tags.remove_tag(subscriber_id, tag).await?;
                Ok(json!({ "tag": tag, "tagged": false }))
            }
            Action::Notify { url } => {
                self.webhooks.deliver(url, &context.snapshot()).await?;
                Ok(json!({ "notified": url }))
            }
        }
    }
}
