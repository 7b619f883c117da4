//! Action — the effect an action node performs on a subscriber.

use serde::{Deserialize, Serialize};

/// Operation carried by an action node.
///
/// A closed set: every variant maps to exactly one collaborator port, and
/// an unknown `type` tag fails at deserialization — automations with
/// unregistered actions never load, let alone execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Send an email to the subscriber.
    ///
    /// The recipient address is taken from the run context's `email` field.
    SendEmail { subject: String, body: String },

    /// Attach a tag to the subscriber.
    AddTag { tag: String },

    /// Remove a tag from the subscriber.
    RemoveTag { tag: String },

    /// Deliver the run context snapshot to an external webhook.
    Notify { url: String },
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SendEmail { subject, .. } => write!(f, "send_email({subject})"),
            Self::AddTag { tag } => write!(f, "add_tag({tag})"),
            Self::RemoveTag { tag } => write!(f, "remove_tag({tag})"),
            Self::Notify { url } => write!(f, "notify({url})"),
        }
    }
}
