//! Run — one execution of an automation for one subscriber.
//!
//! A run is a serializable cursor over the node graph: automation id,
//! subscriber id, the triggering event id, the next node to execute, and
//! the accumulated context. Everything needed to continue after a delay —
//! or a process restart — lives here, never in an in-memory timer.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::automation::NodeId;
use crate::id::{AutomationId, EventId, RunId, SubscriberId};
use crate::time::Timestamp;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Actively walking the node graph.
    Running,
    /// Parked at a delay node until `resume_at`.
    Suspended,
    /// Reached a terminal node or an explicit dead end.
    Completed,
    /// Stopped by a structural, condition, or exhausted action failure.
    Failed,
}

impl RunStatus {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing failure for [`RunStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown run status: {0}")]
pub struct UnknownRunStatus(pub String);

impl FromStr for RunStatus {
    type Err = UnknownRunStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "suspended" => Ok(Self::Suspended),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownRunStatus(other.to_string())),
        }
    }
}

/// Key/value state accumulated from the trigger payload and node outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunContext(serde_json::Map<String, Value>);

impl RunContext {
    /// Build the initial context from a trigger payload.
    ///
    /// Object payloads become the context as-is; anything else is stored
    /// under a `payload` key so no event data is dropped.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Self {
        match payload {
            Value::Object(map) => Self(map.clone()),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("payload".to_string(), other.clone());
                Self(map)
            }
        }
    }

    /// Look up a field; dotted paths descend into nested objects.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        let mut parts = field.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Merge a node's output into the context.
    ///
    /// Object outputs are merged key-by-key (later writes win); any other
    /// shape lands under an `output` key.
    pub fn merge(&mut self, output: Value) {
        match output {
            Value::Object(map) => self.0.extend(map),
            other => {
                self.0.insert("output".to_string(), other);
            }
        }
    }

    /// Clone the context as a JSON object, for log snapshots and webhooks.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Per-subscriber execution state for one automation and one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub automation_id: AutomationId,
    pub subscriber_id: SubscriberId,
    /// Identifies the event occurrence; part of the idempotency triple.
    pub trigger_event_id: EventId,
    /// The next node to execute; `None` once nothing is left.
    pub cursor: Option<NodeId>,
    pub context: RunContext,
    pub status: RunStatus,
    /// Earliest time a suspended run may continue.
    pub resume_at: Option<Timestamp>,
    pub started_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Run {
    /// Create a fresh run positioned at the automation's entry node.
    #[must_use]
    pub fn start(
        automation_id: AutomationId,
        subscriber_id: SubscriberId,
        trigger_event_id: EventId,
        entry: NodeId,
        context: RunContext,
    ) -> Self {
        let now = crate::time::now();
        Self {
            id: RunId::new(),
            automation_id,
            subscriber_id,
            trigger_event_id,
            cursor: Some(entry),
            context,
            status: RunStatus::Running,
            resume_at: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Move the cursor to the next node; no successor completes the run.
    pub fn advance(&mut self, next: Option<NodeId>) {
        self.cursor = next;
        if self.cursor.is_none() {
            self.status = RunStatus::Completed;
        }
        self.touch();
    }

    /// Park the run at a delay: persistable, resumable at `resume_at`.
    pub fn suspend(&mut self, resume_at: Timestamp, next: NodeId) {
        self.status = RunStatus::Suspended;
        self.cursor = Some(next);
        self.resume_at = Some(resume_at);
        self.touch();
    }

    /// Wake a suspended run for continued execution.
    pub fn resume(&mut self) {
        self.status = RunStatus::Running;
        self.resume_at = None;
        self.touch();
    }

    /// Mark the run completed.
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.cursor = None;
        self.touch();
    }

    /// Mark the run failed; the cursor keeps pointing at the failed node.
    pub fn fail(&mut self) {
        self.status = RunStatus::Failed;
        self.touch();
    }

    /// Whether the run can never execute another node.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Failed)
    }

    fn touch(&mut self) {
        self.updated_at = crate::time::now();
    }
}
