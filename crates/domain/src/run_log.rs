//! Execution log — append-only records of node execution attempts.
//!
//! One entry per attempt, retries included, across all runs. Entries are
//! never mutated or deleted by the engine; retention is someone else's
//! concern. Reporting reads them by automation or subscriber, and the
//! audit trail for a run is the ordered list of its entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::automation::NodeId;
use crate::id::{AutomationId, LogEntryId, RunId, SubscriberId};
use crate::run::Run;
use crate::time::Timestamp;

/// Outcome of a single node execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failure,
}

impl StepStatus {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsing failure for [`StepStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown step status: {0}")]
pub struct UnknownStepStatus(pub String);

impl std::str::FromStr for StepStatus {
    type Err = UnknownStepStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            other => Err(UnknownStepStatus(other.to_string())),
        }
    }
}

/// One node execution attempt, as recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogEntryId,
    pub run_id: RunId,
    pub automation_id: AutomationId,
    pub node_id: NodeId,
    pub subscriber_id: SubscriberId,
    pub status: StepStatus,
    /// 1-based attempt counter; retries of the same node bump it.
    pub attempt: u32,
    /// Snapshot of what the node was asked to do.
    pub input: Value,
    /// What came out: action output, evaluated boolean, or error detail.
    pub output: Value,
    pub executed_at: Timestamp,
}

impl LogEntry {
    /// Record a successful attempt for a node of `run`.
    #[must_use]
    pub fn success(run: &Run, node_id: NodeId, attempt: u32, input: Value, output: Value) -> Self {
        Self::record(run, node_id, StepStatus::Success, attempt, input, output)
    }

    /// Record a failed attempt; the error message lands in `output`.
    #[must_use]
    pub fn failure(run: &Run, node_id: NodeId, attempt: u32, input: Value, error: &str) -> Self {
        Self::record(
            run,
            node_id,
            StepStatus::Failure,
            attempt,
            input,
            serde_json::json!({ "error": error }),
        )
    }

    fn record(
        run: &Run,
        node_id: NodeId,
        status: StepStatus,
        attempt: u32,
        input: Value,
        output: Value,
    ) -> Self {
        Self {
            id: LogEntryId::new(),
            run_id: run.id,
            automation_id: run.automation_id,
            node_id,
            subscriber_id: run.subscriber_id,
            status,
            attempt,
            input,
            output,
            executed_at: crate::time::now(),
        }
    }
}
