//! Node — one step in an automation graph.
//!
//! Nodes reference each other by string id rather than by pointer: the
//! graph stays serializable as authored, and successor edges are resolved
//! by id lookup at each execution step.

use serde::{Deserialize, Serialize};

use crate::automation::{Action, Predicate};

/// Identifier of a node, unique within its automation.
///
/// Authored as a short string in the editor (`"n1"`, `"welcome-email"`),
/// not a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single node: id, display label, and its typed behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Display-only label from the editor; the engine ignores it.
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// The behavior of a node, one variant per node type.
///
/// Each variant carries its own parameter schema and its own successor
/// edges, so "at most one of `next`/`branches`" holds by construction and
/// an unknown `type` tag fails when the automation is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Perform an [`Action`] and continue to `next` (terminal if absent).
    Action {
        action: Action,
        #[serde(default)]
        next: Option<NodeId>,
    },
    /// Evaluate a [`Predicate`] and branch; an absent branch target is an
    /// explicit dead end, not an error.
    Condition {
        predicate: Predicate,
        #[serde(default)]
        on_true: Option<NodeId>,
        #[serde(default)]
        on_false: Option<NodeId>,
    },
    /// Suspend the run and resume at `next` once the delay has elapsed.
    Delay {
        seconds: u64,
        #[serde(default)]
        next: Option<NodeId>,
    },
}

impl Node {
    /// All node ids this node can advance to.
    pub fn successors(&self) -> impl Iterator<Item = &NodeId> {
        let (a, b) = match &self.kind {
            NodeKind::Action { next, .. } | NodeKind::Delay { next, .. } => (next.as_ref(), None),
            NodeKind::Condition {
                on_true, on_false, ..
            } => (on_true.as_ref(), on_false.as_ref()),
        };
        a.into_iter().chain(b)
    }

    /// Stable name of the node type, as serialized.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Action { .. } => "action",
            NodeKind::Condition { .. } => "condition",
            NodeKind::Delay { .. } => "delay",
        }
    }
}
