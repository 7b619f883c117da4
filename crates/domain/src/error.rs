//! Error types shared across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`DriplineError`] via `#[from]`; adapters wrap their infrastructure
//! errors behind the `Storage` variant so the core never depends on them.

/// Base error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum DriplineError {
    /// A domain invariant was violated while building or saving an automation.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced aggregate does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// The node graph broke during execution (dangling reference, suspected cycle).
    #[error("automation structure error")]
    Structural(#[from] StructuralError),

    /// A condition node or trigger filter carried malformed parameters.
    #[error("condition error")]
    Condition(#[from] ConditionError),

    /// An action failed beyond what the retry policy allows.
    #[error("action error")]
    Action(#[from] ActionError),

    /// An infrastructure error from a storage adapter.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations, reported at build/save time — never at
/// execution time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The automation name is empty.
    #[error("name must not be empty")]
    EmptyName,

    /// The automation has no nodes, so there is nothing to execute.
    #[error("automation must contain at least one node")]
    NoNodes,

    /// Two nodes share the same id.
    #[error("duplicate node id: {0}")]
    DuplicateNodeId(String),

    /// A successor edge points at a node id that does not exist.
    #[error("node {from} references unknown node {to}")]
    UnknownNodeReference { from: String, to: String },

    /// The node graph contains a cycle and could never terminate.
    #[error("node graph contains a cycle")]
    CycleDetected,
}

/// A lookup failed for an aggregate that was expected to exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    /// Kind of aggregate, e.g. `"Automation"` or `"Run"`.
    pub entity: &'static str,
    /// Stringified identifier.
    pub id: String,
}

/// The stored graph broke at execution time. Always fatal to the run,
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// The run cursor points at a node id missing from the collection.
    #[error("run cursor points at unknown node: {node_id}")]
    DanglingNode { node_id: String },

    /// The visit budget was exhausted, which only happens when the stored
    /// graph contains a cycle that slipped past save-time validation.
    #[error("cycle suspected: {visits} node visits exceeded budget of {budget}")]
    CycleSuspected { visits: usize, budget: usize },

    /// The automation has no nodes to start from.
    #[error("automation has no entry node")]
    MissingEntryNode,
}

/// A condition carried parameters that cannot be evaluated. Fatal to the
/// run at that node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    /// A numeric comparison operator was given a non-numeric literal.
    #[error("operator {op} requires a numeric comparison value")]
    NonNumericOperand { op: String },

    /// A set-membership operator was given a non-array literal.
    #[error("operator {op} requires an array of candidate values")]
    NonSetOperand { op: String },
}

/// Failure modes of an action dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The action parameters or run context are unusable. Never retried.
    #[error("invalid action parameters: {0}")]
    InvalidParams(String),

    /// A transient collaborator failure worth retrying.
    #[error("transient action failure: {0}")]
    Transient(String),

    /// The collaborator is unreachable; retried with backoff, eventually fatal.
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
}

impl ActionError {
    /// Whether the retry policy applies to this failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidParams(_))
    }
}
