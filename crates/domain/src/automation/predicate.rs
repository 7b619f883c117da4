//! Predicate — a field/operator/value comparison over a run context.
//!
//! The same predicate shape backs both condition nodes and trigger
//! filters, so matching an event and branching inside a run share one
//! set of semantics.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConditionError;
use crate::run::RunContext;

/// Comparison operators supported by predicates.
///
/// Serialized using the symbols authors write in the editor (`==`, `>`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
}

impl CompareOp {
    /// Symbolic form, as serialized.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "in",
            Self::NotIn => "not_in",
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single comparison against one context field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Context field to inspect; dotted paths reach into nested objects.
    pub field: String,
    /// Comparison operator.
    pub op: CompareOp,
    /// Literal to compare against (an array for `in` / `not_in`).
    pub value: Value,
}

impl Predicate {
    /// Evaluate this predicate against a run context.
    ///
    /// Total over well-formed parameters: a missing field evaluates to
    /// `false`, as does a context value of the wrong shape for the
    /// operator. Only a malformed literal — a non-numeric value for a
    /// numeric operator, or a non-array for set membership — is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError`] when the predicate's own `value` cannot
    /// be used with `op`.
    pub fn evaluate(&self, context: &RunContext) -> Result<bool, ConditionError> {
        let Some(actual) = context.get(&self.field) else {
            return Ok(false);
        };

        match self.op {
            CompareOp::Eq => Ok(*actual == self.value),
            CompareOp::Ne => Ok(*actual != self.value),
            CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
                let expected = self.value.as_f64().ok_or(ConditionError::NonNumericOperand {
                    op: self.op.as_str().to_string(),
                })?;
                let Some(actual) = actual.as_f64() else {
                    return Ok(false);
                };
                Ok(match self.op {
                    CompareOp::Gt => actual > expected,
                    CompareOp::Gte => actual >= expected,
                    CompareOp::Lt => actual < expected,
                    _ => actual <= expected,
                })
            }
            CompareOp::In | CompareOp::NotIn => {
                let candidates = self.value.as_array().ok_or(ConditionError::NonSetOperand {
                    op: self.op.as_str().to_string(),
                })?;
                let contained = candidates.contains(actual);
                Ok(if self.op == CompareOp::In {
                    contained
                } else {
                    !contained
                })
            }
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}
