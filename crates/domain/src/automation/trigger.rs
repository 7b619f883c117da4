//! Trigger — the event pattern that starts runs for an automation.

use serde::{Deserialize, Serialize};

use crate::automation::Predicate;
use crate::error::ConditionError;
use crate::event::{Event, EventType};
use crate::run::RunContext;

/// Describes which events start this automation.
///
/// The filter predicates are evaluated against the event payload with the
/// same semantics as condition nodes; all must hold (logical AND), and an
/// empty filter matches every event of the right type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub event_type: EventType,
    #[serde(default)]
    pub filter: Vec<Predicate>,
}

impl Trigger {
    /// Trigger with no filter — every event of `event_type` matches.
    #[must_use]
    pub fn on(event_type: EventType) -> Self {
        Self {
            event_type,
            filter: Vec::new(),
        }
    }

    /// Check whether this trigger matches a given event.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError`] when a filter predicate carries malformed
    /// parameters; the caller decides how to isolate the failure.
    pub fn matches_event(&self, event: &Event) -> Result<bool, ConditionError> {
        if self.event_type != event.event_type {
            return Ok(false);
        }
        let context = RunContext::from_payload(&event.payload);
        for predicate in &self.filter {
            if !predicate.evaluate(&context)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{} filters]", self.event_type, self.filter.len())
    }
}
