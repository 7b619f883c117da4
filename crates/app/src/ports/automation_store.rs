//! Automation store port — read access to stored automations.
//!
//! The engine only reads: create/update/delete belong to the administrative
//! surface that owns the editor, not to the matcher or executor.

use std::future::Future;

use dripline_domain::automation::Automation;
use dripline_domain::error::DriplineError;
use dripline_domain::event::EventType;
use dripline_domain::id::AutomationId;

/// Read-only repository for [`Automation`]s.
pub trait AutomationStore {
    /// Get an automation by its unique identifier.
    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, DriplineError>> + Send;

    /// Get all automations, for reporting surfaces.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, DriplineError>> + Send;

    /// Get the enabled automations whose trigger listens for `event_type`.
    fn find_enabled_by_event(
        &self,
        event_type: EventType,
    ) -> impl Future<Output = Result<Vec<Automation>, DriplineError>> + Send;
}

impl<T: AutomationStore + Send + Sync> AutomationStore for std::sync::Arc<T> {
    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<Automation>, DriplineError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Automation>, DriplineError>> + Send {
        (**self).get_all()
    }

    fn find_enabled_by_event(
        &self,
        event_type: EventType,
    ) -> impl Future<Output = Result<Vec<Automation>, DriplineError>> + Send {
        (**self).find_enabled_by_event(event_type)
    }
}
