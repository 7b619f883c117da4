//! Run repository port — persistence for run cursors.
//!
//! The run row is the durable record of an execution: it is created before
//! the first node runs (making it the authoritative idempotency check) and
//! updated after every step, so a suspended or interrupted run can be
//! rebuilt from storage alone.

use std::future::Future;

use dripline_domain::error::DriplineError;
use dripline_domain::id::{AutomationId, EventId, RunId, SubscriberId};
use dripline_domain::run::Run;
use dripline_domain::time::Timestamp;

/// Repository for persisting and querying [`Run`]s.
pub trait RunRepository {
    /// Persist a new run.
    fn create(&self, run: Run) -> impl Future<Output = Result<Run, DriplineError>> + Send;

    /// Persist the current state of an existing run.
    fn update(&self, run: Run) -> impl Future<Output = Result<Run, DriplineError>> + Send;

    /// Get a run by its unique identifier.
    fn get_by_id(
        &self,
        id: RunId,
    ) -> impl Future<Output = Result<Option<Run>, DriplineError>> + Send;

    /// Find the run for an idempotency triple, whatever its status.
    fn find_by_trigger(
        &self,
        automation_id: AutomationId,
        subscriber_id: SubscriberId,
        trigger_event_id: EventId,
    ) -> impl Future<Output = Result<Option<Run>, DriplineError>> + Send;

    /// Suspended runs whose `resume_at` is at or before `before`,
    /// oldest-first, capped at `limit`.
    fn find_due(
        &self,
        before: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Run>, DriplineError>> + Send;
}

impl<T: RunRepository + Send + Sync> RunRepository for std::sync::Arc<T> {
    fn create(&self, run: Run) -> impl Future<Output = Result<Run, DriplineError>> + Send {
        (**self).create(run)
    }

    fn update(&self, run: Run) -> impl Future<Output = Result<Run, DriplineError>> + Send {
        (**self).update(run)
    }

    fn get_by_id(
        &self,
        id: RunId,
    ) -> impl Future<Output = Result<Option<Run>, DriplineError>> + Send {
        (**self).get_by_id(id)
    }

    fn find_by_trigger(
        &self,
        automation_id: AutomationId,
        subscriber_id: SubscriberId,
        trigger_event_id: EventId,
    ) -> impl Future<Output = Result<Option<Run>, DriplineError>> + Send {
        (**self).find_by_trigger(automation_id, subscriber_id, trigger_event_id)
    }

    fn find_due(
        &self,
        before: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Run>, DriplineError>> + Send {
        (**self).find_due(before, limit)
    }
}
