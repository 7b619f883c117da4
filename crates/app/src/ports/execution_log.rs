//! Execution log port — append & query node execution records.

use std::future::Future;

use dripline_domain::error::DriplineError;
use dripline_domain::id::{AutomationId, RunId, SubscriberId};
use dripline_domain::run_log::LogEntry;

/// Append-only store for [`LogEntry`]s.
///
/// `append` must complete before the executor moves to the next node;
/// the audit trail depends on that ordering.
pub trait ExecutionLog {
    /// Persist a new entry.
    fn append(&self, entry: LogEntry)
    -> impl Future<Output = Result<LogEntry, DriplineError>> + Send;

    /// All entries of one run, oldest-first.
    fn find_by_run(
        &self,
        run_id: RunId,
    ) -> impl Future<Output = Result<Vec<LogEntry>, DriplineError>> + Send;

    /// Recent entries for an automation, newest-first.
    fn find_by_automation(
        &self,
        automation_id: AutomationId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<LogEntry>, DriplineError>> + Send;

    /// Recent entries for a subscriber, newest-first.
    fn find_by_subscriber(
        &self,
        subscriber_id: SubscriberId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<LogEntry>, DriplineError>> + Send;
}

impl<T: ExecutionLog + Send + Sync> ExecutionLog for std::sync::Arc<T> {
    fn append(
        &self,
        entry: LogEntry,
    ) -> impl Future<Output = Result<LogEntry, DriplineError>> + Send {
        (**self).append(entry)
    }

    fn find_by_run(
        &self,
        run_id: RunId,
    ) -> impl Future<Output = Result<Vec<LogEntry>, DriplineError>> + Send {
        (**self).find_by_run(run_id)
    }

    fn find_by_automation(
        &self,
        automation_id: AutomationId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<LogEntry>, DriplineError>> + Send {
        (**self).find_by_automation(automation_id, limit)
    }

    fn find_by_subscriber(
        &self,
        subscriber_id: SubscriberId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<LogEntry>, DriplineError>> + Send {
        (**self).find_by_subscriber(subscriber_id, limit)
    }
}
