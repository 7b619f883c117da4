//! `SQLite` implementation of [`ExecutionLog`].
//!
//! Plain inserts into an append-only table: no update, no delete. The
//! storage layer's write atomicity is all the coordination concurrent
//! writers need.

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use dripline_app::ports::ExecutionLog;
use dripline_domain::automation::NodeId;
use dripline_domain::error::DriplineError;
use dripline_domain::id::{AutomationId, LogEntryId, RunId, SubscriberId};
use dripline_domain::run_log::{LogEntry, StepStatus};

use crate::error::StorageError;

struct Wrapper(LogEntry);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let run_id: uuid::Uuid = row.try_get("run_id")?;
        let automation_id: uuid::Uuid = row.try_get("automation_id")?;
        let node_id: String = row.try_get("node_id")?;
        let subscriber_id: uuid::Uuid = row.try_get("subscriber_id")?;
        let status: String = row.try_get("status")?;
        let attempt: i64 = row.try_get("attempt")?;
        let input_json: String = row.try_get("input")?;
        let output_json: String = row.try_get("output")?;
        let executed_at: String = row.try_get("executed_at")?;

        let status =
            StepStatus::from_str(&status).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let input = serde_json::from_str(&input_json)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let output = serde_json::from_str(&output_json)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let executed_at = chrono::DateTime::parse_from_rfc3339(&executed_at)
            .map(|dt| dt.to_utc())
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let attempt = u32::try_from(attempt).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(LogEntry {
            id: LogEntryId::from_uuid(id),
            run_id: RunId::from_uuid(run_id),
            automation_id: AutomationId::from_uuid(automation_id),
            node_id: NodeId::from(node_id),
            subscriber_id: SubscriberId::from_uuid(subscriber_id),
            status,
            attempt,
            input,
            output,
            executed_at,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO execution_log (id, run_id, automation_id, node_id, subscriber_id,
                               status, attempt, input, output, executed_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_RUN: &str =
    "SELECT * FROM execution_log WHERE run_id = ? ORDER BY executed_at ASC, attempt ASC";
const SELECT_BY_AUTOMATION: &str =
    "SELECT * FROM execution_log WHERE automation_id = ? ORDER BY executed_at DESC LIMIT ?";
const SELECT_BY_SUBSCRIBER: &str =
    "SELECT * FROM execution_log WHERE subscriber_id = ? ORDER BY executed_at DESC LIMIT ?";

/// `SQLite`-backed execution log.
pub struct SqliteExecutionLog {
    pool: SqlitePool,
}

impl SqliteExecutionLog {
    /// Create a new log using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ExecutionLog for SqliteExecutionLog {
    async fn append(&self, entry: LogEntry) -> Result<LogEntry, DriplineError> {
        let input_json = serde_json::to_string(&entry.input).map_err(StorageError::from)?;
        let output_json = serde_json::to_string(&entry.output).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(entry.id.as_uuid())
            .bind(entry.run_id.as_uuid())
            .bind(entry.automation_id.as_uuid())
            .bind(entry.node_id.as_str())
            .bind(entry.subscriber_id.as_uuid())
            .bind(entry.status.as_str())
            .bind(i64::from(entry.attempt))
            .bind(&input_json)
            .bind(&output_json)
            .bind(entry.executed_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(entry)
    }

    async fn find_by_run(&self, run_id: RunId) -> Result<Vec<LogEntry>, DriplineError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_RUN)
            .bind(run_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_by_automation(
        &self,
        automation_id: AutomationId,
        limit: usize,
    ) -> Result<Vec<LogEntry>, DriplineError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_AUTOMATION)
            .bind(automation_id.as_uuid())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_by_subscriber(
        &self,
        subscriber_id: SubscriberId,
        limit: usize,
    ) -> Result<Vec<LogEntry>, DriplineError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_SUBSCRIBER)
            .bind(subscriber_id.as_uuid())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use dripline_domain::id::EventId;
    use dripline_domain::run::{Run, RunContext};
    use serde_json::json;

    async fn setup() -> (SqliteExecutionLog, Run) {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        let run = Run::start(
            AutomationId::new(),
            SubscriberId::new(),
            EventId::new(),
            NodeId::from("entry"),
            RunContext::default(),
        );
        (SqliteExecutionLog::new(db.pool().clone()), run)
    }

    #[tokio::test]
    async fn should_roundtrip_entry_through_storage() {
        let (log, run) = setup().await;
        let entry = LogEntry::success(&run, NodeId::from("gate"), 1, json!({"op": ">"}), json!(true));
        log.append(entry.clone()).await.unwrap();

        let loaded = log.find_by_run(run.id).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, entry.id);
        assert_eq!(loaded[0].node_id.as_str(), "gate");
        assert_eq!(loaded[0].status, StepStatus::Success);
        assert_eq!(loaded[0].input, json!({"op": ">"}));
        assert_eq!(loaded[0].output, json!(true));
    }

    #[tokio::test]
    async fn should_order_run_entries_oldest_first() {
        let (log, run) = setup().await;
        for attempt in 1..=3u32 {
            let entry = LogEntry::failure(&run, NodeId::from("send"), attempt, json!({}), "boom");
            log.append(entry).await.unwrap();
        }

        let loaded = log.find_by_run(run.id).await.unwrap();
        let attempts: Vec<u32> = loaded.iter().map(|e| e.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn should_filter_by_automation_with_limit() {
        let (log, run) = setup().await;
        let other = Run::start(
            AutomationId::new(),
            SubscriberId::new(),
            EventId::new(),
            NodeId::from("entry"),
            RunContext::default(),
        );

        for _ in 0..3 {
            log.append(LogEntry::success(&run, NodeId::from("n"), 1, json!({}), json!({})))
                .await
                .unwrap();
        }
        log.append(LogEntry::success(&other, NodeId::from("n"), 1, json!({}), json!({})))
            .await
            .unwrap();

        let entries = log.find_by_automation(run.automation_id, 2).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.automation_id == run.automation_id));

        let all = log.find_by_automation(run.automation_id, 100).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn should_filter_by_subscriber() {
        let (log, run) = setup().await;
        log.append(LogEntry::success(&run, NodeId::from("n"), 1, json!({}), json!({})))
            .await
            .unwrap();

        let entries = log.find_by_subscriber(run.subscriber_id, 10).await.unwrap();
        assert_eq!(entries.len(), 1);

        let none = log.find_by_subscriber(SubscriberId::new(), 10).await.unwrap();
        assert!(none.is_empty());
    }
}
