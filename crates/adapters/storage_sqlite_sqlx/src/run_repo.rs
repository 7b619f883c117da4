//! `SQLite` implementation of [`RunRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use dripline_app::ports::RunRepository;
use dripline_domain::automation::NodeId;
use dripline_domain::error::DriplineError;
use dripline_domain::id::{AutomationId, EventId, RunId, SubscriberId};
use dripline_domain::run::{Run, RunContext, RunStatus};
use dripline_domain::time::Timestamp;

use crate::error::StorageError;

struct Wrapper(Run);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Run> {
        value.map(|w| w.0)
    }
}

fn parse_timestamp(raw: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.to_utc())
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let automation_id: uuid::Uuid = row.try_get("automation_id")?;
        let subscriber_id: uuid::Uuid = row.try_get("subscriber_id")?;
        let trigger_event_id: uuid::Uuid = row.try_get("trigger_event_id")?;
        let cursor: Option<String> = row.try_get("cursor")?;
        let context_json: String = row.try_get("context")?;
        let status: String = row.try_get("status")?;
        let resume_at: Option<String> = row.try_get("resume_at")?;
        let started_at: String = row.try_get("started_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        let context: RunContext = serde_json::from_str(&context_json)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let status =
            RunStatus::from_str(&status).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let resume_at = resume_at.as_deref().map(parse_timestamp).transpose()?;

        Ok(Self(Run {
            id: RunId::from_uuid(id),
            automation_id: AutomationId::from_uuid(automation_id),
            subscriber_id: SubscriberId::from_uuid(subscriber_id),
            trigger_event_id: EventId::from_uuid(trigger_event_id),
            cursor: cursor.map(NodeId::from),
            context,
            status,
            resume_at,
            started_at: parse_timestamp(&started_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO runs (id, automation_id, subscriber_id, trigger_event_id,
                      cursor, context, status, resume_at, started_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const UPDATE: &str = r"
    UPDATE runs
    SET cursor = ?, context = ?, status = ?, resume_at = ?, updated_at = ?
    WHERE id = ?
";

const SELECT_BY_ID: &str = "SELECT * FROM runs WHERE id = ?";
const SELECT_BY_TRIGGER: &str = r"
    SELECT * FROM runs
    WHERE automation_id = ? AND subscriber_id = ? AND trigger_event_id = ?
";
const SELECT_DUE: &str = r"
    SELECT * FROM runs
    WHERE status = 'suspended' AND resume_at IS NOT NULL AND resume_at <= ?
    ORDER BY resume_at ASC
    LIMIT ?
";

/// `SQLite`-backed run repository.
pub struct SqliteRunRepository {
    pool: SqlitePool,
}

impl SqliteRunRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RunRepository for SqliteRunRepository {
    async fn create(&self, run: Run) -> Result<Run, DriplineError> {
        let context_json = serde_json::to_string(&run.context).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(run.id.as_uuid())
            .bind(run.automation_id.as_uuid())
            .bind(run.subscriber_id.as_uuid())
            .bind(run.trigger_event_id.as_uuid())
            .bind(run.cursor.as_ref().map(NodeId::as_str))
            .bind(&context_json)
            .bind(run.status.as_str())
            .bind(run.resume_at.map(|ts| ts.to_rfc3339()))
            .bind(run.started_at.to_rfc3339())
            .bind(run.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(run)
    }

    async fn update(&self, run: Run) -> Result<Run, DriplineError> {
        let context_json = serde_json::to_string(&run.context).map_err(StorageError::from)?;

        sqlx::query(UPDATE)
            .bind(run.cursor.as_ref().map(NodeId::as_str))
            .bind(&context_json)
            .bind(run.status.as_str())
            .bind(run.resume_at.map(|ts| ts.to_rfc3339()))
            .bind(run.updated_at.to_rfc3339())
            .bind(run.id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(run)
    }

    async fn get_by_id(&self, id: RunId) -> Result<Option<Run>, DriplineError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn find_by_trigger(
        &self,
        automation_id: AutomationId,
        subscriber_id: SubscriberId,
        trigger_event_id: EventId,
    ) -> Result<Option<Run>, DriplineError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_TRIGGER)
            .bind(automation_id.as_uuid())
            .bind(subscriber_id.as_uuid())
            .bind(trigger_event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn find_due(&self, before: Timestamp, limit: usize) -> Result<Vec<Run>, DriplineError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_DUE)
            .bind(before.to_rfc3339())
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
    use serde_json::json;

    async fn setup() -> SqliteRunRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteRunRepository::new(db.pool().clone())
    }

    fn sample_run() -> Run {
        Run::start(
            AutomationId::new(),
            SubscriberId::new(),
            EventId::new(),
            NodeId::from("entry"),
            RunContext::from_payload(&json!({"country": "US"})),
        )
    }

    #[tokio::test]
    async fn should_roundtrip_run_through_storage() {
        let repo = setup().await;
        let run = sample_run();
        repo.create(run.clone()).await.unwrap();

        let loaded = repo.get_by_id(run.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.automation_id, run.automation_id);
        assert_eq!(loaded.cursor, run.cursor);
        assert_eq!(loaded.context, run.context);
        assert_eq!(loaded.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn should_persist_status_transitions_on_update() {
        let repo = setup().await;
        let mut run = sample_run();
        repo.create(run.clone()).await.unwrap();

        let resume_at = dripline_domain::time::now() + chrono::Duration::seconds(30);
        run.suspend(resume_at, NodeId::from("after-wait"));
        repo.update(run.clone()).await.unwrap();

        let loaded = repo.get_by_id(run.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Suspended);
        assert_eq!(loaded.cursor.unwrap().as_str(), "after-wait");
        let stored_resume = loaded.resume_at.unwrap();
        assert!((stored_resume - resume_at).num_milliseconds().abs() < 5);
    }

    #[tokio::test]
    async fn should_find_run_by_idempotency_triple() {
        let repo = setup().await;
        let run = sample_run();
        repo.create(run.clone()).await.unwrap();

        let found = repo
            .find_by_trigger(run.automation_id, run.subscriber_id, run.trigger_event_id)
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, run.id);

        let other = repo
            .find_by_trigger(run.automation_id, run.subscriber_id, EventId::new())
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn should_reject_second_run_for_same_triple() {
        let repo = setup().await;
        let run = sample_run();
        repo.create(run.clone()).await.unwrap();

        let mut duplicate = sample_run();
        duplicate.automation_id = run.automation_id;
        duplicate.subscriber_id = run.subscriber_id;
        duplicate.trigger_event_id = run.trigger_event_id;

        let result = repo.create(duplicate).await;
        assert!(matches!(result, Err(DriplineError::Storage(_))));
    }

    #[tokio::test]
    async fn should_list_due_suspended_runs_oldest_first() {
        let repo = setup().await;
        let now = dripline_domain::time::now();

        let mut late = sample_run();
        late.suspend(now - chrono::Duration::seconds(10), NodeId::from("a"));
        let mut later = sample_run();
        later.suspend(now - chrono::Duration::seconds(5), NodeId::from("b"));
        let mut future = sample_run();
        future.suspend(now + chrono::Duration::hours(1), NodeId::from("c"));
        let running = sample_run();

        for run in [late.clone(), later.clone(), future, running] {
            repo.create(run).await.unwrap();
        }

        let due = repo.find_due(now, 10).await.unwrap();
        let ids: Vec<RunId> = due.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![late.id, later.id]);

        let capped = repo.find_due(now, 1).await.unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, late.id);
    }
}
