//! `SQLite` implementation of [`AutomationStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use dripline_app::ports::AutomationStore;
use dripline_domain::automation::{Automation, Node, Trigger};
use dripline_domain::error::DriplineError;
use dripline_domain::event::EventType;
use dripline_domain::id::AutomationId;

use crate::error::StorageError;

struct Wrapper(Automation);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Automation> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let enabled: bool = row.try_get("enabled")?;
        let trigger_json: String = row.try_get("trigger_data")?;
        let nodes_json: String = row.try_get("nodes")?;

        let trigger: Trigger = serde_json::from_str(&trigger_json)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let nodes: Vec<Node> =
            serde_json::from_str(&nodes_json).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Automation {
            id: AutomationId::from_uuid(id),
            name,
            enabled,
            trigger,
            nodes,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO automations (id, name, enabled, event_type, trigger_data, nodes)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE SET
        name = excluded.name,
        enabled = excluded.enabled,
        event_type = excluded.event_type,
        trigger_data = excluded.trigger_data,
        nodes = excluded.nodes
";

const SELECT_BY_ID: &str = "SELECT * FROM automations WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM automations ORDER BY name";
const SELECT_ENABLED_BY_EVENT: &str =
    "SELECT * FROM automations WHERE enabled = 1 AND event_type = ? ORDER BY name";
const DELETE: &str = "DELETE FROM automations WHERE id = ?";

/// `SQLite`-backed automation store.
///
/// The engine only uses the read side ([`AutomationStore`]); `save` and
/// `delete` exist for the administrative surface that owns the editor, and
/// for seeding tests and demos.
pub struct SqliteAutomationStore {
    pool: SqlitePool,
}

impl SqliteAutomationStore {
    /// Create a new store backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update an automation after validating its graph.
    ///
    /// The trigger's event type is denormalized into its own column so the
    /// matcher's lookup stays a single indexed query.
    ///
    /// # Errors
    ///
    /// Returns [`DriplineError::Validation`] when the graph is invalid, or
    /// a storage error from the pool.
    pub async fn save(&self, automation: &Automation) -> Result<(), DriplineError> {
        automation.validate()?;

        let trigger_json =
            serde_json::to_string(&automation.trigger).map_err(StorageError::from)?;
        let nodes_json = serde_json::to_string(&automation.nodes).map_err(StorageError::from)?;

        sqlx::query(UPSERT)
            .bind(automation.id.as_uuid())
            .bind(&automation.name)
            .bind(automation.enabled)
            .bind(automation.trigger.event_type.as_str())
            .bind(&trigger_json)
            .bind(&nodes_json)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    /// Delete an automation; returns whether a row existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the pool.
    pub async fn delete(&self, id: AutomationId) -> Result<bool, DriplineError> {
        let result = sqlx::query(DELETE)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }
}

impl AutomationStore for SqliteAutomationStore {
    async fn get_by_id(&self, id: AutomationId) -> Result<Option<Automation>, DriplineError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<Automation>, DriplineError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn find_enabled_by_event(
        &self,
        event_type: EventType,
    ) -> Result<Vec<Automation>, DriplineError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ENABLED_BY_EVENT)
            .bind(event_type.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
