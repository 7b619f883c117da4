//! Execution log reporting endpoints.
//!
//! Operators see per-node success/failure history here: a failed run shows
//! up as a `failure` entry with no further entries for that subscriber.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use dripline_app::ports::{AutomationStore, EventPublisher, ExecutionLog};
use dripline_domain::id::{AutomationId, SubscriberId};
use dripline_domain::run_log::LogEntry;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 50;

/// Query parameters shared by the log endpoints.
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

/// `GET /api/automations/{id}/log` — recent entries, newest-first.
pub async fn by_automation<A, P, L>(
    State(state): State<AppState<A, P, L>>,
    Path(id): Path<uuid::Uuid>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError>
where
    A: AutomationStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    L: ExecutionLog + Send + Sync + 'static,
{
    let entries = state
        .log
        .find_by_automation(
            AutomationId::from_uuid(id),
            query.limit.unwrap_or(DEFAULT_LIMIT),
        )
        .await?;
    Ok(Json(entries))
}

/// `GET /api/subscribers/{id}/log` — recent entries, newest-first.
pub async fn by_subscriber<A, P, L>(
    State(state): State<AppState<A, P, L>>,
    Path(id): Path<uuid::Uuid>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError>
where
    A: AutomationStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    L: ExecutionLog + Send + Sync + 'static,
{
    let entries = state
        .log
        .find_by_subscriber(
            SubscriberId::from_uuid(id),
            query.limit.unwrap_or(DEFAULT_LIMIT),
        )
        .await?;
    Ok(Json(entries))
}
