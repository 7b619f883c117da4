//! Read-only automation endpoints for reporting surfaces.

use axum::Json;
use axum::extract::{Path, State};

use dripline_app::ports::{AutomationStore, EventPublisher, ExecutionLog};
use dripline_domain::automation::Automation;
use dripline_domain::error::NotFoundError;
use dripline_domain::id::AutomationId;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/automations` — list every stored automation.
pub async fn list<A, P, L>(
    State(state): State<AppState<A, P, L>>,
) -> Result<Json<Vec<Automation>>, ApiError>
where
    A: AutomationStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    L: ExecutionLog + Send + Sync + 'static,
{
    Ok(Json(state.automations.get_all().await?))
}

/// `GET /api/automations/{id}` — fetch one automation.
pub async fn get_by_id<A, P, L>(
    State(state): State<AppState<A, P, L>>,
    Path(id): Path<uuid::Uuid>,
) -> Result<Json<Automation>, ApiError>
where
    A: AutomationStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    L: ExecutionLog + Send + Sync + 'static,
{
    let id = AutomationId::from_uuid(id);
    let automation = state.automations.get_by_id(id).await?.ok_or_else(|| {
        ApiError::from(dripline_domain::error::DriplineError::from(NotFoundError {
            entity: "Automation",
            id: id.to_string(),
        }))
    })?;
    Ok(Json(automation))
}
