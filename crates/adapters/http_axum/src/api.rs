//! REST API routes.

pub mod automations;
pub mod events;
pub mod logs;

use axum::Router;
use axum::routing::{get, post};

use dripline_app::ports::{AutomationStore, EventPublisher, ExecutionLog};

use crate::state::AppState;

/// Assemble the `/api` route tree.
pub fn routes<A, P, L>() -> Router<AppState<A, P, L>>
where
    A: AutomationStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    L: ExecutionLog + Send + Sync + 'static,
{
    Router::new()
        .route("/events", post(events::publish::<A, P, L>))
        .route("/automations", get(automations::list::<A, P, L>))
        .route("/automations/{id}", get(automations::get_by_id::<A, P, L>))
        .route("/automations/{id}/log", get(logs::by_automation::<A, P, L>))
        .route("/subscribers/{id}/log", get(logs::by_subscriber::<A, P, L>))
}
