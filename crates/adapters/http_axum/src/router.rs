//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use dripline_app::ports::{AutomationStore, EventPublisher, ExecutionLog};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Mounts the API under `/api` and includes a [`TraceLayer`] that logs each
/// HTTP request/response at the `DEBUG` level using the `tracing` ecosystem.
pub fn build<A, P, L>(state: AppState<A, P, L>) -> Router
where
    A: AutomationStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    L: ExecutionLog + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
