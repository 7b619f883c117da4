//! Shared application state for axum handlers.

use std::sync::Arc;

use dripline_app::ports::{AutomationStore, EventPublisher, ExecutionLog};

/// Application state shared across all axum handlers.
///
/// Generic over the port implementations to avoid dynamic dispatch.
/// `Clone` is implemented manually so the underlying types themselves do
/// not need to be `Clone` — only the `Arc` wrappers are cloned.
pub struct AppState<A, P, L> {
    /// Read access to stored automations.
    pub automations: Arc<A>,
    /// Event bus publisher used by the ingestion endpoint.
    pub publisher: Arc<P>,
    /// Execution log for reporting queries.
    pub log: Arc<L>,
}

impl<A, P, L> Clone for AppState<A, P, L> {
    fn clone(&self) -> Self {
        Self {
            automations: Arc::clone(&self.automations),
            publisher: Arc::clone(&self.publisher),
            log: Arc::clone(&self.log),
        }
    }
}

impl<A, P, L> AppState<A, P, L>
where
    A: AutomationStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    L: ExecutionLog + Send + Sync + 'static,
{
    /// Create a new application state from pre-wrapped `Arc` ports.
    ///
    /// The same `Arc`s are usually shared with the matcher and executor,
    /// so reporting reads see exactly what the engine wrote.
    pub fn new(automations: Arc<A>, publisher: Arc<P>, log: Arc<L>) -> Self {
        Self {
            automations,
            publisher,
            log,
        }
    }
}
