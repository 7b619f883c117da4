//! Event ingestion endpoint.
//!
//! Producers (form handlers, tracking pixels, import jobs) hand events to
//! the engine here. The handler only publishes on the bus — whether any
//! automation cares is the trigger matcher's business, asynchronously.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use dripline_app::ports::{AutomationStore, EventPublisher, ExecutionLog};
use dripline_domain::event::{Event, EventType};
use dripline_domain::id::{EventId, SubscriberId};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `POST /api/events`.
#[derive(Debug, Deserialize)]
pub struct PublishEventRequest {
    pub event_type: EventType,
    #[serde(default)]
    pub subscriber_id: Option<SubscriberId>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Response body: the id assigned to the accepted event.
#[derive(Debug, Serialize)]
pub struct PublishEventResponse {
    pub event_id: EventId,
}

/// `POST /api/events` — accept an event and publish it on the bus.
///
/// Returns `202 Accepted`: matching and run execution happen after the
/// response, on the engine's side of the bus.
pub async fn publish<A, P, L>(
    State(state): State<AppState<A, P, L>>,
    Json(request): Json<PublishEventRequest>,
) -> Result<(StatusCode, Json<PublishEventResponse>), ApiError>
where
    A: AutomationStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    L: ExecutionLog + Send + Sync + 'static,
{
    let event = Event::new(request.event_type, request.subscriber_id, request.payload);
    let event_id = event.id;
    tracing::debug!(%event_id, event_type = %event.event_type, "event accepted");

    state.publisher.publish(event).await?;

    Ok((StatusCode::ACCEPTED, Json(PublishEventResponse { event_id })))
}
