//! Event ingestion endpoints

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ApiError, ApiFailure};
use crate::api::state::AppState;
use crate::types::{Event, EventType};

/// Body for POST /api/events
#[derive(Debug, Deserialize)]
pub struct PublishEventRequest {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishEventResponse {
    pub event_id: String,
    pub queued: bool,
}

/// Response for GET /api/queue
#[derive(Debug, Serialize, Deserialize)]
pub struct QueueStatus {
    pub len: usize,
    pub capacity: usize,
    pub closed: bool,
}

/// POST /api/events - Publish an event into the pipeline
///
/// A full queue drops the event and answers 503; the caller decides
/// whether to retry. Any body that does not decode answers 400.
pub async fn publish_event(
    State(state): State<Arc<AppState>>,
    request: Result<Json<PublishEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublishEventResponse>), ApiFailure> {
    let Json(request) = request.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    if request.session_id.trim().is_empty() {
        return Err(ApiError::bad_request("session_id is required"));
    }
    if request.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("user_id is required"));
    }

    let event = Event::new(
        request.event_type,
        request.session_id,
        request.user_id,
        request.payload,
    );
    let event_id = event.id().to_string();

    if !state.queue.enqueue(event) {
        return Err(ApiError::queue_full(format!("event {} dropped", event_id)));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishEventResponse {
            event_id,
            queued: true,
        }),
    ))
}

/// GET /api/queue - Queue depth for observability
pub async fn queue_status(State(state): State<Arc<AppState>>) -> Json<QueueStatus> {
    Json(QueueStatus {
        len: state.queue.len(),
        capacity: state.queue.capacity(),
        closed: state.queue.is_closed(),
    })
}
