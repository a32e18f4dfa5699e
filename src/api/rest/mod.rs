//! REST API module for HTTP endpoints
//!
//! - `POST /api/events` - Publish an event into the pipeline
//! - `GET /api/queue` - Queue depth and capacity
//! - `GET /api/sessions` - Snapshots of all sessions
//! - `GET /api/sessions/:id` - Snapshot of one session
//! - `POST /api/sessions/:id/start` - Initialize a session's milestones
//! - `POST /api/sessions/:id/end` - Persist and stop tracking a session
//! - `GET /api/sessions/:id/milestones` - All milestones with progress
//! - `GET /api/sessions/:id/milestones/achieved` - Achieved milestones

pub mod events;
pub mod sessions;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    /// Live stream sequence ID at the time of the response
    pub sequence_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, sequence_id: u64) -> Self {
        Self {
            data,
            sequence_id,
            total: None,
        }
    }

    pub fn with_total(data: T, sequence_id: u64, total: usize) -> Self {
        Self {
            data,
            sequence_id,
            total: Some(total),
        }
    }
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

/// Error half of handler results
pub type ApiFailure = (StatusCode, Json<ApiError>);

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> ApiFailure {
        Self::failure(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> ApiFailure {
        Self::failure(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn queue_full(message: impl Into<String>) -> ApiFailure {
        Self::failure(StatusCode::SERVICE_UNAVAILABLE, "QUEUE_FULL", message)
    }

    pub fn internal(message: impl Into<String>) -> ApiFailure {
        Self::failure(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    fn failure(status: StatusCode, code: &str, message: impl Into<String>) -> ApiFailure {
        (
            status,
            Json(Self {
                error: message.into(),
                code: code.to_string(),
            }),
        )
    }
}
