//! Session statistics and milestone endpoints

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{ApiError, ApiFailure, ApiResponse};
use crate::api::broadcaster::LiveEvent;
use crate::api::state::AppState;
use crate::types::{Milestone, StatsSnapshot};

/// Body for POST /api/sessions/:id/start
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Overrides the configured default thresholds
    #[serde(default)]
    pub thresholds: Option<Vec<u64>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub milestones: Vec<Milestone>,
}

/// A milestone with its progress percentage
#[derive(Debug, Serialize, Deserialize)]
pub struct MilestoneView {
    #[serde(flatten)]
    pub milestone: Milestone,
    pub progress_percentage: f64,
}

impl From<Milestone> for MilestoneView {
    fn from(milestone: Milestone) -> Self {
        let progress_percentage = milestone.progress_percentage();
        Self {
            milestone,
            progress_percentage,
        }
    }
}

/// GET /api/sessions - Snapshots of every tracked session, ordered by id
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<StatsSnapshot>>> {
    let mut snapshots: Vec<StatsSnapshot> = state.aggregation.all_snapshots().into_values().collect();
    snapshots.sort_by(|a, b| a.session_id.cmp(&b.session_id));

    let total = snapshots.len();
    Json(ApiResponse::with_total(snapshots, state.current_sequence_id(), total))
}

/// GET /api/sessions/:id - Snapshot of one session
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<StatsSnapshot>>, ApiFailure> {
    let snapshot = state
        .aggregation
        .snapshot(&session_id)
        .ok_or_else(|| ApiError::not_found(format!("Session '{}' not found", session_id)))?;

    Ok(Json(ApiResponse::new(snapshot, state.current_sequence_id())))
}

/// POST /api/sessions/:id/start - Initialize stats and milestones
///
/// An empty body means the configured default thresholds; a body that does
/// not decode is a 400.
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<StartSessionResponse>, ApiFailure> {
    let request: StartSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid start request: {}", e)))?
    };
    let thresholds = request
        .thresholds
        .unwrap_or_else(|| state.default_thresholds.clone());

    state.aggregation.get_or_create_session(&session_id);
    state.milestones.initialize_session(&session_id, &thresholds);

    let milestones = state
        .milestones
        .session_milestones(&session_id)
        .ok_or_else(|| ApiError::internal("milestones vanished during initialization"))?;

    Ok(Json(StartSessionResponse {
        session_id,
        milestones,
    }))
}

/// POST /api/sessions/:id/end - Persist the final snapshot and stop tracking
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<StatsSnapshot>>, ApiFailure> {
    let snapshot = state
        .aggregation
        .remove_session(&session_id)
        .ok_or_else(|| ApiError::not_found(format!("Session '{}' not found", session_id)))?;
    state.milestones.remove_session(&session_id);

    if let Some(store) = &state.store {
        let store = Arc::clone(store);
        let to_save = snapshot.clone();
        let saved = tokio::task::spawn_blocking(move || store.save_session_snapshot(&to_save)).await;
        match saved {
            Ok(Ok(path)) => info!(session_id = %session_id, path = %path.display(), "saved final session snapshot"),
            Ok(Err(e)) => error!(session_id = %session_id, error = %e, "failed to save final session snapshot"),
            Err(e) => error!(session_id = %session_id, error = %e, "snapshot task failed"),
        }
    }

    state.broadcaster.broadcast(LiveEvent::SessionEnded {
        snapshot: snapshot.clone(),
    });

    Ok(Json(ApiResponse::new(snapshot, state.current_sequence_id())))
}

/// GET /api/sessions/:id/milestones - Every milestone with progress
pub async fn list_milestones(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<MilestoneView>>>, ApiFailure> {
    let milestones = state
        .milestones
        .session_milestones(&session_id)
        .ok_or_else(|| ApiError::not_found(format!("No milestones for session '{}'", session_id)))?;

    let views: Vec<MilestoneView> = milestones.into_iter().map(MilestoneView::from).collect();
    let total = views.len();
    Ok(Json(ApiResponse::with_total(views, state.current_sequence_id(), total)))
}

/// GET /api/sessions/:id/milestones/achieved - Achieved milestones only
pub async fn list_achieved_milestones(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<ApiResponse<Vec<Milestone>>> {
    let achieved = state.milestones.achieved_milestones(&session_id);
    let total = achieved.len();
    Json(ApiResponse::with_total(achieved, state.current_sequence_id(), total))
}
