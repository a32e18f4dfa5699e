//! Server-Sent Events stream of live updates
//!
//! `GET /api/stream` pushes every [`LiveUpdate`] to the client as it is
//! broadcast. An optional `session_id` query parameter narrows the stream to
//! one session.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::broadcaster::{LiveEvent, LiveUpdate};
use super::state::AppState;

/// Query parameters for the stream
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    pub session_id: Option<String>,
}

/// Control messages interleaved with live updates
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamNotice {
    Welcome { sequence_id: u64 },
    Lagged { missed: u64 },
}

fn matches_session(update: &LiveUpdate, session_id: Option<&str>) -> bool {
    let Some(wanted) = session_id else {
        return true;
    };
    match &update.event {
        LiveEvent::MilestoneAchieved { achievement } => achievement.session_id == wanted,
        LiveEvent::SessionEnded { snapshot } => snapshot.session_id == wanted,
    }
}

/// GET /api/stream - SSE stream of milestone achievements and session ends
pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.broadcaster.subscribe();
    let sequence_id = state.current_sequence_id();
    let shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        let welcome = StreamNotice::Welcome { sequence_id };
        yield Ok::<_, Infallible>(Event::default()
            .event("welcome")
            .data(serde_json::to_string(&welcome).unwrap_or_default()));

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = rx.recv() => received,
            };
            match received {
                Ok(update) => {
                    if !matches_session(&update, params.session_id.as_deref()) {
                        continue;
                    }
                    yield Ok(Event::default()
                        .event("update")
                        .id(update.sequence_id.to_string())
                        .data(serde_json::to_string(&update).unwrap_or_default()));
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    let notice = StreamNotice::Lagged { missed };
                    yield Ok(Event::default()
                        .event("lagged")
                        .data(serde_json::to_string(&notice).unwrap_or_default()));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default().interval(Duration::from_secs(30)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Milestone, MilestoneAchievement, MilestoneType};
    use chrono::Utc;

    fn update_for(session_id: &str) -> LiveUpdate {
        LiveUpdate {
            event: LiveEvent::MilestoneAchieved {
                achievement: MilestoneAchievement {
                    milestone: Milestone::new(session_id, MilestoneType::TotalReactions, 1),
                    session_id: session_id.to_string(),
                    achieved_at: Utc::now(),
                    current_value: 1,
                },
            },
            sequence_id: 0,
            timestamp: 0,
        }
    }

    #[test]
    fn test_session_filter() {
        let update = update_for("s1");
        assert!(matches_session(&update, None));
        assert!(matches_session(&update, Some("s1")));
        assert!(!matches_session(&update, Some("s2")));
    }
}
