//! HTTP API: the producer side of the pipeline and the read side for
//! dashboards
//!
//! ## Features
//! - Event ingestion with backpressure (503 when the queue drops an event)
//! - Session snapshots and milestone progress
//! - Live SSE stream of achievements with sequence IDs for gap detection

pub mod broadcaster;
pub mod http;
pub mod rest;
pub mod sse;
pub mod state;

pub use broadcaster::{Broadcaster, LiveEvent, LiveUpdate};
pub use http::create_router;
pub use state::AppState;
