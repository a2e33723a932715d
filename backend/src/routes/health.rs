use axum::extract::State;
use axum::{Json, Router};
use axum::routing::get;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::services::guard::GuardState;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/engine", get(engine_health))
}

async fn health() -> &'static str {
    info!("GET /health - Health check");
    "OK"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineHealth {
    pub guard: &'static str,
    pub generation: u64,
    pub total_known: usize,
    pub fetched_at: Option<DateTime<Utc>>,
    pub feed_error: Option<String>,
}

async fn engine_health(State(state): State<AppState>) -> Json<EngineHealth> {
    let snapshot = state.engine.snapshot();
    Json(EngineHealth {
        guard: match snapshot.guard.state {
            GuardState::Idle => "idle",
            GuardState::Rendering(_) => "rendering",
            GuardState::Searching(_) => "searching",
        },
        generation: snapshot.generation,
        total_known: snapshot.universe.len(),
        fetched_at: snapshot.fetched_at,
        feed_error: snapshot.feed_error,
    })
}
