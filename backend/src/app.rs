use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{compare, divergence, health, topics};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/topics", topics::router())
        .nest("/api/compare", compare::router())
        .nest("/api/divergence", divergence::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
