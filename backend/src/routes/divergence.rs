use axum::extract::{Query, State};
use axum::{Json, Router};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::{DivergenceItem, TimeRange};
use crate::services::correlation::DEFAULT_DIVERGENCE_THRESHOLD;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_divergence))
}

fn default_threshold() -> f64 {
    DEFAULT_DIVERGENCE_THRESHOLD
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergenceParams {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub time_range: TimeRange,
}

#[derive(Debug, Serialize)]
pub struct DivergenceResponse {
    pub items: Vec<DivergenceItem>,
}

pub async fn get_divergence(
    State(state): State<AppState>,
    Query(params): Query<DivergenceParams>,
) -> Result<Json<DivergenceResponse>, AppError> {
    info!(
        "GET /api/divergence - threshold {} over {}",
        params.threshold, params.time_range
    );
    let items = state
        .comparisons
        .divergence(params.threshold, params.time_range)
        .await
        .map_err(|e| {
            error!("Failed to compute divergence: {}", e);
            e
        })?;
    Ok(Json(DivergenceResponse { items }))
}
