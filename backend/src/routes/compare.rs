use axum::extract::{Query, State};
use axum::{Json, Router};
use axum::routing::get;
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::{AggregationWindow, ComparisonReport, TimeRange};
use crate::services::comparison_service::parse_tickers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(compare_tickers))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareParams {
    /// Comma-separated, at most five
    pub symbols: String,
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub aggregation: AggregationWindow,
}

pub async fn compare_tickers(
    State(state): State<AppState>,
    Query(params): Query<CompareParams>,
) -> Result<Json<ComparisonReport>, AppError> {
    info!("GET /api/compare - {} over {}", params.symbols, params.time_range);
    let tickers = parse_tickers(&params.symbols)?;

    let report = state
        .comparisons
        .compare(tickers, params.time_range, params.aggregation)
        .await
        .map_err(|e| {
            error!("Failed to compare {}: {}", params.symbols, e);
            e
        })?;
    Ok(Json(report))
}
