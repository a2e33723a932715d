use axum::extract::State;
use axum::{Json, Router};
use axum::routing::{get, post, put};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::{FeedMode, PriceRange, SortStrategy, TimeRange, TopicView};
use crate::services::trending_engine::{
    ClearOutcome, RefreshOutcome, RenderOutcome, SearchOutcome, SettingsUpdate,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_topics))
        .route("/refresh", post(refresh_topics))
        .route("/settings", put(update_settings))
        .route("/search", post(search_topics).delete(clear_search))
}

/// An engine outcome together with the view it left behind
#[derive(Debug, Serialize)]
pub struct OperationResponse<T: Serialize> {
    pub outcome: T,
    pub view: TopicView,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    pub sort: Option<SortStrategy>,
    /// Dashboard bucket: `all`, `0-5`, ..., `500+`
    pub price_range: Option<String>,
    pub time_range: Option<TimeRange>,
    pub source: Option<String>,
    pub mode: Option<FeedMode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub render: RenderOutcome,
    pub refresh: Option<RefreshOutcome>,
    pub view: TopicView,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub term: String,
}

pub async fn get_topics(State(state): State<AppState>) -> Json<TopicView> {
    info!("GET /api/topics - Current trending view");
    Json(state.engine.view())
}

pub async fn refresh_topics(
    State(state): State<AppState>,
) -> Json<OperationResponse<RefreshOutcome>> {
    info!("POST /api/topics/refresh - Manual refresh");
    let outcome = state.engine.refresh().await;
    if let RefreshOutcome::FeedFailed { message, .. } = &outcome {
        warn!("Manual refresh could not reach the feed: {}", message);
    }
    Json(OperationResponse {
        outcome,
        view: state.engine.view(),
    })
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<SettingsRequest>,
) -> Result<Json<SettingsResponse>, AppError> {
    info!("PUT /api/topics/settings - {:?}", request);

    let price_range: Option<Option<PriceRange>> = request
        .price_range
        .as_deref()
        .map(PriceRange::parse_bucket)
        .transpose()?;

    let render = state
        .engine
        .update_settings(SettingsUpdate {
            sort: request.sort,
            price_range,
        })
        .await;

    let feed_changed =
        request.time_range.is_some() || request.source.is_some() || request.mode.is_some();
    let refresh = if feed_changed {
        let mut query = state.engine.snapshot().feed_query;
        if let Some(time_range) = request.time_range {
            query.time_range = time_range;
        }
        if let Some(source) = request.source {
            query.source = source;
        }
        if let Some(mode) = request.mode {
            query.mode = mode;
        }
        Some(state.engine.set_feed_query(query).await)
    } else {
        None
    };

    Ok(Json(SettingsResponse {
        render,
        refresh,
        view: state.engine.view(),
    }))
}

pub async fn search_topics(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Json<OperationResponse<SearchOutcome>> {
    info!("POST /api/topics/search - {}", request.term);
    let outcome = state.engine.search(&request.term).await;
    Json(OperationResponse {
        outcome,
        view: state.engine.view(),
    })
}

pub async fn clear_search(
    State(state): State<AppState>,
) -> Json<OperationResponse<ClearOutcome>> {
    info!("DELETE /api/topics/search - Clearing search");
    let outcome = state.engine.clear_search().await;
    Json(OperationResponse {
        outcome,
        view: state.engine.view(),
    })
}
