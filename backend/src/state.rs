use std::sync::Arc;

use crate::services::comparison_service::ComparisonService;
use crate::services::trending_engine::TrendingEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TrendingEngine>,
    pub comparisons: Arc<ComparisonService>,
}
