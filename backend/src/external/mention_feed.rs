use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    ComparisonQuery, FeedQuery, FeedSnapshot, TickerSeries, TimeRange, WireDivergence,
};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Mention and time-series data exposed by the data backend
#[async_trait]
pub trait MentionFeed: Send + Sync {
    /// One snapshot of mention data for the query's mode and window.
    async fn fetch_snapshot(&self, query: &FeedQuery) -> Result<FeedSnapshot, FeedError>;

    async fn fetch_comparison(
        &self,
        query: &ComparisonQuery,
    ) -> Result<Vec<TickerSeries>, FeedError>;

    async fn fetch_divergence(
        &self,
        threshold: f64,
        time_range: TimeRange,
    ) -> Result<Vec<WireDivergence>, FeedError>;
}
