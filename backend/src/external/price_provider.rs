use async_trait::async_trait;
use thiserror::Error;

use crate::models::PriceQuote;

#[derive(Debug, Error)]
pub enum PriceProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("ticker not found: {0}")]
    NotFound(String),
}

impl PriceProviderError {
    /// Not-found is final for the current pass; everything else may succeed later.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PriceProviderError::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        !self.is_not_found()
    }
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Current price and day change for one ticker.
    ///
    /// `realtime` asks the backend to bypass its quote cache.
    async fn fetch_quote(
        &self,
        ticker: &str,
        realtime: bool,
    ) -> Result<PriceQuote, PriceProviderError>;
}
