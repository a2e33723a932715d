use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::external::price_provider::{PriceProvider, PriceProviderError};
use crate::models::{PriceQuote, Topic};
use crate::services::failure_cache::FailureCache;
use crate::services::retry::{retry_async, RetryConfig};

/// Lookups issued together; the next batch waits for the whole batch.
/// Fixed by the quote API's rate limit.
pub const PRICE_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    pub batch_pause: Duration,
    pub retry: RetryConfig,
    pub not_found_ttl_hours: i64,
    pub realtime: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_pause: Duration::from_millis(200),
            retry: RetryConfig::default(),
            not_found_ttl_hours: 24,
            realtime: true,
        }
    }
}

impl EnrichmentConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_pause: std::env::var("PRICE_BATCH_PAUSE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.batch_pause),
            retry: RetryConfig::from_env(),
            not_found_ttl_hours: std::env::var("NOT_FOUND_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.not_found_ttl_hours),
            realtime: defaults.realtime,
        }
    }
}

/// Outcome of one enrichment pass
#[derive(Debug, Clone, Default)]
pub struct EnrichmentReport {
    pub priced: HashMap<String, PriceQuote>,
    pub not_found: Vec<String>,
    pub failed: Vec<String>,
    /// Known not-found from an earlier pass, not looked up again
    pub skipped_cached: Vec<String>,
}

impl EnrichmentReport {
    /// Copy quotes onto matching topics. Other topics are left untouched.
    pub fn apply(&self, topics: &mut [Topic]) -> usize {
        let mut applied = 0;
        for topic in topics.iter_mut() {
            if let Some(quote) = self.priced.get(&topic.ticker) {
                topic.apply_quote(quote);
                applied += 1;
            }
        }
        applied
    }
}

enum LookupOutcome {
    Priced(PriceQuote),
    NotFound,
    Failed,
}

/// Rate-limited price lookups for topics that lack them
#[derive(Clone)]
pub struct PriceEnricher {
    provider: Arc<dyn PriceProvider>,
    failures: FailureCache,
    config: EnrichmentConfig,
}

impl PriceEnricher {
    pub fn new(provider: Arc<dyn PriceProvider>, config: EnrichmentConfig) -> Self {
        Self {
            failures: FailureCache::new(config.not_found_ttl_hours),
            provider,
            config,
        }
    }

    pub fn failure_cache(&self) -> &FailureCache {
        &self.failures
    }

    /// Look up one ticker, bypassing batching. Used by search.
    pub async fn lookup(&self, ticker: &str) -> Option<PriceQuote> {
        match self.lookup_with_retry(ticker).await {
            LookupOutcome::Priced(quote) => Some(quote),
            _ => None,
        }
    }

    async fn lookup_with_retry(&self, ticker: &str) -> LookupOutcome {
        let result = retry_async(
            &self.config.retry,
            &format!("price lookup {}", ticker),
            |e: &PriceProviderError| e.is_transient(),
            || self.provider.fetch_quote(ticker, self.config.realtime),
        )
        .await;

        match result {
            Ok(quote) if quote.current_price > 0.0 => {
                self.failures.clear(ticker);
                LookupOutcome::Priced(quote)
            }
            Ok(_) => {
                debug!("Zero price for {}, treating as not found", ticker);
                self.failures.record_not_found(ticker);
                LookupOutcome::NotFound
            }
            Err(e) if e.is_not_found() => {
                debug!("No price for {}: {}", ticker, e);
                self.failures.record_not_found(ticker);
                LookupOutcome::NotFound
            }
            Err(e) => {
                warn!("⚠️  Price lookup failed for {}: {}", ticker, e);
                LookupOutcome::Failed
            }
        }
    }

    /// Fetch prices for `tickers` in sequential batches.
    ///
    /// Duplicates are collapsed. Lookups inside a batch run concurrently and
    /// the batch is awaited as a whole before the pause and the next batch.
    pub async fn enrich(&self, tickers: &[String]) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();
        let mut seen = HashSet::new();
        let mut pending = Vec::new();

        for ticker in tickers {
            if !seen.insert(ticker.as_str()) {
                continue;
            }
            if self.failures.should_skip(ticker) {
                report.skipped_cached.push(ticker.clone());
            } else {
                pending.push(ticker.clone());
            }
        }

        if pending.is_empty() {
            return report;
        }

        info!(
            "💰 Enriching {} tickers in {} batches ({} skipped as not found)",
            pending.len(),
            pending.len().div_ceil(PRICE_BATCH_SIZE),
            report.skipped_cached.len()
        );

        for (index, batch) in pending.chunks(PRICE_BATCH_SIZE).enumerate() {
            if index > 0 && !self.config.batch_pause.is_zero() {
                sleep(self.config.batch_pause).await;
            }

            let outcomes = join_all(batch.iter().map(|t| self.lookup_with_retry(t))).await;

            for (ticker, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    LookupOutcome::Priced(quote) => {
                        report.priced.insert(ticker.clone(), quote);
                    }
                    LookupOutcome::NotFound => report.not_found.push(ticker.clone()),
                    LookupOutcome::Failed => report.failed.push(ticker.clone()),
                }
            }
        }

        info!(
            "✓ Enrichment done: {} priced, {} not found, {} failed",
            report.priced.len(),
            report.not_found.len(),
            report.failed.len()
        );

        report
    }
}
