#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

use pulse_backend::external::mention_feed::{FeedError, MentionFeed};
use pulse_backend::external::price_provider::{PriceProvider, PriceProviderError};
use pulse_backend::models::{
    ComparisonQuery, FeedQuery, FeedSnapshot, PriceQuote, TickerSeries, TimeRange,
    WireDivergence, WireTopic,
};
use pulse_backend::services::price_enricher::{EnrichmentConfig, PriceEnricher};
use pulse_backend::services::retry::RetryConfig;
use pulse_backend::services::trending_engine::TrendingEngine;

pub fn wire_topic(ticker: &str, count: u32, sentiment: f64) -> WireTopic {
    WireTopic {
        ticker: Some(ticker.to_string()),
        count: Some(count),
        avg_sentiment: Some(sentiment),
        sources: vec!["reddit".to_string(), "news".to_string()],
        trust_score: Some(100.0),
        ..WireTopic::default()
    }
}

pub fn snapshot(topics: Vec<WireTopic>) -> FeedSnapshot {
    FeedSnapshot {
        topics,
        ..FeedSnapshot::default()
    }
}

/// In-memory data backend
#[derive(Default)]
pub struct FakeFeed {
    pub current: Mutex<FeedSnapshot>,
    /// Served for 30-day queries, the search fallback window
    pub fallback: Mutex<Option<FeedSnapshot>>,
    pub failing: AtomicBool,
    pub snapshot_calls: AtomicUsize,
    pub queries: Mutex<Vec<FeedQuery>>,
    pub comparison: Mutex<Vec<TickerSeries>>,
    pub divergence: Mutex<Vec<WireDivergence>>,
}

impl FakeFeed {
    pub fn with_snapshot(snapshot: FeedSnapshot) -> Self {
        let feed = Self::default();
        *feed.current.lock() = snapshot;
        feed
    }

    pub fn calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MentionFeed for FakeFeed {
    async fn fetch_snapshot(&self, query: &FeedQuery) -> Result<FeedSnapshot, FeedError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(FeedError::Network("connection refused".to_string()));
        }
        if query.time_range == TimeRange::ThirtyDays {
            if let Some(fallback) = self.fallback.lock().clone() {
                return Ok(fallback);
            }
        }
        Ok(self.current.lock().clone())
    }

    async fn fetch_comparison(
        &self,
        query: &ComparisonQuery,
    ) -> Result<Vec<TickerSeries>, FeedError> {
        Ok(self
            .comparison
            .lock()
            .iter()
            .filter(|s| query.tickers.iter().any(|t| t.eq_ignore_ascii_case(&s.symbol)))
            .cloned()
            .collect())
    }

    async fn fetch_divergence(
        &self,
        _threshold: f64,
        _time_range: TimeRange,
    ) -> Result<Vec<WireDivergence>, FeedError> {
        Ok(self.divergence.lock().clone())
    }
}

/// Holds every lookup until released
pub struct Gate {
    pub entered: Notify,
    release: Semaphore,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        })
    }

    pub fn open(&self) {
        self.release.add_permits(1);
    }
}

/// Price table with call accounting; unknown tickers are not found
#[derive(Default)]
pub struct FakePrices {
    pub prices: Mutex<HashMap<String, f64>>,
    pub calls: Mutex<Vec<String>>,
    pub gate: Option<Arc<Gate>>,
    pub delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakePrices {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        let fake = Self::default();
        fake.set_prices(prices);
        fake
    }

    pub fn gated(prices: &[(&str, f64)], gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(prices)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_prices(&self, prices: &[(&str, f64)]) {
        let mut table = self.prices.lock();
        for (ticker, price) in prices {
            table.insert(ticker.to_string(), *price);
        }
    }

    pub fn calls_for(&self, ticker: &str) -> usize {
        self.calls.lock().iter().filter(|t| *t == ticker).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl PriceProvider for FakePrices {
    async fn fetch_quote(
        &self,
        ticker: &str,
        _realtime: bool,
    ) -> Result<PriceQuote, PriceProviderError> {
        self.calls.lock().push(ticker.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            if let Ok(permit) = gate.release.acquire().await {
                drop(permit);
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let price = self.prices.lock().get(ticker).copied();
        match price {
            Some(p) => Ok(PriceQuote {
                current_price: p,
                change: 0.25,
                change_percent: 1.5,
            }),
            None => Err(PriceProviderError::NotFound(ticker.to_string())),
        }
    }
}

pub fn fast_enrichment() -> EnrichmentConfig {
    EnrichmentConfig {
        batch_pause: Duration::ZERO,
        retry: RetryConfig::none(),
        ..EnrichmentConfig::default()
    }
}

pub fn engine(feed: Arc<FakeFeed>, prices: Arc<FakePrices>) -> Arc<TrendingEngine> {
    engine_with(feed, prices, fast_enrichment())
}

pub fn engine_with(
    feed: Arc<FakeFeed>,
    prices: Arc<FakePrices>,
    config: EnrichmentConfig,
) -> Arc<TrendingEngine> {
    Arc::new(TrendingEngine::new(
        feed,
        PriceEnricher::new(prices, config),
        FeedQuery::default(),
    ))
}
