use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::external::mention_feed::{FeedError, MentionFeed};
use crate::external::price_provider::{PriceProvider, PriceProviderError};
use crate::models::{
    parse_timestamp, ComparisonQuery, FeedMode, FeedQuery, FeedSnapshot, PriceQuote, RawMention,
    TickerSeries, TimeRange, WireDivergence, WireTopic,
};

/// HTTP client for the data backend's JSON API
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        // `Url::join` drops the last segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };

        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent("pulse-backend/0.1")
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: Url::parse(&normalized)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FeedError> {
        self.base_url
            .join(path)
            .map_err(|e| FeedError::BadResponse(format!("invalid endpoint {}: {}", path, e)))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        let url = self.endpoint(path)?;
        debug!("GET {} {:?}", url, query);

        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| FeedError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::BadResponse(format!("{} returned {}", path, status)));
        }

        resp.json::<T>()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicsResponse {
    #[serde(default)]
    topics: Vec<WireTopic>,
    message: Option<String>,
    error: Option<String>,
    #[serde(default)]
    source_breakdown: BTreeMap<String, u32>,
    fetched_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFeedResponse {
    #[serde(default)]
    posts: Vec<RawMention>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockInfoResponse {
    current_price: Option<f64>,
    change: Option<f64>,
    change_percent: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    #[serde(default)]
    stocks: Vec<TickerSeries>,
}

#[derive(Debug, Deserialize)]
struct DivergenceResponse {
    #[serde(default, alias = "divergences")]
    items: Vec<WireDivergence>,
}

#[async_trait]
impl MentionFeed for BackendClient {
    async fn fetch_snapshot(&self, query: &FeedQuery) -> Result<FeedSnapshot, FeedError> {
        match query.mode {
            FeedMode::Trending => {
                let body: TopicsResponse = self
                    .get_json(
                        "api/trending-topics",
                        &[
                            ("source", query.source.clone()),
                            ("timeRange", query.time_range.to_string()),
                        ],
                    )
                    .await?;
                topics_snapshot(body)
            }
            FeedMode::Realtime => {
                let body: TopicsResponse = self
                    .get_json(
                        "api/trending-realtime",
                        &[
                            ("source", query.source.clone()),
                            ("subreddits", query.subreddits.join(",")),
                            ("limit", query.per_source_limit.to_string()),
                            ("sort", query.sort.clone()),
                        ],
                    )
                    .await?;
                topics_snapshot(body)
            }
            FeedMode::RawFeed => {
                let body: RawFeedResponse = self
                    .get_json(
                        "api/raw-feed",
                        &[
                            ("timeRange", query.time_range.to_string()),
                            ("limit", query.per_source_limit.to_string()),
                        ],
                    )
                    .await?;
                Ok(FeedSnapshot {
                    mentions: body.posts,
                    fetched_at: Some(Utc::now()),
                    ..FeedSnapshot::default()
                })
            }
        }
    }

    async fn fetch_comparison(
        &self,
        query: &ComparisonQuery,
    ) -> Result<Vec<TickerSeries>, FeedError> {
        let body: CompareResponse = self
            .get_json(
                "api/stock/compare",
                &[
                    ("symbols", query.tickers.join(",")),
                    ("timeRange", query.time_range.to_string()),
                    ("aggregation", query.aggregation.as_str().to_string()),
                ],
            )
            .await?;
        Ok(body.stocks)
    }

    async fn fetch_divergence(
        &self,
        threshold: f64,
        time_range: TimeRange,
    ) -> Result<Vec<WireDivergence>, FeedError> {
        let body: DivergenceResponse = self
            .get_json(
                "api/divergence",
                &[
                    ("threshold", threshold.to_string()),
                    ("timeRange", time_range.to_string()),
                ],
            )
            .await?;
        Ok(body.items)
    }
}

fn topics_snapshot(body: TopicsResponse) -> Result<FeedSnapshot, FeedError> {
    // The backend reports failures as 500 + {"error": ...}, but some paths
    // answer 200 with an error field and no topics
    if let Some(error) = body.error {
        if body.topics.is_empty() {
            return Err(FeedError::BadResponse(error));
        }
        warn!("Backend returned topics alongside an error: {}", error);
    }

    Ok(FeedSnapshot {
        mentions: Vec::new(),
        topics: body.topics,
        source_breakdown: body.source_breakdown,
        fetched_at: body
            .fetched_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| Some(Utc::now())),
        message: body.message,
    })
}

#[async_trait]
impl PriceProvider for BackendClient {
    async fn fetch_quote(
        &self,
        ticker: &str,
        realtime: bool,
    ) -> Result<PriceQuote, PriceProviderError> {
        let url = self
            .base_url
            .join(&format!("api/stock/{}/info", ticker))
            .map_err(|e| PriceProviderError::BadResponse(e.to_string()))?;

        let resp = self
            .client
            .get(url)
            .query(&[("realtime", realtime.to_string())])
            .send()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => return Err(PriceProviderError::NotFound(ticker.to_string())),
            StatusCode::TOO_MANY_REQUESTS => return Err(PriceProviderError::RateLimited),
            status if !status.is_success() => {
                return Err(PriceProviderError::BadResponse(format!(
                    "stock info for {} returned {}",
                    ticker, status
                )))
            }
            _ => {}
        }

        let body: StockInfoResponse = resp
            .json()
            .await
            .map_err(|e| PriceProviderError::Parse(e.to_string()))?;

        let current_price = body
            .current_price
            .filter(|p| *p > 0.0)
            .ok_or_else(|| {
                PriceProviderError::BadResponse(format!("no current price for {}", ticker))
            })?;

        Ok(PriceQuote {
            current_price,
            change: body.change.unwrap_or(0.0),
            change_percent: body.change_percent.unwrap_or(0.0),
        })
    }
}
