use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::topic::{PriceQuote, PriceRange, SortStrategy, Topic};

/// Why a view holds no topics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum EmptyReason {
    /// The feed answered but had nothing for the selected window
    NoDataInTimeRange { message: Option<String> },
    /// Price filter active, candidates exist, none priced yet
    NoPricedTickersYet { unpriced: usize },
    /// Priced tickers exist but none fall in the interval
    NoTickersInRange { range: PriceRange },
    NoSearchMatch { term: String },
    /// The ticker trades but nobody is talking about it
    FoundWithoutMentions { term: String, quote: PriceQuote },
    FeedUnavailable { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ViewStatus {
    Ready,
    /// Transitional state while the price filter waits on enrichment
    FetchingPrices { pending: usize },
    Searching { term: String },
    Empty(EmptyReason),
}

/// What the renderer displays for the trending panel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicView {
    pub status: ViewStatus,
    pub topics: Vec<Topic>,
    /// Size of the universe the view was drawn from
    pub total_known: usize,
    pub sort: SortStrategy,
    pub price_range: Option<PriceRange>,
    pub search: Option<String>,
    pub source_breakdown: BTreeMap<String, u32>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub generation: u64,
}

impl TopicView {
    pub fn initial() -> Self {
        Self {
            status: ViewStatus::Empty(EmptyReason::NoDataInTimeRange { message: None }),
            topics: Vec::new(),
            total_known: 0,
            sort: SortStrategy::default(),
            price_range: None,
            search: None,
            source_breakdown: BTreeMap::new(),
            fetched_at: None,
            generation: 0,
        }
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.topics.iter().map(|t| t.ticker.as_str()).collect()
    }
}
