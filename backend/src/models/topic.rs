use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentiment values are shown clipped to this magnitude.
pub const DISPLAY_SENTIMENT_LIMIT: f64 = 5.0;

pub fn clip_for_display(sentiment: f64) -> f64 {
    if sentiment.is_nan() {
        return 0.0;
    }
    sentiment.clamp(-DISPLAY_SENTIMENT_LIMIT, DISPLAY_SENTIMENT_LIMIT)
}

/// Platform a mention was observed on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Reddit,
    News,
    Twitter,
    Youtube,
    Trends,
}

impl Source {
    /// Resolve a raw source tag from the data backend.
    ///
    /// Yahoo Finance articles are reported as news and X posts as twitter.
    /// Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "reddit" => Some(Source::Reddit),
            "news" | "yahoo" | "yahoo_finance" | "yahoo finance" => Some(Source::News),
            "twitter" | "x" => Some(Source::Twitter),
            "youtube" => Some(Source::Youtube),
            "trends" | "google_trends" | "google trends" => Some(Source::Trends),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Reddit => "reddit",
            Source::News => "news",
            Source::Twitter => "twitter",
            Source::Youtube => "youtube",
            Source::Trends => "trends",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ticker currently under consideration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub ticker: String,
    pub mention_count: u32,
    pub unique_posts: u32,
    pub sources: BTreeSet<Source>,
    pub avg_sentiment: f64,
    pub adjusted_sentiment: f64,
    /// `adjusted_sentiment` clipped to ±[`DISPLAY_SENTIMENT_LIMIT`]
    #[serde(default)]
    pub display_sentiment: f64,
    pub trust_score: u8,
    pub risk_score: u8,
    pub is_pump_dump: bool,
    pub recommendation: Option<String>,
    pub current_price: Option<f64>,
    pub price_change: Option<f64>,
    pub price_change_percent: Option<f64>,
}

impl Topic {
    pub fn new(ticker: impl Into<String>, mention_count: u32) -> Self {
        Self {
            ticker: ticker.into(),
            mention_count,
            unique_posts: 0,
            sources: BTreeSet::new(),
            avg_sentiment: 0.0,
            adjusted_sentiment: 0.0,
            display_sentiment: 0.0,
            trust_score: 100,
            risk_score: 0,
            is_pump_dump: false,
            recommendation: None,
            current_price: None,
            price_change: None,
            price_change_percent: None,
        }
    }

    /// A price counts as known only when present and nonzero.
    pub fn known_price(&self) -> Option<f64> {
        self.current_price.filter(|p| *p > 0.0 && p.is_finite())
    }

    pub fn needs_price(&self) -> bool {
        self.known_price().is_none()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn apply_quote(&mut self, quote: &PriceQuote) {
        self.current_price = Some(quote.current_price);
        self.price_change = Some(quote.change);
        self.price_change_percent = Some(quote.change_percent);
    }
}

/// Current price snapshot for one ticker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub current_price: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(default)]
    pub change_percent: f64,
}

/// Ordering applied before the top-N cut
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SortStrategy {
    #[default]
    Mentions,
    SentimentPositive,
    SentimentNegative,
    SentimentAbs,
}

impl FromStr for SortStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mentions" => Ok(SortStrategy::Mentions),
            "sentiment-positive" => Ok(SortStrategy::SentimentPositive),
            "sentiment-negative" => Ok(SortStrategy::SentimentNegative),
            "sentiment-abs" => Ok(SortStrategy::SentimentAbs),
            other => Err(format!("Unknown sort strategy: {}", other)),
        }
    }
}

/// Closed price interval; `max = None` is the unbounded top bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max: Some(max) }
    }

    pub fn at_least(min: f64) -> Self {
        Self { min, max: None }
    }

    pub fn upper(&self) -> f64 {
        self.max.unwrap_or(f64::INFINITY)
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.upper()
    }

    /// Parse a dashboard bucket such as `10-25` or `500+`.
    ///
    /// `all` and the empty string mean no filter.
    pub fn parse_bucket(bucket: &str) -> Result<Option<Self>, String> {
        let bucket = bucket.trim();
        if bucket.is_empty() || bucket.eq_ignore_ascii_case("all") {
            return Ok(None);
        }

        if let Some(min) = bucket.strip_suffix('+') {
            let min = min
                .parse::<f64>()
                .map_err(|_| format!("Invalid price bucket: {}", bucket))?;
            return Ok(Some(Self::at_least(min)));
        }

        let (min, max) = bucket
            .split_once('-')
            .ok_or_else(|| format!("Invalid price bucket: {}", bucket))?;
        let min = min
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid price bucket: {}", bucket))?;
        let max = max
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid price bucket: {}", bucket))?;

        if min < 0.0 || max < min {
            return Err(format!("Invalid price bucket: {}", bucket));
        }

        Ok(Some(Self::new(min, max)))
    }

    pub fn label(&self) -> String {
        match self.max {
            Some(max) => format!("${} - ${}", self.min, max),
            None => format!("${} - ∞", self.min),
        }
    }
}

/// Normalize a ticker reference: trim, drop a leading `$`, uppercase.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('$').trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_uppercase())
}
