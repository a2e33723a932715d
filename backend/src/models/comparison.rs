use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::feed::TimeRange;

/// Most tickers a single comparison may include
pub const MAX_COMPARISON_TICKERS: usize = 5;

/// One bucket of a per-ticker comparison series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub time: DateTime<Utc>,
    #[serde(default, alias = "close")]
    pub price: f64,
    /// -1.0 to +1.0
    #[serde(default)]
    pub sentiment: f64,
    #[serde(default)]
    pub mentions: u32,
}

/// Time series for one ticker as returned by the compare endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerSeries {
    pub symbol: String,
    #[serde(default)]
    pub series: Vec<SeriesPoint>,
    #[serde(default)]
    pub source_breakdown: BTreeMap<String, u32>,
}

/// Aggregation bucket width for comparison series
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AggregationWindow {
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[default]
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl AggregationWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationWindow::FifteenMinutes => "15m",
            AggregationWindow::OneHour => "1h",
            AggregationWindow::FourHours => "4h",
            AggregationWindow::OneDay => "1d",
        }
    }
}

impl std::str::FromStr for AggregationWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "15m" => Ok(AggregationWindow::FifteenMinutes),
            "1h" => Ok(AggregationWindow::OneHour),
            "4h" => Ok(AggregationWindow::FourHours),
            "1d" => Ok(AggregationWindow::OneDay),
            other => Err(format!("Unknown aggregation window: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonQuery {
    pub tickers: Vec<String>,
    pub time_range: TimeRange,
    pub aggregation: AggregationWindow,
}

/// Derived metrics for one ticker's series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonMetrics {
    pub avg_sentiment: f64,
    pub price_change_percent: f64,
    pub mentions_change_percent: f64,
    pub correlation: f64,
    pub buy_pressure: f64,
}

/// Correlation of sentiment against price shifted by `lag` points
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LagCorrelation {
    /// Positive: sentiment leads price
    pub lag: i32,
    pub correlation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LagProfile {
    pub points: Vec<LagCorrelation>,
    pub best: Option<LagCorrelation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerComparison {
    pub symbol: String,
    pub metrics: ComparisonMetrics,
    pub lag_profile: LagProfile,
    pub source_breakdown: BTreeMap<String, u32>,
    pub series: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub stocks: Vec<TickerComparison>,
    /// Tickers ordered by buy pressure, strongest first
    pub ranking: Vec<String>,
    pub time_range: TimeRange,
    pub aggregation: AggregationWindow,
}

/// Divergence candidate as delivered by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WireDivergence {
    #[serde(alias = "symbol")]
    pub ticker: String,
    #[serde(default)]
    pub sentiment_change: f64,
    #[serde(default)]
    pub price_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DivergenceItem {
    pub ticker: String,
    pub sentiment_change: f64,
    pub price_change: f64,
    pub divergence: f64,
}
