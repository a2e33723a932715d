use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Look-back window understood by the data backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[default]
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::OneHour => "1h",
            TimeRange::SixHours => "6h",
            TimeRange::OneDay => "24h",
            TimeRange::SevenDays => "7d",
            TimeRange::ThirtyDays => "30d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(TimeRange::OneHour),
            "6h" => Ok(TimeRange::SixHours),
            "24h" => Ok(TimeRange::OneDay),
            "7d" => Ok(TimeRange::SevenDays),
            "30d" => Ok(TimeRange::ThirtyDays),
            other => Err(format!("Unknown time range: {}", other)),
        }
    }
}

/// Which backend endpoint a refresh pulls from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FeedMode {
    /// Stored posts, pre-aggregated per ticker
    #[default]
    Trending,
    /// Stored posts plus a fresh pull from the social APIs
    Realtime,
    /// Individual posts, aggregated locally
    RawFeed,
}

impl FromStr for FeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trending" => Ok(FeedMode::Trending),
            "realtime" => Ok(FeedMode::Realtime),
            "raw-feed" | "raw" => Ok(FeedMode::RawFeed),
            other => Err(format!("Unknown feed mode: {}", other)),
        }
    }
}

/// Parameters of one feed snapshot request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub mode: FeedMode,
    /// `all` or a single source tag
    pub source: String,
    pub time_range: TimeRange,
    #[serde(default)]
    pub subreddits: Vec<String>,
    pub per_source_limit: u32,
    pub sort: String,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            mode: FeedMode::Trending,
            source: "all".to_string(),
            time_range: TimeRange::OneDay,
            subreddits: Vec::new(),
            per_source_limit: 50,
            sort: "hot".to_string(),
        }
    }
}

impl FeedQuery {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mode: std::env::var("FEED_MODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.mode),
            source: std::env::var("FEED_SOURCE").unwrap_or(defaults.source),
            time_range: std::env::var("FEED_TIME_RANGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.time_range),
            subreddits: std::env::var("FEED_SUBREDDITS")
                .map(|s| {
                    s.split(',')
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            per_source_limit: std::env::var("FEED_PER_SOURCE_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.per_source_limit),
            sort: std::env::var("FEED_SORT").unwrap_or(defaults.sort),
        }
    }

    /// Query used when a searched ticker is missing from the current universe.
    pub fn search_fallback() -> Self {
        Self {
            mode: FeedMode::Trending,
            source: "all".to_string(),
            time_range: TimeRange::ThirtyDays,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "positive" | "bullish" => Some(SentimentLabel::Positive),
            "negative" | "bearish" => Some(SentimentLabel::Negative),
            "neutral" => Some(SentimentLabel::Neutral),
            _ => None,
        }
    }
}

/// Sentiment attached to one post, either a bare compound score or a
/// `{compound, label}` object
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RawSentiment {
    Score(f64),
    Detailed {
        #[serde(default)]
        compound: Option<f64>,
        #[serde(default)]
        label: Option<String>,
    },
}

/// One post/article as delivered by the raw feed
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMention {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "selftext", alias = "body")]
    pub text: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, alias = "upvotes")]
    pub score: i64,
    #[serde(default, alias = "num_comments")]
    pub comments: i64,
    #[serde(
        default,
        alias = "created_at",
        alias = "created_utc",
        deserialize_with = "lenient_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "sentiment_score")]
    pub sentiment: Option<RawSentiment>,
}

impl RawMention {
    pub fn full_text(&self) -> String {
        format!(
            "{} {}",
            self.title.as_deref().unwrap_or(""),
            self.text.as_deref().unwrap_or("")
        )
    }
}

/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS[.f]`/`T`-separated strings
/// and unix seconds. Anything else becomes `None` rather than failing the
/// whole record.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::String(s) => parse_timestamp(&s),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    }))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Pre-aggregated topic as returned by the trending endpoints.
///
/// Field names vary between endpoints; `aggregator::normalize_wire_topic`
/// is the only place these aliases are resolved.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTopic {
    pub ticker: Option<String>,
    pub word: Option<String>,
    pub count: Option<u32>,
    pub mentions: Option<u32>,
    pub frequency: Option<u32>,
    pub unique_posts: Option<u32>,
    #[serde(default)]
    pub sources: Vec<String>,
    pub source_count: Option<u32>,
    pub avg_sentiment: Option<f64>,
    pub adjusted_sentiment: Option<f64>,
    pub trust_score: Option<f64>,
    pub risk_score: Option<f64>,
    pub is_pump_dump: Option<bool>,
    pub recommendation: Option<String>,
    pub current_price: Option<f64>,
    pub price: Option<f64>,
    pub price_change: Option<f64>,
    pub price_change_percent: Option<f64>,
}

/// Everything one refresh pulled from the data backend
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub mentions: Vec<RawMention>,
    pub topics: Vec<WireTopic>,
    pub source_breakdown: BTreeMap<String, u32>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

impl FeedSnapshot {
    pub fn is_empty(&self) -> bool {
        self.mentions.is_empty() && self.topics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_mention_accepts_reddit_shape() {
        let json = r#"{
            "id": "abc",
            "source": "reddit",
            "title": "$GME to the moon",
            "selftext": "diamond hands",
            "upvotes": 3,
            "num_comments": 1,
            "created_utc": "2026-10-01 12:30:00",
            "sentiment": {"compound": 0.6, "label": "positive"}
        }"#;
        let mention: RawMention = serde_json::from_str(json).unwrap();
        assert_eq!(mention.score, 3);
        assert_eq!(mention.comments, 1);
        assert!(mention.created_at.is_some());
        assert_eq!(mention.text.as_deref(), Some("diamond hands"));
        assert!(matches!(
            mention.sentiment,
            Some(RawSentiment::Detailed { compound: Some(c), .. }) if (c - 0.6).abs() < 1e-9
        ));
    }

    #[test]
    fn test_unparseable_timestamp_is_dropped() {
        let json = r#"{"source": "news", "created_at": "yesterday", "sentiment": 0.2}"#;
        let mention: RawMention = serde_json::from_str(json).unwrap();
        assert!(mention.created_at.is_none());
        assert_eq!(mention.sentiment, Some(RawSentiment::Score(0.2)));
    }

    #[test]
    fn test_wire_topic_aliases_deserialize() {
        let json = r#"{"word": "NVDA", "mentions": 20, "avgSentiment": 0.4, "sources": ["reddit", "yahoo"]}"#;
        let topic: WireTopic = serde_json::from_str(json).unwrap();
        assert_eq!(topic.word.as_deref(), Some("NVDA"));
        assert_eq!(topic.mentions, Some(20));
        assert_eq!(topic.sources.len(), 2);
    }

    #[test]
    fn test_time_range_round_trip_names() {
        assert_eq!("7d".parse::<TimeRange>().unwrap(), TimeRange::SevenDays);
        assert_eq!(TimeRange::ThirtyDays.to_string(), "30d");
        assert!("2w".parse::<TimeRange>().is_err());
    }
}
