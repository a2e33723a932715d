use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info};

use crate::models::{
    normalize_ticker, FeedSnapshot, RawMention, RawSentiment, SentimentLabel, Source, WireTopic,
};

/// Symbols that look like tickers but almost never are
const FALSE_POSITIVE_TICKERS: [&str; 13] = [
    "USD", "GDP", "CEO", "IPO", "ETF", "SEC", "IRS", "FDA", "AI", "IT", "TV", "PC", "USA",
];

/// One raw sentiment observation for a ticker
#[derive(Debug, Clone, PartialEq)]
pub enum SentimentSample {
    /// A single post's compound score with its classifier label, if any
    Post {
        score: f64,
        label: Option<SentimentLabel>,
    },
    /// An average computed upstream over `weight` mentions
    Summary { mean: f64, weight: u32 },
}

/// Scores the data backend already computed for a topic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuppliedScores {
    pub adjusted_sentiment: Option<f64>,
    pub trust_score: Option<f64>,
    pub risk_score: Option<f64>,
    pub is_pump_dump: Option<bool>,
    pub recommendation: Option<String>,
}

impl SuppliedScores {
    fn or(self, other: SuppliedScores) -> SuppliedScores {
        SuppliedScores {
            adjusted_sentiment: self.adjusted_sentiment.or(other.adjusted_sentiment),
            trust_score: self.trust_score.or(other.trust_score),
            risk_score: self.risk_score.or(other.risk_score),
            is_pump_dump: self.is_pump_dump.or(other.is_pump_dump),
            recommendation: self.recommendation.or(other.recommendation),
        }
    }
}

/// Per-post facts the pump/dump heuristic looks at
#[derive(Debug, Clone, PartialEq)]
pub struct PostEvidence {
    pub score: i64,
    pub comments: i64,
    pub author: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Lowercased title and body
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MentionEvidence {
    pub posts: Vec<PostEvidence>,
    pub source_counts: BTreeMap<Source, u32>,
    pub total_mentions: u32,
}

/// Aggregated state of one ticker before scoring
#[derive(Debug, Clone, PartialEq)]
pub struct TopicSkeleton {
    pub ticker: String,
    pub mention_count: u32,
    pub unique_posts: u32,
    pub sources: BTreeSet<Source>,
    pub samples: Vec<SentimentSample>,
    pub supplied: SuppliedScores,
    pub evidence: MentionEvidence,
    pub current_price: Option<f64>,
    pub price_change: Option<f64>,
    pub price_change_percent: Option<f64>,
}

impl TopicSkeleton {
    fn empty(ticker: String) -> Self {
        Self {
            ticker,
            mention_count: 0,
            unique_posts: 0,
            sources: BTreeSet::new(),
            samples: Vec::new(),
            supplied: SuppliedScores::default(),
            evidence: MentionEvidence::default(),
            current_price: None,
            price_change: None,
            price_change_percent: None,
        }
    }

    fn absorb(&mut self, other: TopicSkeleton) {
        self.mention_count += other.mention_count;
        self.unique_posts += other.unique_posts;
        self.sources.extend(other.sources);
        self.samples.extend(other.samples);
        self.supplied = std::mem::take(&mut self.supplied).or(other.supplied);
        self.evidence.posts.extend(other.evidence.posts);
        for (source, count) in other.evidence.source_counts {
            *self.evidence.source_counts.entry(source).or_insert(0) += count;
        }
        self.evidence.total_mentions += other.evidence.total_mentions;
        self.current_price = self.current_price.or(other.current_price);
        self.price_change = self.price_change.or(other.price_change);
        self.price_change_percent = self.price_change_percent.or(other.price_change_percent);
    }
}

/// Merge raw posts and pre-aggregated topics into one skeleton per ticker.
///
/// Output keeps first-seen order so later stable sorts break ties by feed
/// order. Tickers without mentions are dropped.
pub fn aggregate(snapshot: &FeedSnapshot) -> Vec<TopicSkeleton> {
    let mut order: Vec<String> = Vec::new();
    let mut by_ticker: HashMap<String, TopicSkeleton> = HashMap::new();

    let mut merge = |skeleton: TopicSkeleton| {
        match by_ticker.get_mut(&skeleton.ticker) {
            Some(existing) => existing.absorb(skeleton),
            None => {
                order.push(skeleton.ticker.clone());
                by_ticker.insert(skeleton.ticker.clone(), skeleton);
            }
        }
    };

    for topic in &snapshot.topics {
        if let Some(skeleton) = normalize_wire_topic(topic) {
            merge(skeleton);
        }
    }

    for skeleton in aggregate_mentions(&snapshot.mentions) {
        merge(skeleton);
    }

    let skeletons: Vec<TopicSkeleton> = order
        .into_iter()
        .filter_map(|ticker| by_ticker.remove(&ticker))
        .filter(|s| s.mention_count > 0)
        .collect();

    info!(
        "📊 Aggregated {} tickers from {} topics and {} posts",
        skeletons.len(),
        snapshot.topics.len(),
        snapshot.mentions.len()
    );

    skeletons
}

/// Count every ticker occurrence across raw posts.
pub fn aggregate_mentions(mentions: &[RawMention]) -> Vec<TopicSkeleton> {
    let mut order: Vec<String> = Vec::new();
    let mut by_ticker: HashMap<String, TopicSkeleton> = HashMap::new();

    for mention in mentions {
        let tickers = extract_tickers(mention);
        if tickers.is_empty() {
            continue;
        }

        let source = Source::from_tag(&mention.source);
        let sample = sentiment_sample(mention.sentiment.as_ref());
        let evidence = PostEvidence {
            score: mention.score,
            comments: mention.comments,
            author: mention.author.clone(),
            created_at: mention.created_at,
            text: mention.full_text().to_lowercase(),
        };

        let mut seen_in_post: HashSet<&str> = HashSet::new();
        for ticker in &tickers {
            let skeleton = by_ticker.entry(ticker.clone()).or_insert_with(|| {
                order.push(ticker.clone());
                TopicSkeleton::empty(ticker.clone())
            });

            skeleton.mention_count += 1;
            skeleton.evidence.total_mentions += 1;
            if let Some(source) = source {
                skeleton.sources.insert(source);
                *skeleton.evidence.source_counts.entry(source).or_insert(0) += 1;
            }
            if let Some(sample) = &sample {
                skeleton.samples.push(sample.clone());
            }
            if seen_in_post.insert(ticker.as_str()) {
                skeleton.unique_posts += 1;
                skeleton.evidence.posts.push(evidence.clone());
            }
        }
    }

    order
        .into_iter()
        .filter_map(|ticker| by_ticker.remove(&ticker))
        .collect()
}

/// Resolve the aliased wire shape into one skeleton.
///
/// `ticker`/`word` and `count`/`mentions`/`frequency` are interchangeable;
/// `currentPrice` wins over `price`. Returns `None` for topics without a
/// ticker or without mentions.
pub fn normalize_wire_topic(topic: &WireTopic) -> Option<TopicSkeleton> {
    let ticker = topic
        .ticker
        .as_deref()
        .or(topic.word.as_deref())
        .and_then(normalize_ticker)?;

    let count = topic.count.or(topic.mentions).or(topic.frequency).unwrap_or(0);
    if count == 0 {
        debug!("Dropping {} from snapshot: no mentions", ticker);
        return None;
    }

    let sources: BTreeSet<Source> = topic
        .sources
        .iter()
        .filter_map(|s| Source::from_tag(s))
        .collect();

    let mut source_counts = BTreeMap::new();
    if sources.len() == 1 {
        if let Some(only) = sources.iter().next() {
            source_counts.insert(*only, count);
        }
    }

    let samples = topic
        .avg_sentiment
        .filter(|s| s.is_finite())
        .map(|mean| vec![SentimentSample::Summary { mean, weight: count }])
        .unwrap_or_default();

    Some(TopicSkeleton {
        ticker,
        mention_count: count,
        unique_posts: topic.unique_posts.unwrap_or(count),
        sources,
        samples,
        supplied: SuppliedScores {
            adjusted_sentiment: topic.adjusted_sentiment.filter(|s| s.is_finite()),
            trust_score: topic.trust_score,
            risk_score: topic.risk_score,
            is_pump_dump: topic.is_pump_dump,
            recommendation: topic.recommendation.clone(),
        },
        evidence: MentionEvidence {
            posts: Vec::new(),
            source_counts,
            total_mentions: count,
        },
        current_price: topic
            .current_price
            .or(topic.price)
            .filter(|p| *p > 0.0 && p.is_finite()),
        price_change: topic.price_change.filter(|c| c.is_finite()),
        price_change_percent: topic.price_change_percent,
    })
}

fn ticker_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$([A-Z]{1,5})\b").ok())
        .as_ref()
}

/// Tickers referenced by one post, one entry per occurrence.
///
/// Explicit `symbols`/`symbol` fields take precedence over `$SYMBOL`
/// cashtags in the text.
pub fn extract_tickers(mention: &RawMention) -> Vec<String> {
    let mut tickers: Vec<String> = if !mention.symbols.is_empty() {
        mention.symbols.iter().filter_map(|s| normalize_ticker(s)).collect()
    } else if let Some(symbol) = mention.symbol.as_deref().and_then(normalize_ticker) {
        vec![symbol]
    } else {
        Vec::new()
    };

    if tickers.is_empty() {
        if let Some(pattern) = ticker_pattern() {
            let text = mention.full_text().to_uppercase();
            tickers = pattern
                .captures_iter(&text)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .collect();
        }
    }

    tickers.retain(|t| !FALSE_POSITIVE_TICKERS.contains(&t.as_str()));
    tickers
}

fn sentiment_sample(raw: Option<&RawSentiment>) -> Option<SentimentSample> {
    match raw? {
        RawSentiment::Score(score) if score.is_finite() => Some(SentimentSample::Post {
            score: *score,
            label: None,
        }),
        RawSentiment::Score(_) => None,
        RawSentiment::Detailed { compound, label } => {
            let score = compound.filter(|c| c.is_finite())?;
            Some(SentimentSample::Post {
                score,
                label: label.as_deref().and_then(SentimentLabel::parse),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(source: &str, title: &str, sentiment: f64) -> RawMention {
        RawMention {
            id: Some(title.to_string()),
            source: source.to_string(),
            title: Some(title.to_string()),
            sentiment: Some(RawSentiment::Score(sentiment)),
            ..RawMention::default()
        }
    }

    #[test]
    fn test_cashtags_counted_per_occurrence() {
        let mentions = vec![
            post("reddit", "$TSLA vs $TSLA again, also $AAPL", 0.5),
            post("yahoo", "$AAPL earnings beat", 0.3),
        ];
        let skeletons = aggregate_mentions(&mentions);

        let tsla = skeletons.iter().find(|s| s.ticker == "TSLA").unwrap();
        assert_eq!(tsla.mention_count, 2);
        assert_eq!(tsla.unique_posts, 1);

        let aapl = skeletons.iter().find(|s| s.ticker == "AAPL").unwrap();
        assert_eq!(aapl.mention_count, 2);
        assert_eq!(aapl.unique_posts, 2);
        assert_eq!(
            aapl.sources,
            [Source::Reddit, Source::News].into_iter().collect()
        );
    }

    #[test]
    fn test_false_positive_symbols_skipped() {
        let mentions = vec![post("news", "$USD weakens while $CEO of $MSFT speaks", 0.0)];
        let tickers = extract_tickers(&mentions[0]);
        assert_eq!(tickers, vec!["MSFT".to_string()]);
    }

    #[test]
    fn test_explicit_symbols_override_text() {
        let mention = RawMention {
            symbols: vec!["nvda".to_string()],
            title: Some("$AMD is cheaper".to_string()),
            ..RawMention::default()
        };
        assert_eq!(extract_tickers(&mention), vec!["NVDA".to_string()]);
    }

    #[test]
    fn test_wire_aliases_resolved_in_one_place() {
        let topic = WireTopic {
            word: Some("nvda".to_string()),
            frequency: Some(7),
            price: Some(118.5),
            sources: vec!["reddit".to_string(), "mystery".to_string()],
            ..WireTopic::default()
        };
        let skeleton = normalize_wire_topic(&topic).unwrap();
        assert_eq!(skeleton.ticker, "NVDA");
        assert_eq!(skeleton.mention_count, 7);
        assert_eq!(skeleton.current_price, Some(118.5));
        assert_eq!(skeleton.sources.len(), 1);
    }

    #[test]
    fn test_backend_price_change_reaches_topic() {
        let topic = WireTopic {
            ticker: Some("AMD".to_string()),
            count: Some(4),
            current_price: Some(160.0),
            price_change: Some(-2.4),
            price_change_percent: Some(-1.5),
            ..WireTopic::default()
        };
        let skeleton = normalize_wire_topic(&topic).unwrap();
        assert_eq!(skeleton.price_change, Some(-2.4));

        let scored = crate::services::scorer::SentimentScorer::default().score(skeleton);
        assert_eq!(scored.current_price, Some(160.0));
        assert_eq!(scored.price_change, Some(-2.4));
        assert_eq!(scored.price_change_percent, Some(-1.5));
    }

    #[test]
    fn test_zero_mention_topics_dropped() {
        let snapshot = FeedSnapshot {
            topics: vec![
                WireTopic {
                    ticker: Some("GME".to_string()),
                    count: Some(0),
                    ..WireTopic::default()
                },
                WireTopic {
                    ticker: Some("AMC".to_string()),
                    count: Some(4),
                    ..WireTopic::default()
                },
            ],
            ..FeedSnapshot::default()
        };
        let skeletons = aggregate(&snapshot);
        assert_eq!(skeletons.len(), 1);
        assert_eq!(skeletons[0].ticker, "AMC");
    }

    #[test]
    fn test_wire_topics_and_posts_merge() {
        let snapshot = FeedSnapshot {
            topics: vec![WireTopic {
                ticker: Some("AAPL".to_string()),
                count: Some(10),
                avg_sentiment: Some(0.2),
                sources: vec!["news".to_string()],
                ..WireTopic::default()
            }],
            mentions: vec![post("twitter", "$AAPL ripping", 0.8)],
            ..FeedSnapshot::default()
        };
        let skeletons = aggregate(&snapshot);
        assert_eq!(skeletons.len(), 1);
        assert_eq!(skeletons[0].mention_count, 11);
        assert_eq!(skeletons[0].samples.len(), 2);
        assert!(skeletons[0].sources.contains(&Source::Twitter));
    }
}
