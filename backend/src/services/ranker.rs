use std::cmp::Ordering;

use crate::models::{SortStrategy, Topic};

/// Hard cap on ranked output; not configurable
pub const RANK_CAP: usize = 50;

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Comparator for one strategy. `Ordering::Less` means `a` ranks first.
pub fn compare(strategy: SortStrategy, a: &Topic, b: &Topic) -> Ordering {
    match strategy {
        SortStrategy::Mentions => b.mention_count.cmp(&a.mention_count),
        SortStrategy::SentimentPositive => cmp_f64(b.avg_sentiment, a.avg_sentiment),
        SortStrategy::SentimentNegative => cmp_f64(a.avg_sentiment, b.avg_sentiment),
        SortStrategy::SentimentAbs => cmp_f64(b.avg_sentiment.abs(), a.avg_sentiment.abs()),
    }
}

/// Stable sort by `strategy`, truncated to [`RANK_CAP`].
pub fn rank(mut topics: Vec<Topic>, strategy: SortStrategy) -> Vec<Topic> {
    // `sort_by` is stable: ties keep their incoming order
    topics.sort_by(|a, b| compare(strategy, a, b));
    topics.truncate(RANK_CAP);
    topics
}
