use chrono::Duration;

use crate::models::{clip_for_display, SentimentLabel, Topic};
use crate::services::aggregator::{MentionEvidence, SentimentSample, TopicSkeleton};

/// Trust below this dampens sentiment even without an explicit flag
pub const TRUST_DAMPENING_THRESHOLD: u8 = 50;

/// Hype phrases typical of coordinated buying campaigns
const PUMP_KEYWORDS: [&str; 13] = [
    "to the moon",
    "rocket",
    "moon",
    "pump",
    "yolo",
    "hodl",
    "diamond hands",
    "apes together strong",
    "buy the dip",
    "this is the way",
    "wen moon",
    "wen lambo",
    "stocks only go up",
];

const SUSPICIOUS_PATTERNS: [&str; 9] = [
    "🚀🚀🚀",
    "📈📈📈",
    "💎💎💎",
    "buy now",
    "urgent",
    "don't miss",
    "guaranteed",
    "100% sure",
    "can't lose",
];

const BOT_AUTHOR_MARKERS: [&str; 4] = ["bot", "auto", "generated", "user_"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskSignalKind {
    EngagementConcentration,
    LowCredibility,
    CoordinatedTiming,
    PumpKeywords,
    SingleSourceDominance,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSignal {
    pub kind: RiskSignalKind,
    /// 0.0 to 1.0
    pub confidence: f64,
}

/// Output of a pump/dump heuristic
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub signals: Vec<RiskSignal>,
    /// 0 to 100
    pub risk_score: f64,
    pub is_pump_dump: bool,
}

impl RiskAssessment {
    pub fn clean() -> Self {
        Self {
            signals: Vec::new(),
            risk_score: 0.0,
            is_pump_dump: false,
        }
    }
}

/// Pluggable pump/dump detector.
///
/// Implementations only have to honour the threshold contract: a flagged
/// assessment or a trust score under [`TRUST_DAMPENING_THRESHOLD`] dampens
/// the topic's sentiment.
pub trait RiskHeuristic: Send + Sync {
    fn assess(&self, evidence: &MentionEvidence) -> RiskAssessment;
}

/// Signal-count detector: each signal contributes `confidence * 20` risk
pub struct PumpDumpHeuristic;

impl PumpDumpHeuristic {
    fn engagement_signal(evidence: &MentionEvidence) -> Option<f64> {
        let total = evidence.posts.len();
        if total == 0 {
            return None;
        }

        let suspicious = evidence
            .posts
            .iter()
            .map(|post| {
                let mut hits = 0;
                if post.score < 5 && post.comments < 3 && total > 10 {
                    hits += 1;
                }
                if count_pump_keywords(&post.text) >= 3 {
                    hits += 1;
                }
                if SUSPICIOUS_PATTERNS.iter().any(|p| post.text.contains(p)) {
                    hits += 1;
                }
                hits
            })
            .sum::<usize>();

        let ratio = suspicious as f64 / total as f64;
        (ratio > 0.3).then(|| ((ratio - 0.3) / 0.5).min(1.0))
    }

    fn credibility_signal(evidence: &MentionEvidence) -> Option<f64> {
        let total = evidence.posts.len();
        if total == 0 {
            return None;
        }

        let low = evidence
            .posts
            .iter()
            .map(|post| {
                let author = post.author.as_deref().unwrap_or("").to_lowercase();
                let bot_like = BOT_AUTHOR_MARKERS.iter().any(|m| author.contains(m));
                usize::from(bot_like) + usize::from(post.score < 2)
            })
            .sum::<usize>();

        let ratio = low as f64 / total as f64;
        (ratio > 0.5).then(|| ((ratio - 0.5) / 0.3).min(1.0))
    }

    fn timing_signal(evidence: &MentionEvidence) -> Option<f64> {
        let mut times: Vec<_> = evidence.posts.iter().filter_map(|p| p.created_at).collect();
        if times.len() < 5 {
            return None;
        }
        times.sort();

        let window = Duration::hours(1);
        let mut max_in_hour = 0;
        let mut end = 0;
        for start in 0..times.len() {
            while end < times.len() && times[end] <= times[start] + window {
                end += 1;
            }
            max_in_hour = max_in_hour.max(end - start);
        }

        (max_in_hour > 20).then(|| ((max_in_hour - 20) as f64 / 30.0).min(1.0))
    }

    fn keyword_signal(evidence: &MentionEvidence) -> Option<f64> {
        let total = evidence.posts.len();
        if total == 0 {
            return None;
        }

        let with_keywords = evidence
            .posts
            .iter()
            .filter(|p| count_pump_keywords(&p.text) >= 2)
            .count();

        let ratio = with_keywords as f64 / total as f64;
        (ratio > 0.2).then(|| ((ratio - 0.2) / 0.5).min(1.0))
    }

    fn dominance_signal(evidence: &MentionEvidence) -> Option<f64> {
        if evidence.total_mentions < 10 {
            return None;
        }
        let top = evidence.source_counts.values().copied().max()?;
        let share = top as f64 / evidence.total_mentions as f64;
        (share >= 0.9).then(|| ((share - 0.9) / 0.1).clamp(0.0, 1.0))
    }
}

impl RiskHeuristic for PumpDumpHeuristic {
    fn assess(&self, evidence: &MentionEvidence) -> RiskAssessment {
        let checks: [(RiskSignalKind, fn(&MentionEvidence) -> Option<f64>); 5] = [
            (RiskSignalKind::EngagementConcentration, Self::engagement_signal),
            (RiskSignalKind::LowCredibility, Self::credibility_signal),
            (RiskSignalKind::CoordinatedTiming, Self::timing_signal),
            (RiskSignalKind::PumpKeywords, Self::keyword_signal),
            (RiskSignalKind::SingleSourceDominance, Self::dominance_signal),
        ];

        let signals: Vec<RiskSignal> = checks
            .iter()
            .filter_map(|(kind, check)| {
                check(evidence).map(|confidence| RiskSignal {
                    kind: *kind,
                    confidence,
                })
            })
            .collect();

        let risk_score = signals
            .iter()
            .map(|s| s.confidence * 20.0)
            .sum::<f64>()
            .min(100.0);

        RiskAssessment {
            is_pump_dump: signals.len() >= 3 || risk_score >= 60.0,
            signals,
            risk_score,
        }
    }
}

fn count_pump_keywords(text: &str) -> usize {
    PUMP_KEYWORDS.iter().filter(|k| text.contains(*k)).count()
}

/// Mean sentiment, skipping exact zeros that contradict a non-neutral label.
pub fn average_sentiment(samples: &[SentimentSample]) -> f64 {
    let mut sum = 0.0;
    let mut weight = 0.0;

    for sample in samples {
        match sample {
            SentimentSample::Post { score, label } => {
                let false_neutral = *score == 0.0
                    && matches!(
                        label,
                        Some(SentimentLabel::Positive) | Some(SentimentLabel::Negative)
                    );
                if false_neutral {
                    continue;
                }
                sum += score;
                weight += 1.0;
            }
            SentimentSample::Summary { mean, weight: w } => {
                sum += mean * *w as f64;
                weight += *w as f64;
            }
        }
    }

    if weight == 0.0 {
        0.0
    } else {
        sum / weight
    }
}

/// Scale sentiment by trust when the topic is flagged or trust is low.
pub fn dampen_sentiment(avg: f64, trust_score: u8, is_pump_dump: bool) -> f64 {
    if is_pump_dump || trust_score < TRUST_DAMPENING_THRESHOLD {
        avg * (trust_score as f64 / 100.0)
    } else {
        avg
    }
}

/// A supplied adjustment may predate posts merged in later, so on a
/// dampened topic it never exceeds the magnitude of the current average.
pub fn bound_supplied_sentiment(
    supplied: f64,
    avg: f64,
    trust_score: u8,
    is_pump_dump: bool,
) -> f64 {
    if is_pump_dump || trust_score < TRUST_DAMPENING_THRESHOLD {
        supplied.clamp(-avg.abs(), avg.abs())
    } else {
        supplied
    }
}

pub fn risk_recommendation(is_pump_dump: bool, risk_score: f64) -> String {
    if !is_pump_dump {
        return "✅ LOW RISK: No significant pump and dump signals detected.".to_string();
    }
    if risk_score >= 80.0 {
        "⚠️ HIGH RISK: Strong pump and dump signals detected. Avoid or be very cautious."
            .to_string()
    } else if risk_score >= 60.0 {
        "⚠️ MODERATE RISK: Some pump and dump signals detected. Proceed with caution.".to_string()
    } else {
        "⚠️ LOW RISK: Minor pump and dump signals detected. Monitor closely.".to_string()
    }
}

fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// Turns aggregated skeletons into scored topics
pub struct SentimentScorer {
    heuristic: Box<dyn RiskHeuristic>,
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new(Box::new(PumpDumpHeuristic))
    }
}

impl SentimentScorer {
    pub fn new(heuristic: Box<dyn RiskHeuristic>) -> Self {
        Self { heuristic }
    }

    pub fn score(&self, skeleton: TopicSkeleton) -> Topic {
        let avg = average_sentiment(&skeleton.samples);
        let supplied = &skeleton.supplied;

        // Backend scores win; the heuristic fills whatever is missing
        let assessment = if supplied.trust_score.is_some() || supplied.risk_score.is_some() {
            RiskAssessment::clean()
        } else {
            self.heuristic.assess(&skeleton.evidence)
        };

        let risk = supplied
            .risk_score
            .or_else(|| supplied.trust_score.map(|t| 100.0 - t))
            .unwrap_or(assessment.risk_score);
        let risk_score = clamp_score(risk);
        let trust_score = clamp_score(supplied.trust_score.unwrap_or(100.0 - risk));
        let is_pump_dump = supplied.is_pump_dump.unwrap_or(assessment.is_pump_dump);

        let adjusted = match supplied.adjusted_sentiment {
            Some(value) => bound_supplied_sentiment(value, avg, trust_score, is_pump_dump),
            None => dampen_sentiment(avg, trust_score, is_pump_dump),
        };

        let recommendation = supplied
            .recommendation
            .clone()
            .unwrap_or_else(|| risk_recommendation(is_pump_dump, risk));

        let mut topic = Topic::new(skeleton.ticker, skeleton.mention_count);
        topic.unique_posts = skeleton.unique_posts;
        topic.sources = skeleton.sources;
        topic.avg_sentiment = avg;
        topic.adjusted_sentiment = adjusted;
        topic.display_sentiment = clip_for_display(adjusted);
        topic.trust_score = trust_score;
        topic.risk_score = risk_score;
        topic.is_pump_dump = is_pump_dump;
        topic.recommendation = Some(recommendation);
        topic.current_price = skeleton.current_price;
        topic.price_change = skeleton.price_change;
        topic.price_change_percent = skeleton.price_change_percent;
        topic
    }

    pub fn score_all(&self, skeletons: Vec<TopicSkeleton>) -> Vec<Topic> {
        skeletons.into_iter().map(|s| self.score(s)).collect()
    }
}
