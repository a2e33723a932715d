use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{
    AggregationWindow, ComparisonMetrics, ComparisonReport, DivergenceItem, LagCorrelation,
    LagProfile, SeriesPoint, TickerComparison, TickerSeries, TimeRange, WireDivergence,
};

pub const DEFAULT_DIVERGENCE_THRESHOLD: f64 = 0.2;
pub const DIVERGENCE_TOP_N: usize = 10;
/// Largest point offset tried by the lag profile, in either direction
pub const MAX_LAG: usize = 3;
/// Pairs required before a lagged correlation is reported
const MIN_LAG_POINTS: usize = 3;

/// Pearson correlation over the common prefix of `x` and `y`.
///
/// Returns 0 when either side has zero variance or fewer than two points.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let nf = n as f64;

    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();
    let sum_y2: f64 = y.iter().map(|b| b * b).sum();

    let var_x = nf * sum_x2 - sum_x * sum_x;
    let var_y = nf * sum_y2 - sum_y * sum_y;

    // Cancellation leaves tiny residues for constant series
    let flat = |var: f64, scale: f64| var <= 1e-12 * scale.abs().max(1.0);
    if flat(var_x, nf * sum_x2) || flat(var_y, nf * sum_y2) {
        return 0.0;
    }

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }

    ((nf * sum_xy - sum_x * sum_y) / denominator).clamp(-1.0, 1.0)
}

/// Magnitude of disagreement between sentiment and price moves
pub fn divergence(sentiment_change: f64, price_change: f64) -> f64 {
    (sentiment_change - price_change).abs()
}

/// `(avg + 1) * 50 ± 10` depending on mention growth, clamped to 0..=100
pub fn buy_pressure(avg_sentiment: f64, mentions_change_percent: f64) -> f64 {
    let momentum = if mentions_change_percent > 0.0 { 10.0 } else { -10.0 };
    ((avg_sentiment + 1.0) * 50.0 + momentum).clamp(0.0, 100.0)
}

/// First-to-last change in percent; 0 when the first value is 0
fn percent_change(first: f64, last: f64) -> f64 {
    if first == 0.0 {
        0.0
    } else {
        (last - first) / first * 100.0
    }
}

pub fn comparison_metrics(series: &[SeriesPoint]) -> ComparisonMetrics {
    let prices: Vec<f64> = series.iter().map(|p| p.price).collect();
    let sentiments: Vec<f64> = series.iter().map(|p| p.sentiment).collect();

    let avg_sentiment = if sentiments.is_empty() {
        0.0
    } else {
        sentiments.iter().sum::<f64>() / sentiments.len() as f64
    };

    let (price_change_percent, mentions_change_percent) = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (
            percent_change(first.price, last.price),
            percent_change(first.mentions as f64, last.mentions as f64),
        ),
        _ => (0.0, 0.0),
    };

    ComparisonMetrics {
        avg_sentiment,
        price_change_percent,
        mentions_change_percent,
        correlation: pearson(&sentiments, &prices),
        buy_pressure: buy_pressure(avg_sentiment, mentions_change_percent),
    }
}

/// Correlation of sentiment against price shifted by `-max_lag..=max_lag`
/// points. Positive lags pair earlier sentiment with later price.
pub fn lag_profile(series: &[SeriesPoint], max_lag: usize) -> LagProfile {
    let sentiments: Vec<f64> = series.iter().map(|p| p.sentiment).collect();
    let prices: Vec<f64> = series.iter().map(|p| p.price).collect();
    let n = series.len();

    let mut points = Vec::new();
    for lag in -(max_lag as i64)..=(max_lag as i64) {
        let shift = lag.unsigned_abs() as usize;
        if n < shift + MIN_LAG_POINTS {
            continue;
        }
        let correlation = if lag >= 0 {
            pearson(&sentiments[..n - shift], &prices[shift..])
        } else {
            pearson(&sentiments[shift..], &prices[..n - shift])
        };
        points.push(LagCorrelation {
            lag: lag as i32,
            correlation,
        });
    }

    let best = points
        .iter()
        .copied()
        .filter(|p| p.correlation != 0.0)
        .max_by(|a, b| {
            a.correlation
                .abs()
                .partial_cmp(&b.correlation.abs())
                .unwrap_or(Ordering::Equal)
                // On equal strength prefer the smaller shift
                .then_with(|| b.lag.abs().cmp(&a.lag.abs()))
        });

    LagProfile { points, best }
}

/// Metrics for every returned series, ranked by buy pressure
pub fn build_comparison_report(
    stocks: Vec<TickerSeries>,
    time_range: TimeRange,
    aggregation: AggregationWindow,
) -> ComparisonReport {
    let stocks: Vec<TickerComparison> = stocks
        .into_iter()
        .map(|mut s| {
            // First-to-last metrics assume oldest first
            s.series.sort_by_key(|p| p.time);
            TickerComparison {
                metrics: comparison_metrics(&s.series),
                lag_profile: lag_profile(&s.series, MAX_LAG),
                symbol: s.symbol.to_uppercase(),
                source_breakdown: s.source_breakdown,
                series: s.series,
            }
        })
        .collect();

    let mut ranked: Vec<&TickerComparison> = stocks.iter().collect();
    ranked.sort_by(|a, b| {
        b.metrics
            .buy_pressure
            .partial_cmp(&a.metrics.buy_pressure)
            .unwrap_or(Ordering::Equal)
    });
    let ranking = ranked.into_iter().map(|s| s.symbol.clone()).collect();

    ComparisonReport {
        stocks,
        ranking,
        time_range,
        aggregation,
    }
}

/// Items at or above `threshold`, most divergent first, capped at
/// [`DIVERGENCE_TOP_N`]. A repeated ticker keeps its strongest entry.
pub fn rank_divergence(items: Vec<WireDivergence>, threshold: f64) -> Vec<DivergenceItem> {
    let mut ranked: Vec<DivergenceItem> = items
        .into_iter()
        .filter(|i| !i.ticker.trim().is_empty())
        .map(|i| DivergenceItem {
            divergence: divergence(i.sentiment_change, i.price_change),
            ticker: i.ticker.trim().to_uppercase(),
            sentiment_change: i.sentiment_change,
            price_change: i.price_change,
        })
        .filter(|i| i.divergence.is_finite() && i.divergence >= threshold)
        .collect();

    ranked.sort_by(|a, b| {
        b.divergence
            .partial_cmp(&a.divergence)
            .unwrap_or(Ordering::Equal)
    });

    let mut seen = HashSet::new();
    ranked.retain(|i| seen.insert(i.ticker.clone()));
    ranked.truncate(DIVERGENCE_TOP_N);
    ranked
}
