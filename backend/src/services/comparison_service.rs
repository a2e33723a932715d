use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::AppError;
use crate::external::mention_feed::MentionFeed;
use crate::models::{
    normalize_ticker, AggregationWindow, ComparisonQuery, ComparisonReport, DivergenceItem,
    TimeRange, MAX_COMPARISON_TICKERS,
};
use crate::services::correlation::{build_comparison_report, rank_divergence};

/// Price/sentiment comparison and divergence over backend time series
pub struct ComparisonService {
    feed: Arc<dyn MentionFeed>,
}

/// Split a `AAPL,tsla, $NVDA` list into unique normalized tickers.
pub fn parse_tickers(raw: &str) -> Result<Vec<String>, AppError> {
    let mut tickers: Vec<String> = Vec::new();
    for ticker in raw.split(',').filter_map(normalize_ticker) {
        if !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }

    if tickers.is_empty() {
        return Err(AppError::Validation("At least one symbol is required".to_string()));
    }
    if tickers.len() > MAX_COMPARISON_TICKERS {
        return Err(AppError::Validation(format!(
            "At most {} symbols can be compared, got {}",
            MAX_COMPARISON_TICKERS,
            tickers.len()
        )));
    }
    Ok(tickers)
}

impl ComparisonService {
    pub fn new(feed: Arc<dyn MentionFeed>) -> Self {
        Self { feed }
    }

    pub async fn compare(
        &self,
        tickers: Vec<String>,
        time_range: TimeRange,
        aggregation: AggregationWindow,
    ) -> Result<ComparisonReport, AppError> {
        if tickers.is_empty() || tickers.len() > MAX_COMPARISON_TICKERS {
            return Err(AppError::Validation(format!(
                "Between 1 and {} symbols required",
                MAX_COMPARISON_TICKERS
            )));
        }

        let query = ComparisonQuery {
            tickers,
            time_range,
            aggregation,
        };
        let series = self.feed.fetch_comparison(&query).await?;

        for ticker in &query.tickers {
            if !series.iter().any(|s| s.symbol.eq_ignore_ascii_case(ticker)) {
                warn!("⚠️  No comparison series returned for {}", ticker);
            }
        }

        // Only the requested tickers, in request order
        let mut ordered = Vec::with_capacity(query.tickers.len());
        let mut remaining = series;
        for ticker in &query.tickers {
            if let Some(pos) = remaining
                .iter()
                .position(|s| s.symbol.eq_ignore_ascii_case(ticker))
            {
                ordered.push(remaining.swap_remove(pos));
            }
        }

        let report = build_comparison_report(ordered, time_range, aggregation);
        info!(
            "📊 Compared {} tickers over {} ({} buckets)",
            report.stocks.len(),
            time_range,
            aggregation.as_str()
        );
        Ok(report)
    }

    pub async fn divergence(
        &self,
        threshold: f64,
        time_range: TimeRange,
    ) -> Result<Vec<DivergenceItem>, AppError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AppError::Validation(format!(
                "Threshold must be a non-negative number, got {}",
                threshold
            )));
        }

        let items = self.feed.fetch_divergence(threshold, time_range).await?;
        Ok(rank_divergence(items, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tickers_normalizes_and_dedupes() {
        let tickers = parse_tickers("aapl, $TSLA,,AAPL ,nvda").unwrap();
        assert_eq!(tickers, vec!["AAPL", "TSLA", "NVDA"]);
    }

    #[test]
    fn test_parse_tickers_bounds() {
        assert!(matches!(parse_tickers(" , "), Err(AppError::Validation(_))));
        assert!(matches!(
            parse_tickers("A,B,C,D,E,F"),
            Err(AppError::Validation(_))
        ));
        assert_eq!(parse_tickers("A,B,C,D,E").unwrap().len(), 5);
    }
}
