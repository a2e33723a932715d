use std::collections::HashSet;

use crate::models::{normalize_ticker, PriceRange, Topic};

/// Result of evaluating the price predicate over a topic set
#[derive(Debug, Clone, PartialEq)]
pub enum PriceFilterOutcome {
    Passed(Vec<Topic>),
    /// Not a single candidate has a usable price
    NoPricedTickersYet { unpriced: usize },
    /// Some candidates are priced, none inside the interval
    NoTickersInRange,
}

/// What the pipeline must do next for an active price filter
#[derive(Debug, Clone, PartialEq)]
pub enum PriceFilterStep {
    /// Enrich exactly these tickers, then evaluate again
    NeedsPrices(Vec<String>),
    Evaluated(PriceFilterOutcome),
}

/// Search terms are matched as tickers: `$tsla ` and `TSLA` are the same.
pub fn normalize_search_term(raw: &str) -> Option<String> {
    normalize_ticker(raw)
}

/// Exact, case-insensitive ticker match over the whole universe.
pub fn search_topics(universe: &[Topic], term: &str) -> Vec<Topic> {
    universe
        .iter()
        .filter(|t| t.ticker.eq_ignore_ascii_case(term))
        .cloned()
        .collect()
}

pub fn passes_price_range(topic: &Topic, range: &PriceRange) -> bool {
    topic.known_price().is_some_and(|p| range.contains(p))
}

/// Keep only topics with a known, nonzero price inside `range`.
pub fn apply_price_range(topics: &[Topic], range: &PriceRange) -> PriceFilterOutcome {
    let passed: Vec<Topic> = topics
        .iter()
        .filter(|t| passes_price_range(t, range))
        .cloned()
        .collect();

    if !passed.is_empty() {
        return PriceFilterOutcome::Passed(passed);
    }

    let unpriced = topics.iter().filter(|t| t.needs_price()).count();
    if unpriced == topics.len() && !topics.is_empty() {
        PriceFilterOutcome::NoPricedTickersYet { unpriced }
    } else {
        PriceFilterOutcome::NoTickersInRange
    }
}

/// Tickers lacking a price that this pass has not tried to price yet.
pub fn enrichment_candidates(topics: &[Topic], attempted: &HashSet<String>) -> Vec<String> {
    topics
        .iter()
        .filter(|t| t.needs_price() && !attempted.contains(&t.ticker))
        .map(|t| t.ticker.clone())
        .collect()
}

/// Decide whether an active price filter can be evaluated right away.
pub fn plan_price_filter(
    topics: &[Topic],
    range: &PriceRange,
    attempted: &HashSet<String>,
) -> PriceFilterStep {
    let missing = enrichment_candidates(topics, attempted);
    if missing.is_empty() {
        PriceFilterStep::Evaluated(apply_price_range(topics, range))
    } else {
        PriceFilterStep::NeedsPrices(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced(ticker: &str, price: Option<f64>) -> Topic {
        let mut t = Topic::new(ticker, 1);
        t.current_price = price;
        t
    }

    fn tickers(outcome: &PriceFilterOutcome) -> Vec<String> {
        match outcome {
            PriceFilterOutcome::Passed(topics) => topics.iter().map(|t| t.ticker.clone()).collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_price_range_selects_inside_interval() {
        let topics = vec![
            priced("AAPL", Some(12.0)),
            priced("TSLA", Some(5.0)),
            priced("NVDA", Some(18.0)),
        ];
        let outcome = apply_price_range(&topics, &PriceRange::new(10.0, 25.0));
        assert_eq!(tickers(&outcome), vec!["AAPL", "NVDA"]);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let topics = vec![priced("LOW", Some(10.0)), priced("HIGH", Some(25.0))];
        let outcome = apply_price_range(&topics, &PriceRange::new(10.0, 25.0));
        assert_eq!(tickers(&outcome), vec!["LOW", "HIGH"]);
    }

    #[test]
    fn test_absent_and_zero_prices_never_pass() {
        let topics = vec![priced("NONE", None), priced("ZERO", Some(0.0)), priced("OK", Some(1.0))];
        let outcome = apply_price_range(&topics, &PriceRange::new(0.0, 5.0));
        assert_eq!(tickers(&outcome), vec!["OK"]);
    }

    #[test]
    fn test_unbounded_top_bucket() {
        let topics = vec![priced("BRK", Some(600_000.0)), priced("F", Some(11.0))];
        let outcome = apply_price_range(&topics, &PriceRange::at_least(500.0));
        assert_eq!(tickers(&outcome), vec!["BRK"]);
    }

    #[test]
    fn test_empty_outcomes_are_distinguished() {
        let unpriced = vec![priced("A", None), priced("B", Some(0.0))];
        assert_eq!(
            apply_price_range(&unpriced, &PriceRange::new(10.0, 25.0)),
            PriceFilterOutcome::NoPricedTickersYet { unpriced: 2 }
        );

        let out_of_range = vec![priced("A", None), priced("B", Some(300.0))];
        assert_eq!(
            apply_price_range(&out_of_range, &PriceRange::new(10.0, 25.0)),
            PriceFilterOutcome::NoTickersInRange
        );
    }

    #[test]
    fn test_plan_skips_already_attempted_tickers() {
        let topics = vec![priced("XXXX", None), priced("AAPL", Some(12.0))];
        let range = PriceRange::new(10.0, 25.0);

        let step = plan_price_filter(&topics, &range, &HashSet::new());
        assert_eq!(step, PriceFilterStep::NeedsPrices(vec!["XXXX".to_string()]));

        let attempted: HashSet<String> = ["XXXX".to_string()].into_iter().collect();
        let step = plan_price_filter(&topics, &range, &attempted);
        assert!(matches!(step, PriceFilterStep::Evaluated(PriceFilterOutcome::Passed(_))));
    }

    #[test]
    fn test_search_is_exact_and_case_insensitive() {
        let universe = vec![priced("TSLA", None), priced("TSLL", None), priced("T", None)];
        let found = search_topics(&universe, "tsla");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ticker, "TSLA");
        assert_eq!(normalize_search_term(" $tsla"), Some("TSLA".to_string()));
        assert!(search_topics(&universe, "TS").is_empty());
    }
}
