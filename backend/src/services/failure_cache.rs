use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Thread-safe record of tickers the price provider has no quote for.
///
/// Entries suppress lookups until the not-found TTL runs out. Transient
/// failures are never recorded, so the next pass retries them.
#[derive(Clone)]
pub struct FailureCache {
    cache: Arc<DashMap<String, DateTime<Utc>>>,
    not_found_ttl: Duration,
}

impl Default for FailureCache {
    fn default() -> Self {
        Self::new(24)
    }
}

impl FailureCache {
    pub fn new(not_found_ttl_hours: i64) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            not_found_ttl: Duration::hours(not_found_ttl_hours.max(0)),
        }
    }

    /// When the ticker was found missing, if still inside the TTL
    pub fn failed_at(&self, ticker: &str) -> Option<DateTime<Utc>> {
        if let Some(entry) = self.cache.get(ticker) {
            let failed_at = *entry.value();
            if Utc::now() < failed_at + self.not_found_ttl {
                return Some(failed_at);
            }
            drop(entry); // release the read lock before removing
            self.cache.remove(ticker);
        }
        None
    }

    /// True if a lookup for `ticker` should be skipped this pass
    pub fn should_skip(&self, ticker: &str) -> bool {
        self.failed_at(ticker).is_some()
    }

    pub fn record_not_found(&self, ticker: &str) {
        if self.not_found_ttl <= Duration::zero() {
            return;
        }
        self.cache.insert(ticker.to_string(), Utc::now());
    }

    /// Forget a ticker, e.g. after a successful lookup
    pub fn clear(&self, ticker: &str) {
        self.cache.remove(ticker);
    }

    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        let ttl = self.not_found_ttl;
        self.cache.retain(|_, failed_at| now < *failed_at + ttl);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_records_and_retrieves_not_found() {
        let cache = FailureCache::new(24);

        cache.record_not_found("XXXX");

        let failed_at = cache.failed_at("XXXX");
        assert!(failed_at.is_some());
        assert!(failed_at.unwrap() <= Utc::now());
        assert!(cache.should_skip("XXXX"));
        assert!(!cache.should_skip("AAPL"));
    }

    #[test]
    fn test_cache_clears_ticker() {
        let cache = FailureCache::new(24);

        cache.record_not_found("TEST");
        cache.clear("TEST");
        assert!(cache.failed_at("TEST").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_disables_caching() {
        let cache = FailureCache::new(0);

        cache.record_not_found("XXXX");
        assert!(!cache.should_skip("XXXX"));
        cache.cleanup_expired();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_cleanup_keeps_live_entries() {
        let cache = FailureCache::new(24);

        cache.record_not_found("XXXX");
        cache.cleanup_expired();
        assert_eq!(cache.len(), 1);
    }
}
