pub mod aggregator;
pub mod comparison_service;
pub mod correlation;
pub mod failure_cache;
pub mod filter;
pub mod guard;
pub mod job_scheduler_service;
pub mod price_enricher;
pub mod ranker;
pub mod retry;
pub mod scorer;
pub mod trending_engine;
