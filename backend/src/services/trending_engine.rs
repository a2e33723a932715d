use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::external::mention_feed::MentionFeed;
use crate::models::{
    EmptyReason, FeedQuery, PriceRange, SortStrategy, Topic, TopicView, ViewStatus,
};
use crate::services::aggregator::aggregate;
use crate::services::filter::{
    enrichment_candidates, normalize_search_term, plan_price_filter, search_topics,
    PriceFilterOutcome, PriceFilterStep,
};
use crate::services::guard::{DropReason, Guard, GuardDecision, GuardEvent, Ticket};
use crate::services::price_enricher::PriceEnricher;
use crate::services::ranker::{compare, rank};
use crate::services::scorer::SentimentScorer;

/// Leading topics of the sorted universe considered by the price filter
pub const PRICE_FILTER_CANDIDATES: usize = 100;

/// A render of the current universe, or a continuation of a live render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderRequest {
    pub continuation: Option<Ticket>,
}

impl RenderRequest {
    pub fn fresh() -> Self {
        Self { continuation: None }
    }

    pub fn continuation(ticket: Ticket) -> Self {
        Self {
            continuation: Some(ticket),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RenderOutcome {
    Completed { ticket: Ticket, shown: usize },
    Dropped { reason: DropReason },
    /// Overtaken by a search; results were thrown away
    Discarded { ticket: Ticket },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RefreshOutcome {
    Rendered { generation: u64, render: RenderOutcome },
    /// The fetch failed; the previous universe was rendered instead
    FeedFailed { message: String, render: RenderOutcome },
    Suppressed { reason: DropReason },
    AlreadyFetching,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ClearOutcome {
    Cleared { refresh: RefreshOutcome },
    NotSearching,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SearchOutcome {
    Found { term: String, count: usize },
    FoundWithoutMentions { term: String },
    NoMatch { term: String },
    Dropped { reason: DropReason },
    /// Cleared or replaced while the lookup was outstanding
    Superseded { term: String },
    /// An empty term clears the search
    Cleared { clear: ClearOutcome },
}

/// Partial settings change; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    pub sort: Option<SortStrategy>,
    /// `Some(None)` removes the price filter
    pub price_range: Option<Option<PriceRange>>,
}

/// Everything the engine owns between operations
#[derive(Debug, Clone)]
pub struct EngineState {
    pub universe: Vec<Topic>,
    pub guard: Guard,
    pub sort: SortStrategy,
    pub price_range: Option<PriceRange>,
    pub feed_query: FeedQuery,
    /// Bumped whenever a new snapshot supersedes the universe
    pub generation: u64,
    /// Tickers already sent to the enricher during this snapshot's lifetime
    pub enrichment_attempted: HashSet<String>,
    pub fetch_in_flight: bool,
    pub source_breakdown: BTreeMap<String, u32>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub feed_message: Option<String>,
    pub feed_error: Option<String>,
    pub view: TopicView,
}

struct RenderPlan {
    status: ViewStatus,
    topics: Vec<Topic>,
    enrich: Vec<String>,
}

impl EngineState {
    pub fn new(feed_query: FeedQuery) -> Self {
        Self {
            universe: Vec::new(),
            guard: Guard::default(),
            sort: SortStrategy::default(),
            price_range: None,
            feed_query,
            generation: 0,
            enrichment_attempted: HashSet::new(),
            fetch_in_flight: false,
            source_breakdown: BTreeMap::new(),
            fetched_at: None,
            feed_message: None,
            feed_error: None,
            view: TopicView::initial(),
        }
    }

    fn install_snapshot(
        &mut self,
        topics: Vec<Topic>,
        source_breakdown: BTreeMap<String, u32>,
        fetched_at: Option<DateTime<Utc>>,
        message: Option<String>,
    ) {
        self.universe = topics;
        self.generation += 1;
        self.enrichment_attempted.clear();
        self.source_breakdown = source_breakdown;
        self.fetched_at = fetched_at;
        self.feed_message = message;
        self.feed_error = None;
    }

    fn empty_universe_reason(&self) -> EmptyReason {
        match &self.feed_error {
            Some(message) => EmptyReason::FeedUnavailable {
                message: message.clone(),
            },
            None => EmptyReason::NoDataInTimeRange {
                message: self.feed_message.clone(),
            },
        }
    }

    fn plan_render(&self) -> RenderPlan {
        if self.universe.is_empty() {
            return RenderPlan {
                status: ViewStatus::Empty(self.empty_universe_reason()),
                topics: Vec::new(),
                enrich: Vec::new(),
            };
        }

        let Some(range) = self.price_range else {
            // Only the displayed cut gets prices filled in
            let ranked = rank(self.universe.clone(), self.sort);
            let enrich = enrichment_candidates(&ranked, &self.enrichment_attempted);
            return RenderPlan {
                status: ViewStatus::Ready,
                topics: ranked,
                enrich,
            };
        };

        let mut candidates = self.universe.clone();
        candidates.sort_by(|a, b| compare(self.sort, a, b));
        candidates.truncate(PRICE_FILTER_CANDIDATES);

        match plan_price_filter(&candidates, &range, &self.enrichment_attempted) {
            PriceFilterStep::NeedsPrices(tickers) => RenderPlan {
                status: ViewStatus::FetchingPrices {
                    pending: tickers.len(),
                },
                topics: Vec::new(),
                enrich: tickers,
            },
            PriceFilterStep::Evaluated(PriceFilterOutcome::Passed(passed)) => RenderPlan {
                status: ViewStatus::Ready,
                topics: rank(passed, self.sort),
                enrich: Vec::new(),
            },
            PriceFilterStep::Evaluated(PriceFilterOutcome::NoPricedTickersYet { unpriced }) => {
                RenderPlan {
                    status: ViewStatus::Empty(EmptyReason::NoPricedTickersYet { unpriced }),
                    topics: Vec::new(),
                    enrich: Vec::new(),
                }
            }
            PriceFilterStep::Evaluated(PriceFilterOutcome::NoTickersInRange) => RenderPlan {
                status: ViewStatus::Empty(EmptyReason::NoTickersInRange { range }),
                topics: Vec::new(),
                enrich: Vec::new(),
            },
        }
    }

    fn publish(&mut self, status: ViewStatus, topics: Vec<Topic>, search: Option<String>) {
        self.view = TopicView {
            status,
            topics,
            total_known: self.universe.len(),
            sort: self.sort,
            price_range: self.price_range,
            search,
            source_breakdown: self.source_breakdown.clone(),
            fetched_at: self.fetched_at,
            generation: self.generation,
        };
    }
}

/// Owns the topic universe and runs every refresh, render and search
/// through the guard.
pub struct TrendingEngine {
    state: Mutex<EngineState>,
    feed: Arc<dyn MentionFeed>,
    enricher: PriceEnricher,
    scorer: SentimentScorer,
}

impl TrendingEngine {
    pub fn new(feed: Arc<dyn MentionFeed>, enricher: PriceEnricher, query: FeedQuery) -> Self {
        Self::with_scorer(feed, enricher, query, SentimentScorer::default())
    }

    pub fn with_scorer(
        feed: Arc<dyn MentionFeed>,
        enricher: PriceEnricher,
        query: FeedQuery,
        scorer: SentimentScorer,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState::new(query)),
            feed,
            enricher,
            scorer,
        }
    }

    /// Last published view
    pub fn view(&self) -> TopicView {
        self.state.lock().view.clone()
    }

    /// Copy of the full engine state, for diagnostics and tests
    pub fn snapshot(&self) -> EngineState {
        self.state.lock().clone()
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_with(false).await
    }

    /// Periodic refresh; suppressed while a search owns the view
    pub async fn scheduled_refresh(&self) -> RefreshOutcome {
        self.refresh_with(true).await
    }

    async fn refresh_with(&self, scheduled: bool) -> RefreshOutcome {
        let query = {
            let mut state = self.state.lock();
            match state.guard.apply(GuardEvent::RefreshRequested { scheduled }) {
                GuardDecision::Fetch => {}
                GuardDecision::Dropped(reason) => {
                    debug!("Refresh suppressed: {:?}", reason);
                    return RefreshOutcome::Suppressed { reason };
                }
                other => {
                    warn!("Unexpected guard decision for refresh: {:?}", other);
                    return RefreshOutcome::Suppressed {
                        reason: DropReason::Busy,
                    };
                }
            }
            if state.fetch_in_flight {
                return RefreshOutcome::AlreadyFetching;
            }
            state.fetch_in_flight = true;
            state.feed_query.clone()
        };

        info!(
            "🔄 Refreshing trending topics (mode={:?}, source={}, range={})",
            query.mode, query.source, query.time_range
        );

        let fetched = self.feed.fetch_snapshot(&query).await.map(|snapshot| {
            let topics = self.scorer.score_all(aggregate(&snapshot));
            (topics, snapshot)
        });

        let failure = {
            let mut state = self.state.lock();
            state.fetch_in_flight = false;
            match fetched {
                Ok((topics, snapshot)) => {
                    info!(
                        "✓ Snapshot installed: {} tickers ({} flagged)",
                        topics.len(),
                        topics.iter().filter(|t| t.is_pump_dump).count()
                    );
                    state.install_snapshot(
                        topics,
                        snapshot.source_breakdown,
                        snapshot.fetched_at,
                        snapshot.message,
                    );
                    None
                }
                Err(e) => {
                    error!("Failed to fetch trending topics: {}", e);
                    state.feed_error = Some(e.to_string());
                    Some(e.to_string())
                }
            }
        };

        let render = self.render(RenderRequest::fresh()).await;
        match failure {
            None => RefreshOutcome::Rendered {
                generation: self.state.lock().generation,
                render,
            },
            Some(message) => RefreshOutcome::FeedFailed { message, render },
        }
    }

    /// Run the filter/rank/enrich pipeline under the guard.
    pub async fn render(&self, request: RenderRequest) -> RenderOutcome {
        let decision = {
            let mut state = self.state.lock();
            let event = match request.continuation {
                Some(ticket) => GuardEvent::RenderContinued(ticket),
                None => GuardEvent::RenderRequested,
            };
            state.guard.apply(event)
        };

        match decision {
            GuardDecision::Render(ticket) | GuardDecision::Continue(ticket) => {
                self.run_render(ticket).await
            }
            GuardDecision::Dropped(reason) => {
                debug!("Render dropped: {:?}", reason);
                RenderOutcome::Dropped { reason }
            }
            other => {
                warn!("Unexpected guard decision for render: {:?}", other);
                RenderOutcome::Dropped {
                    reason: DropReason::Stale,
                }
            }
        }
    }

    async fn run_render(&self, ticket: Ticket) -> RenderOutcome {
        loop {
            let (generation, pending) = {
                let mut state = self.state.lock();
                if !state.guard.is_live(ticket) {
                    return RenderOutcome::Discarded { ticket };
                }

                let plan = state.plan_render();
                let shown = plan.topics.len();
                state.publish(plan.status, plan.topics, None);

                if plan.enrich.is_empty() {
                    state.guard.apply(GuardEvent::RenderFinished(ticket));
                    return RenderOutcome::Completed { ticket, shown };
                }

                state
                    .enrichment_attempted
                    .extend(plan.enrich.iter().cloned());
                (state.generation, plan.enrich)
            };

            let report = self.enricher.enrich(&pending).await;

            let mut state = self.state.lock();
            match state.guard.apply(GuardEvent::RenderContinued(ticket)) {
                GuardDecision::Continue(_) => {}
                _ => {
                    debug!("Discarding enrichment for ticket {}: guard moved on", ticket);
                    return RenderOutcome::Discarded { ticket };
                }
            }
            if state.generation != generation {
                debug!(
                    "Discarding enrichment for generation {} (now {})",
                    generation, state.generation
                );
                continue;
            }
            let applied = report.apply(&mut state.universe);
            debug!("Applied {} quotes for ticket {}", applied, ticket);
        }
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> RenderOutcome {
        {
            let mut state = self.state.lock();
            if let Some(sort) = update.sort {
                state.sort = sort;
            }
            if let Some(range) = update.price_range {
                state.price_range = range;
            }
        }
        self.render(RenderRequest::fresh()).await
    }

    pub async fn set_sort(&self, sort: SortStrategy) -> RenderOutcome {
        self.update_settings(SettingsUpdate {
            sort: Some(sort),
            ..SettingsUpdate::default()
        })
        .await
    }

    pub async fn set_price_range(&self, range: Option<PriceRange>) -> RenderOutcome {
        self.update_settings(SettingsUpdate {
            price_range: Some(range),
            ..SettingsUpdate::default()
        })
        .await
    }

    /// Switch mode, source or time window and fetch again
    pub async fn set_feed_query(&self, query: FeedQuery) -> RefreshOutcome {
        self.state.lock().feed_query = query;
        self.refresh().await
    }

    /// Look up one ticker across the universe, then a 30-day snapshot, then
    /// the price provider.
    pub async fn search(&self, raw_term: &str) -> SearchOutcome {
        let Some(term) = normalize_search_term(raw_term) else {
            return SearchOutcome::Cleared {
                clear: self.clear_search().await,
            };
        };

        let mut found = {
            let mut state = self.state.lock();
            match state.guard.apply(GuardEvent::SearchSubmitted(term.clone())) {
                GuardDecision::StartSearch(_) => {}
                GuardDecision::Dropped(reason) => {
                    debug!("Search for {} dropped: {:?}", term, reason);
                    return SearchOutcome::Dropped { reason };
                }
                other => {
                    warn!("Unexpected guard decision for search: {:?}", other);
                    return SearchOutcome::Dropped {
                        reason: DropReason::Stale,
                    };
                }
            }
            state.publish(
                ViewStatus::Searching { term: term.clone() },
                Vec::new(),
                Some(term.clone()),
            );
            search_topics(&state.universe, &term)
        };

        info!("🔍 Searching for {} ({} local matches)", term, found.len());

        if found.is_empty() {
            match self.feed.fetch_snapshot(&FeedQuery::search_fallback()).await {
                Ok(snapshot) => {
                    found = search_topics(&self.scorer.score_all(aggregate(&snapshot)), &term);
                }
                Err(e) => warn!("⚠️  Fallback fetch for {} failed: {}", term, e),
            }
        }

        let quote = if found.iter().all(|t| t.needs_price()) {
            self.enricher.lookup(&term).await
        } else {
            None
        };
        if let Some(quote) = &quote {
            for topic in found.iter_mut().filter(|t| t.needs_price()) {
                topic.apply_quote(quote);
            }
        }

        let mut state = self.state.lock();
        if !state.guard.owns_search(&term) {
            debug!("Search for {} superseded", term);
            return SearchOutcome::Superseded { term };
        }
        state.guard.apply(GuardEvent::SearchResolved(term.clone()));

        if !found.is_empty() {
            let count = found.len();
            state.publish(ViewStatus::Ready, found, Some(term.clone()));
            SearchOutcome::Found { term, count }
        } else if let Some(quote) = quote {
            state.publish(
                ViewStatus::Empty(EmptyReason::FoundWithoutMentions {
                    term: term.clone(),
                    quote,
                }),
                Vec::new(),
                Some(term.clone()),
            );
            SearchOutcome::FoundWithoutMentions { term }
        } else {
            state.publish(
                ViewStatus::Empty(EmptyReason::NoSearchMatch { term: term.clone() }),
                Vec::new(),
                Some(term.clone()),
            );
            SearchOutcome::NoMatch { term }
        }
    }

    /// Leave search mode and refresh exactly once
    pub async fn clear_search(&self) -> ClearOutcome {
        let decision = self.state.lock().guard.apply(GuardEvent::SearchCleared);
        match decision {
            GuardDecision::Cleared => {
                info!("Search cleared, refreshing");
                ClearOutcome::Cleared {
                    refresh: self.refresh().await,
                }
            }
            _ => ClearOutcome::NotSearching,
        }
    }
}
