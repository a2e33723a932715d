use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use pulse_backend::app;
use pulse_backend::config::AppConfig;
use pulse_backend::external::backend_client::BackendClient;
use pulse_backend::logging::{init_logging, LoggingConfig};
use pulse_backend::models::FeedQuery;
use pulse_backend::services::comparison_service::ComparisonService;
use pulse_backend::services::job_scheduler_service::JobSchedulerService;
use pulse_backend::services::price_enricher::{EnrichmentConfig, PriceEnricher, PRICE_BATCH_SIZE};
use pulse_backend::services::trending_engine::TrendingEngine;
use pulse_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let config = AppConfig::from_env();
    let client = Arc::new(
        BackendClient::new(&config.data_backend_url)
            .with_context(|| format!("Invalid DATA_BACKEND_URL: {}", config.data_backend_url))?,
    );
    info!("📊 Using data backend at {}", config.data_backend_url);

    let enrichment = EnrichmentConfig::from_env();
    info!(
        "💰 Price enrichment: batches of {}, {:?} pause, {} retries",
        PRICE_BATCH_SIZE, enrichment.batch_pause, enrichment.retry.max_retries
    );
    let enricher = PriceEnricher::new(client.clone(), enrichment);
    let failure_cache = enricher.failure_cache().clone();

    let engine = Arc::new(TrendingEngine::new(
        client.clone(),
        enricher,
        FeedQuery::from_env(),
    ));

    let mut scheduler = if config.scheduler_enabled {
        let mut scheduler = JobSchedulerService::new(engine.clone(), failure_cache).await?;
        scheduler.start().await?;
        Some(scheduler)
    } else {
        warn!("⚠️  Scheduler disabled, trending topics refresh on demand only");
        None
    };

    // First snapshot in the background so the server comes up immediately
    let initial = engine.clone();
    tokio::spawn(async move {
        let outcome = initial.refresh().await;
        info!("Initial refresh: {:?}", outcome);
    });

    let state = AppState {
        engine,
        comparisons: Arc::new(ComparisonService::new(client)),
    };
    let app = app::create_app(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🚀 Pulse backend running at http://{}/", config.bind_addr);

    let served = axum::serve(listener, app).await;

    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.stop().await {
            error!("Failed to stop scheduler: {}", e);
        }
    }

    served.context("Server error")
}
