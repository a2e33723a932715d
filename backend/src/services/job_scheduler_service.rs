use crate::errors::AppError;
use crate::services::failure_cache::FailureCache;
use crate::services::trending_engine::{RefreshOutcome, TrendingEngine};
use tokio_cron_scheduler::{JobScheduler, Job};
use tracing::{info, error, warn};
use chrono::Utc;
use std::sync::Arc;

/// Every ten minutes, on the minute (sec min hour day month weekday)
pub const DEFAULT_REFRESH_CRON: &str = "0 */10 * * * *";

// Context passed to job functions
#[derive(Clone)]
pub struct JobContext {
    pub engine: Arc<TrendingEngine>,
    pub failure_cache: FailureCache,
}

pub struct JobSchedulerService {
    scheduler: JobScheduler,
    context: JobContext,
}

impl JobSchedulerService {
    pub async fn new(
        engine: Arc<TrendingEngine>,
        failure_cache: FailureCache,
    ) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::External(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            context: JobContext {
                engine,
                failure_cache,
            },
        })
    }

    /// Start all scheduled jobs
    pub async fn start(&mut self) -> Result<(), AppError> {
        info!("🚀 Starting job scheduler...");

        let refresh_schedule = std::env::var("TRENDING_REFRESH_CRON")
            .unwrap_or_else(|_| DEFAULT_REFRESH_CRON.to_string());

        self.schedule_job(
            &refresh_schedule,
            "refresh_trending",
            "Periodic trending refresh",
            refresh_trending_topics,
        ).await?;

        self.schedule_job(
            "0 5 * * * *",
            "cleanup_failure_cache",
            "Every hour at :05",
            cleanup_failure_cache,
        ).await?;

        self.scheduler.start()
            .await
            .map_err(|e| AppError::External(format!("Failed to start scheduler: {}", e)))?;

        info!("✅ Job scheduler started successfully with 2 jobs");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), AppError> {
        info!("🛑 Stopping job scheduler...");
        self.scheduler.shutdown()
            .await
            .map_err(|e| AppError::External(format!("Failed to stop scheduler: {}", e)))?;
        info!("✅ Job scheduler stopped");
        Ok(())
    }

    async fn schedule_job<F, Fut>(
        &mut self,
        schedule: &str,
        job_name: &'static str,
        description: &str,
        job_fn: F,
    ) -> Result<(), AppError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<JobResult, AppError>> + Send + 'static,
    {
        let context = self.context.clone();
        let job_fn = Arc::new(job_fn);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let context = context.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                execute_job_with_tracking(job_name, context, job_fn).await;
            })
        })
        .map_err(|e| AppError::External(format!("Failed to create job {}: {}", job_name, e)))?;

        self.scheduler.add(job)
            .await
            .map_err(|e| AppError::External(format!("Failed to add job {}: {}", job_name, e)))?;

        info!("📅 Scheduled: {} - {} [cron: {}]", job_name, description, schedule);
        Ok(())
    }
}

async fn execute_job_with_tracking<F, Fut>(job_name: &str, context: JobContext, job_fn: Arc<F>)
where
    F: Fn(JobContext) -> Fut,
    Fut: std::future::Future<Output = Result<JobResult, AppError>>,
{
    info!("🏃 Starting job: {}", job_name);
    let started_at = Utc::now();

    let result = job_fn(context).await;
    let duration_ms = (Utc::now() - started_at).num_milliseconds();

    match result {
        Ok(job_result) => info!(
            "✅ Job completed: {} (processed: {}, failed: {}, duration: {}ms)",
            job_name, job_result.items_processed, job_result.items_failed, duration_ms
        ),
        Err(e) => error!("❌ Job failed: {} - {}", job_name, e),
    }
}

#[derive(Debug, PartialEq)]
pub struct JobResult {
    pub items_processed: i32,
    pub items_failed: i32,
}

pub async fn refresh_trending_topics(context: JobContext) -> Result<JobResult, AppError> {
    match context.engine.scheduled_refresh().await {
        RefreshOutcome::Rendered { .. } => Ok(JobResult {
            items_processed: context.engine.view().total_known as i32,
            items_failed: 0,
        }),
        RefreshOutcome::Suppressed { reason } => {
            info!("⏸️  Trending refresh skipped: {:?}", reason);
            Ok(JobResult { items_processed: 0, items_failed: 0 })
        }
        RefreshOutcome::AlreadyFetching => {
            warn!("Trending refresh skipped: previous fetch still running");
            Ok(JobResult { items_processed: 0, items_failed: 0 })
        }
        RefreshOutcome::FeedFailed { message, .. } => Err(AppError::External(message)),
    }
}

pub async fn cleanup_failure_cache(context: JobContext) -> Result<JobResult, AppError> {
    let before = context.failure_cache.len();
    context.failure_cache.cleanup_expired();
    let removed = before.saturating_sub(context.failure_cache.len());
    Ok(JobResult {
        items_processed: removed as i32,
        items_failed: 0,
    })
}
