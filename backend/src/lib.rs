//! Pool Finalizer Library
//!
//! Scoring, ranking, snapshotting, prize awarding and access redemption for
//! prediction pools. Exposed for the binary, for tests and for other
//! consumers that want to drive the services directly.

pub mod config;
pub mod database;
pub mod error;
pub mod jobs;
pub mod models;
pub mod repositories;
pub mod scoring;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use database::Database;
use jobs::{Job, JobRunner, JobWorker};
use models::JobRecord;
use repositories::*;
use services::{AccessRedemptionService, AuditTrailService, FinalizationService, JsonLinesAuditSink, PrizeAwarder};
use std::sync::Arc;

/// Application state containing all repositories and services
pub struct AppState {
    pub database: Database,
    pub pool_repo: Arc<dyn PoolRepository>,
    pub snapshot_store: Arc<dyn SnapshotStore>,
    pub prize_repo: Arc<dyn PrizeRepository>,
    pub access_repo: Arc<dyn AccessRepository>,
    pub job_queue: Arc<dyn JobQueue>,
    pub audit: Arc<AuditTrailService>,
    pub prize_awarder: Arc<PrizeAwarder>,
    pub finalization: Arc<FinalizationService>,
    pub access: Arc<AccessRedemptionService>,
    pub runner: Arc<JobRunner>,
    config: AppConfig,
}

impl AppState {
    /// Create a new AppState with initialized repositories and services
    pub fn new(pool: sqlx::PgPool, config: &AppConfig) -> AppResult<Self> {
        let database = Database::new(pool.clone());

        let pool_repo: Arc<dyn PoolRepository> = Arc::new(PgPoolRepository::new(pool.clone()));
        let snapshot_store: Arc<dyn SnapshotStore> = Arc::new(PgSnapshotStore::new(pool.clone()));
        let prize_repo: Arc<dyn PrizeRepository> = Arc::new(PgPrizeRepository::new(pool.clone()));
        let access_repo: Arc<dyn AccessRepository> = Arc::new(PgAccessRepository::new(database.clone()));
        let job_queue: Arc<dyn JobQueue> = Arc::new(PgJobQueue::new(pool.clone()));

        let mut audit = AuditTrailService::new(Arc::new(PgAuditLogRepository::new(pool)));
        if let Some(dir) = &config.audit_log_dir {
            audit = audit.with_mirror(Arc::new(JsonLinesAuditSink::new(dir.clone())?));
        }
        let audit = Arc::new(audit);

        let prize_awarder = Arc::new(
            PrizeAwarder::new(snapshot_store.clone(), prize_repo.clone())
                .with_overlap_policy(config.prize_overlap_policy),
        );
        let finalization = Arc::new(FinalizationService::new(
            pool_repo.clone(),
            snapshot_store.clone(),
            prize_awarder.clone(),
            audit.clone(),
        ));
        let access = Arc::new(
            AccessRedemptionService::new(access_repo.clone(), config.access.clone()).with_audit(audit.clone()),
        );
        let runner = Arc::new(JobRunner::new(
            finalization.clone(),
            prize_awarder.clone(),
            access.clone(),
            audit.clone(),
        ));

        Ok(Self {
            database,
            pool_repo,
            snapshot_store,
            prize_repo,
            access_repo,
            job_queue,
            audit,
            prize_awarder,
            finalization,
            access,
            runner,
            config: config.clone(),
        })
    }

    /// Queue a job for the worker
    pub async fn enqueue(&self, job: &Job) -> AppResult<JobRecord> {
        let payload = serde_json::to_value(job)?;
        self.job_queue
            .enqueue(job.kind(), payload, self.config.jobs.max_attempts)
            .await
    }

    /// Worker configured from `JOB_*` settings
    pub fn worker(&self) -> JobWorker {
        JobWorker::new(self.job_queue.clone(), self.runner.clone())
            .with_poll_interval(self.config.jobs.poll_interval())
            .with_batch_size(self.config.jobs.batch_size)
            .with_lease(self.config.jobs.lease())
    }
}
