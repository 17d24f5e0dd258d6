use super::{Job, JobRunner};
use crate::error::AppResult;
use crate::models::JobRecord;
use crate::repositories::JobQueue;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, warn};

/// Background task that drains the job queue
pub struct JobWorker {
    queue: Arc<dyn JobQueue>,
    runner: Arc<JobRunner>,
    poll_interval: Duration,
    batch_size: i64,
    lease: Duration,
}

impl JobWorker {
    /// Create a new worker
    ///
    /// # Arguments
    /// * `queue` - Job queue to claim work from
    /// * `runner` - Dispatcher that executes claimed jobs
    pub fn new(queue: Arc<dyn JobQueue>, runner: Arc<JobRunner>) -> Self {
        Self {
            queue,
            runner,
            poll_interval: Duration::from_secs(1),
            batch_size: 10,
            lease: Duration::from_secs(300),
        }
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how many jobs are claimed per tick
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set how long a RUNNING job may go untouched before it is reclaimed
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Start the worker loop
    pub async fn start(self) {
        let mut interval = time::interval(self.poll_interval);
        info!("Job worker started, polling every {:?}", self.poll_interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.run_once().await {
                error!("Error polling job queue: {}", e);
            }
        }
    }

    /// Claim one batch and run it. Returns the number of jobs claimed.
    ///
    /// A job whose outcome cannot be written stays RUNNING and is picked up
    /// again once its lease expires; the rest of the batch still runs.
    pub async fn run_once(&self) -> AppResult<usize> {
        let jobs = self.queue.claim_batch(self.batch_size, self.lease).await?;
        if jobs.is_empty() {
            return Ok(0);
        }

        debug!("Claimed {} jobs", jobs.len());
        let claimed = jobs.len();
        for job in jobs {
            let job_id = job.id;
            if let Err(e) = self.process(job).await {
                error!(job_id = %job_id, error = %e, "Failed to record job outcome");
            }
        }

        Ok(claimed)
    }

    async fn process(&self, record: JobRecord) -> AppResult<()> {
        // Reclaimed after a lost lease with the budget already spent
        if record.attempts > record.max_attempts {
            warn!(job_id = %record.id, attempts = record.attempts, "Job lease expired with no attempts left");
            return self
                .queue
                .fail(record.id, &format!("internal: lease expired after {} attempts", record.max_attempts))
                .await;
        }

        let job: Job = match serde_json::from_value(record.payload.clone()) {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id = %record.id, kind = %record.kind, "Malformed job payload: {}", e);
                return self.queue.fail(record.id, &format!("validation: {}", e)).await;
            }
        };

        match self.runner.run(job).await {
            Ok(result) => {
                info!(job_id = %record.id, kind = %record.kind, "Job completed");
                self.queue.complete(record.id, result).await
            }
            Err(e) if e.is_retryable() && record.has_attempts_left() => {
                let backoff = self.poll_interval * (record.attempts.max(1) as u32);
                let run_at = Utc::now()
                    + chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::seconds(1));
                warn!(
                    job_id = %record.id,
                    attempts = record.attempts,
                    max_attempts = record.max_attempts,
                    error = %e,
                    "Job hit a transient error, re-queued"
                );
                self.queue
                    .retry(record.id, &format!("{}: {}", e.code(), e), run_at)
                    .await
            }
            Err(e) => {
                error!(job_id = %record.id, kind = %record.kind, error = %e, "Job failed");
                self.queue.fail(record.id, &format!("{}: {}", e.code(), e)).await
            }
        }
    }
}
