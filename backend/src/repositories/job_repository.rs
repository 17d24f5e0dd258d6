use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{JobRecord, JobStatus};

const JOB_COLUMNS: &str = "id, kind, payload, status, attempts, max_attempts, last_error, result, \
                           run_at, created_at, updated_at";

/// Durable job queue
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, kind: &str, payload: serde_json::Value, max_attempts: i32) -> AppResult<JobRecord>;

    /// Claim up to `limit` due PENDING jobs, plus RUNNING jobs not updated
    /// within `lease`, marking them RUNNING and counting the attempt.
    /// Concurrent workers never claim the same row.
    async fn claim_batch(&self, limit: i64, lease: std::time::Duration) -> AppResult<Vec<JobRecord>>;

    async fn complete(&self, job_id: Uuid, result: serde_json::Value) -> AppResult<()>;

    /// Terminal failure
    async fn fail(&self, job_id: Uuid, error: &str) -> AppResult<()>;

    /// Put the job back to PENDING, due at `run_at`
    async fn retry(&self, job_id: Uuid, error: &str, run_at: DateTime<Utc>) -> AppResult<()>;

    async fn find(&self, job_id: Uuid) -> AppResult<Option<JobRecord>>;
}

/// Repository for the `job_queue` table
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<&str>,
        result: Option<serde_json::Value>,
        run_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE job_queue
            SET status = $2,
                last_error = COALESCE($3, last_error),
                result = COALESCE($4, result),
                run_at = COALESCE($5, run_at),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(error)
        .bind(result)
        .bind(run_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, kind: &str, payload: serde_json::Value, max_attempts: i32) -> AppResult<JobRecord> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO job_queue (id, kind, payload, status, attempts, max_attempts, run_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 0, $5, $6, $6, $6) RETURNING {}",
            JOB_COLUMNS
        );
        let job = sqlx::query_as::<_, JobRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(kind)
            .bind(payload)
            .bind(JobStatus::Pending.as_str())
            .bind(max_attempts)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(job)
    }

    async fn claim_batch(&self, limit: i64, lease: std::time::Duration) -> AppResult<Vec<JobRecord>> {
        let sql = format!(
            r#"
            UPDATE job_queue
            SET status = 'RUNNING', attempts = attempts + 1, updated_at = NOW()
            WHERE id IN (
                SELECT id FROM job_queue
                WHERE (status = 'PENDING' AND run_at <= NOW())
                   OR (status = 'RUNNING' AND updated_at < NOW() - make_interval(secs => $2))
                ORDER BY run_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            JOB_COLUMNS
        );
        let jobs = sqlx::query_as::<_, JobRecord>(&sql)
            .bind(limit)
            .bind(lease.as_secs_f64())
            .fetch_all(&self.pool)
            .await?;

        Ok(jobs)
    }

    async fn complete(&self, job_id: Uuid, result: serde_json::Value) -> AppResult<()> {
        self.set_status(job_id, JobStatus::Completed, None, Some(result), None)
            .await
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> AppResult<()> {
        self.set_status(job_id, JobStatus::Failed, Some(error), None, None)
            .await
    }

    async fn retry(&self, job_id: Uuid, error: &str, run_at: DateTime<Utc>) -> AppResult<()> {
        self.set_status(job_id, JobStatus::Pending, Some(error), None, Some(run_at))
            .await
    }

    async fn find(&self, job_id: Uuid) -> AppResult<Option<JobRecord>> {
        let sql = format!("SELECT {} FROM job_queue WHERE id = $1", JOB_COLUMNS);
        let job = sqlx::query_as::<_, JobRecord>(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }
}
