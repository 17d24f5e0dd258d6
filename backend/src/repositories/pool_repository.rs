use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Match, Pool, PoolWithMatches, Prediction};

/// Pool, fixture and prediction reads plus pool closure
#[async_trait]
pub trait PoolRepository: Send + Sync {
    /// Pool and its matches, scoped to the tenant
    async fn find_with_matches(&self, pool_id: Uuid, tenant_id: Uuid) -> AppResult<Option<PoolWithMatches>>;

    /// Every prediction submitted to the pool
    async fn find_predictions(&self, pool_id: Uuid, tenant_id: Uuid) -> AppResult<Vec<Prediction>>;

    /// Set `is_active = false` and `end_date = ended_at`
    async fn deactivate(&self, pool_id: Uuid, tenant_id: Uuid, ended_at: DateTime<Utc>) -> AppResult<()>;
}

/// Repository for pool data access
pub struct PgPoolRepository {
    pool: PgPool,
}

impl PgPoolRepository {
    /// Create a new PgPoolRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PoolRepository for PgPoolRepository {
    async fn find_with_matches(&self, pool_id: Uuid, tenant_id: Uuid) -> AppResult<Option<PoolWithMatches>> {
        let pool = sqlx::query_as::<_, Pool>(
            r#"
            SELECT id, tenant_id, name, access_policy, rule_set, is_active, start_date, end_date, created_at
            FROM pools
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(pool_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(pool) = pool else {
            return Ok(None);
        };

        let matches = sqlx::query_as::<_, Match>(
            r#"
            SELECT id, pool_id, home_team, away_team, status, home_score, away_score, is_premium, kickoff_at
            FROM matches
            WHERE pool_id = $1
            ORDER BY kickoff_at ASC, id ASC
            "#,
        )
        .bind(pool_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(PoolWithMatches { pool, matches }))
    }

    async fn find_predictions(&self, pool_id: Uuid, tenant_id: Uuid) -> AppResult<Vec<Prediction>> {
        let predictions = sqlx::query_as::<_, Prediction>(
            r#"
            SELECT p.id, p.pool_id, p.match_id, p.user_id, p.home_score, p.away_score,
                   p.awarded_points, p.is_exact, p.created_at
            FROM predictions p
            JOIN pools ON pools.id = p.pool_id
            WHERE p.pool_id = $1 AND pools.tenant_id = $2
            ORDER BY p.created_at ASC, p.id ASC
            "#,
        )
        .bind(pool_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(predictions)
    }

    async fn deactivate(&self, pool_id: Uuid, tenant_id: Uuid, ended_at: DateTime<Utc>) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE pools
            SET is_active = FALSE, end_date = $3
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(pool_id)
        .bind(tenant_id)
        .bind(ended_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("Pool {} not found", pool_id)));
        }
        Ok(())
    }
}
