use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{NewPrize, Prize, PrizeAward};

/// Prize table and prize award writes
#[async_trait]
pub trait PrizeRepository: Send + Sync {
    /// All prizes of a pool ordered by `rank_from`
    async fn find_by_pool(&self, pool_id: Uuid, tenant_id: Uuid) -> AppResult<Vec<Prize>>;

    async fn create(&self, prize: NewPrize) -> AppResult<Prize>;

    /// Subset of `user_ids` that already hold an award for `prize_id`
    async fn find_awarded_users(&self, prize_id: Uuid, user_ids: &[Uuid]) -> AppResult<HashSet<Uuid>>;

    /// Bulk insert, skipping rows that conflict on (prize_id, user_id).
    /// Returns the number of rows actually written.
    async fn insert_awards(&self, awards: &[PrizeAward]) -> AppResult<u64>;
}

/// Repository for prize data access
pub struct PgPrizeRepository {
    pool: PgPool,
}

impl PgPrizeRepository {
    /// Create a new PgPrizeRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrizeRepository for PgPrizeRepository {
    async fn find_by_pool(&self, pool_id: Uuid, tenant_id: Uuid) -> AppResult<Vec<Prize>> {
        let prizes = sqlx::query_as::<_, Prize>(
            r#"
            SELECT id, pool_id, tenant_id, rank_from, rank_to, title, created_at
            FROM prizes
            WHERE pool_id = $1 AND tenant_id = $2
            ORDER BY rank_from ASC, rank_to ASC, id ASC
            "#,
        )
        .bind(pool_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(prizes)
    }

    async fn create(&self, prize: NewPrize) -> AppResult<Prize> {
        let created = sqlx::query_as::<_, Prize>(
            r#"
            INSERT INTO prizes (id, pool_id, tenant_id, rank_from, rank_to, title, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, pool_id, tenant_id, rank_from, rank_to, title, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(prize.pool_id)
        .bind(prize.tenant_id)
        .bind(prize.rank_from)
        .bind(prize.rank_to)
        .bind(&prize.title)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_awarded_users(&self, prize_id: Uuid, user_ids: &[Uuid]) -> AppResult<HashSet<Uuid>> {
        if user_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let awarded = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id
            FROM prize_awards
            WHERE prize_id = $1 AND user_id = ANY($2)
            "#,
        )
        .bind(prize_id)
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(awarded.into_iter().collect())
    }

    async fn insert_awards(&self, awards: &[PrizeAward]) -> AppResult<u64> {
        if awards.is_empty() {
            return Ok(0);
        }

        let prize_ids: Vec<Uuid> = awards.iter().map(|a| a.prize_id).collect();
        let user_ids: Vec<Uuid> = awards.iter().map(|a| a.user_id).collect();
        let tenant_ids: Vec<Uuid> = awards.iter().map(|a| a.tenant_id).collect();
        let ranks: Vec<i32> = awards.iter().map(|a| a.rank).collect();
        let awarded_at: Vec<DateTime<Utc>> = awards.iter().map(|a| a.awarded_at).collect();
        let notified: Vec<bool> = awards.iter().map(|a| a.notified).collect();

        let rows_affected = sqlx::query(
            r#"
            INSERT INTO prize_awards (prize_id, user_id, tenant_id, rank, awarded_at, notified)
            SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::uuid[], $4::int4[], $5::timestamptz[], $6::bool[])
            ON CONFLICT (prize_id, user_id) DO NOTHING
            "#,
        )
        .bind(prize_ids)
        .bind(user_ids)
        .bind(tenant_ids)
        .bind(ranks)
        .bind(awarded_at)
        .bind(notified)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected)
    }
}
