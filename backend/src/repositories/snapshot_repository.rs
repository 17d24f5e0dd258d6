use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::{Database, IsolationLevel};
use crate::error::{AppError, AppResult};
use crate::models::{Snapshot, SnapshotData, SnapshotKind, SnapshotRow};

/// Append-only leaderboard snapshot log.
///
/// Inserts never deduplicate: several FINAL snapshots may exist for a pool
/// after forced re-finalization, and the latest one is authoritative.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn create_snapshot(
        &self,
        pool_id: Uuid,
        tenant_id: Uuid,
        kind: SnapshotKind,
        data: SnapshotData,
    ) -> AppResult<Snapshot>;

    /// Append a FINAL snapshot with the pool locked against other
    /// finalizations. Fails with `AlreadyFinalized` when a FINAL snapshot
    /// exists and `replace_existing` is not set.
    async fn create_final_snapshot(
        &self,
        pool_id: Uuid,
        tenant_id: Uuid,
        data: SnapshotData,
        replace_existing: bool,
    ) -> AppResult<Snapshot>;

    async fn find_latest(&self, pool_id: Uuid, tenant_id: Uuid, kind: SnapshotKind) -> AppResult<Option<Snapshot>>;

    async fn find_latest_final(&self, pool_id: Uuid, tenant_id: Uuid) -> AppResult<Option<Snapshot>> {
        self.find_latest(pool_id, tenant_id, SnapshotKind::Final).await
    }
}

/// PostgreSQL-backed snapshot store
pub struct PgSnapshotStore {
    db: Database,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { db: Database::new(pool) }
    }
}

async fn insert_snapshot(
    conn: &mut PgConnection,
    pool_id: Uuid,
    tenant_id: Uuid,
    kind: SnapshotKind,
    document: serde_json::Value,
) -> AppResult<Snapshot> {
    let row = sqlx::query_as::<_, SnapshotRow>(
        r#"
        INSERT INTO leaderboard_snapshots (id, pool_id, tenant_id, kind, data, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, pool_id, tenant_id, kind, data, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(pool_id)
    .bind(tenant_id)
    .bind(kind.as_str())
    .bind(document)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Snapshot::try_from(row)
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn create_snapshot(
        &self,
        pool_id: Uuid,
        tenant_id: Uuid,
        kind: SnapshotKind,
        data: SnapshotData,
    ) -> AppResult<Snapshot> {
        data.validate()?;
        let document = serde_json::to_value(&data)?;

        let mut conn = self.db.pool().acquire().await?;
        insert_snapshot(&mut *conn, pool_id, tenant_id, kind, document).await
    }

    async fn create_final_snapshot(
        &self,
        pool_id: Uuid,
        tenant_id: Uuid,
        data: SnapshotData,
        replace_existing: bool,
    ) -> AppResult<Snapshot> {
        data.validate()?;
        let document = serde_json::to_value(&data)?;

        self.db
            .transaction(IsolationLevel::ReadCommitted, move |conn| {
                Box::pin(async move {
                    // Concurrent finalizations of one pool queue up here
                    let locked: Option<Uuid> = sqlx::query_scalar(
                        r#"
                        SELECT id FROM pools
                        WHERE id = $1 AND tenant_id = $2
                        FOR UPDATE
                        "#,
                    )
                    .bind(pool_id)
                    .bind(tenant_id)
                    .fetch_optional(&mut *conn)
                    .await?;

                    if locked.is_none() {
                        return Err(AppError::NotFound(format!("Pool {} not found", pool_id)));
                    }

                    let existing: Option<Uuid> = sqlx::query_scalar(
                        r#"
                        SELECT id FROM leaderboard_snapshots
                        WHERE pool_id = $1 AND tenant_id = $2 AND kind = $3
                        ORDER BY created_at DESC, seq DESC
                        LIMIT 1
                        "#,
                    )
                    .bind(pool_id)
                    .bind(tenant_id)
                    .bind(SnapshotKind::Final.as_str())
                    .fetch_optional(&mut *conn)
                    .await?;

                    match existing {
                        Some(snapshot_id) if !replace_existing => Err(AppError::already_finalized(snapshot_id)),
                        _ => insert_snapshot(conn, pool_id, tenant_id, SnapshotKind::Final, document).await,
                    }
                })
            })
            .await
    }

    async fn find_latest(&self, pool_id: Uuid, tenant_id: Uuid, kind: SnapshotKind) -> AppResult<Option<Snapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, pool_id, tenant_id, kind, data, created_at
            FROM leaderboard_snapshots
            WHERE pool_id = $1 AND tenant_id = $2 AND kind = $3
            ORDER BY created_at DESC, seq DESC
            LIMIT 1
            "#,
        )
        .bind(pool_id)
        .bind(tenant_id)
        .bind(kind.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        row.map(Snapshot::try_from).transpose()
    }
}
