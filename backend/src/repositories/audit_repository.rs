use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::AuditLogEntry;

/// Destination for audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditLogEntry) -> AppResult<()>;
}

/// Writes audit records to the `audit_logs` table
pub struct PgAuditLogRepository {
    pool: PgPool,
}

impl PgAuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recent entries for a resource, newest first
    pub async fn find_by_resource(&self, resource_id: Uuid, limit: i64) -> AppResult<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, (Uuid, String, String, Uuid, serde_json::Value, chrono::DateTime<chrono::Utc>)>(
            r#"
            SELECT tenant_id, action, resource_type, resource_id, metadata, created_at
            FROM audit_logs
            WHERE resource_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(resource_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(tenant_id, action, resource_type, resource_id, metadata, created_at)| AuditLogEntry {
                tenant_id,
                action,
                resource_type,
                resource_id,
                metadata,
                created_at,
            })
            .collect())
    }
}

#[async_trait]
impl AuditSink for PgAuditLogRepository {
    async fn record(&self, entry: AuditLogEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, tenant_id, action, resource_type, resource_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.tenant_id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(entry.resource_id)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
