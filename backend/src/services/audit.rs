use crate::error::{AppError, AppResult};
use crate::models::{AuditLogEntry, CodeBatch, Invitation, InviteCode};
use crate::repositories::AuditSink;
use async_trait::async_trait;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Appends audit entries as JSON lines to a dated file
pub struct JsonLinesAuditSink {
    log_file: PathBuf,
    file_handle: Arc<Mutex<std::fs::File>>,
}

impl JsonLinesAuditSink {
    /// Open (or create) `audit_<date>.log` inside `log_directory`
    pub fn new(log_directory: PathBuf) -> AppResult<Self> {
        std::fs::create_dir_all(&log_directory)
            .map_err(|e| AppError::Internal(format!("Failed to create log directory: {}", e)))?;

        let date = chrono::Utc::now().format("%Y-%m-%d");
        let log_file = log_directory.join(format!("audit_{}.log", date));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| AppError::Internal(format!("Failed to open audit log file: {}", e)))?;

        info!("Audit mirror initialized: {:?}", log_file);

        Ok(Self {
            log_file,
            file_handle: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_file
    }
}

#[async_trait]
impl AuditSink for JsonLinesAuditSink {
    async fn record(&self, entry: AuditLogEntry) -> AppResult<()> {
        let json = serde_json::to_string(&entry)?;

        let mut file = self.file_handle.lock().await;
        writeln!(file, "{}", json)
            .map_err(|e| AppError::Internal(format!("Failed to write audit log: {}", e)))?;

        file.flush()
            .map_err(|e| AppError::Internal(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }
}

/// Metadata of a `pool.finalized` record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolFinalizedAudit {
    pub snapshot_id: Uuid,
    pub leaderboard_size: usize,
    pub total_predictions: u64,
    pub awards_created: u64,
    pub unfinished_matches: usize,
    pub forced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prize_error: Option<String>,
}

/// Audit trail for finalization and access events.
///
/// The store is authoritative. The optional JSON-lines mirror is best
/// effort: a mirror write failure is logged and does not fail the caller.
pub struct AuditTrailService {
    store: Arc<dyn AuditSink>,
    mirror: Option<Arc<dyn AuditSink>>,
}

impl AuditTrailService {
    pub fn new(store: Arc<dyn AuditSink>) -> Self {
        Self { store, mirror: None }
    }

    /// Also append every entry to `mirror`
    pub fn with_mirror(mut self, mirror: Arc<dyn AuditSink>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Log an audit entry
    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.record(entry.clone()).await {
                warn!(action = %entry.action, error = %e, "Audit mirror write failed");
            }
        }

        self.store.record(entry).await
    }

    /// Log pool finalization
    pub async fn log_pool_finalized(
        &self,
        tenant_id: Uuid,
        pool_id: Uuid,
        details: &PoolFinalizedAudit,
    ) -> AppResult<()> {
        let entry = AuditLogEntry::new(
            tenant_id,
            "pool.finalized",
            "pool",
            pool_id,
            serde_json::to_value(details)?,
        );

        self.log(entry).await
    }

    /// Log a prize run triggered outside finalization
    pub async fn log_prizes_awarded(&self, tenant_id: Uuid, pool_id: Uuid, awards_created: u64) -> AppResult<()> {
        let entry = AuditLogEntry::new(
            tenant_id,
            "pool.prizes_awarded",
            "pool",
            pool_id,
            serde_json::json!({ "awardsCreated": awards_created }),
        );

        self.log(entry).await
    }

    /// Log invite code redemption
    pub async fn log_code_redeemed(&self, code: &InviteCode, user_id: Option<Uuid>) -> AppResult<()> {
        let entry = AuditLogEntry::new(
            code.tenant_id,
            "code.redeemed",
            "invite_code",
            code.id,
            serde_json::json!({
                "batchId": code.batch_id.to_string(),
                "poolId": code.pool_id.to_string(),
                "usedCount": code.used_count,
                "usesPerCode": code.uses_per_code,
                "status": code.status,
                "userId": user_id.map(|u| u.to_string()),
            }),
        );

        self.log(entry).await
    }

    /// Log a code pause or resume
    pub async fn log_code_paused(&self, code: &InviteCode, paused: bool) -> AppResult<()> {
        let action = if paused { "code.paused" } else { "code.resumed" };
        let entry = AuditLogEntry::new(
            code.tenant_id,
            action,
            "invite_code",
            code.id,
            serde_json::json!({ "status": code.status }),
        );

        self.log(entry).await
    }

    /// Log code batch creation
    pub async fn log_code_batch_created(&self, batch: &CodeBatch) -> AppResult<()> {
        let entry = AuditLogEntry::new(
            batch.tenant_id,
            "code_batch.created",
            "code_batch",
            batch.id,
            serde_json::json!({
                "poolId": batch.pool_id.to_string(),
                "name": batch.name,
                "codeCount": batch.code_count,
                "usesPerCode": batch.uses_per_code,
            }),
        );

        self.log(entry).await
    }

    /// Log invitation creation
    pub async fn log_invitation_created(&self, invitation: &Invitation) -> AppResult<()> {
        let entry = AuditLogEntry::new(
            invitation.tenant_id,
            "invitation.created",
            "invitation",
            invitation.id,
            serde_json::json!({
                "poolId": invitation.pool_id.to_string(),
                "email": invitation.email,
                "expiresAt": invitation.expires_at,
            }),
        );

        self.log(entry).await
    }

    /// Log invitation acceptance
    pub async fn log_invitation_accepted(&self, invitation: &Invitation) -> AppResult<()> {
        let entry = AuditLogEntry::new(
            invitation.tenant_id,
            "invitation.accepted",
            "invitation",
            invitation.id,
            serde_json::json!({
                "poolId": invitation.pool_id.to_string(),
                "acceptedBy": invitation.accepted_by.map(|u| u.to_string()),
            }),
        );

        self.log(entry).await
    }
}
