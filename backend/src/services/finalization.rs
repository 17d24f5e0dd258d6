use crate::error::{AppError, AppResult, PreconditionReason};
use crate::models::{
    PoolWithMatches, RuleSetDocument, Snapshot, SnapshotData, SnapshotEntry, SnapshotKind,
    SNAPSHOT_SCHEMA_VERSION,
};
use crate::repositories::{PoolRepository, SnapshotStore};
use crate::scoring::{build_standings, generate_leaderboard, LeaderboardEntry};
use crate::services::{AuditTrailService, PoolFinalizedAudit, PrizeAwarder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Winners returned for immediate display
pub const TOP_WINNERS: usize = 10;

/// Switches for a finalization run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeOptions {
    /// Proceed past unfinished matches and an existing FINAL snapshot
    #[serde(default)]
    pub force: bool,
    /// Check, score and rank only; nothing is written
    #[serde(default)]
    pub dry_run: bool,
}

/// Result of `finalize_pool`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizationSummary {
    pub success: bool,
    pub pool_id: Uuid,
    pub snapshot_id: Option<Uuid>,
    pub dry_run: bool,
    pub forced: bool,
    pub leaderboard_size: usize,
    pub total_predictions: u64,
    pub unfinished_matches: usize,
    pub awards_created: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prize_error: Option<String>,
    pub top_winners: Vec<LeaderboardEntry>,
}

/// Scored and ranked pool
struct RankedPool {
    entries: Vec<LeaderboardEntry>,
    total_predictions: u64,
}

impl RankedPool {
    fn snapshot_data(&self, finalized_at: Option<DateTime<Utc>>) -> SnapshotData {
        SnapshotData {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            entries: self.entries.iter().map(SnapshotEntry::from).collect(),
            finalized_at,
            total_predictions: self.total_predictions,
            total_users: self.entries.len() as u64,
        }
    }
}

/// Closes a pool: guards, FINAL snapshot, prizes, deactivation, audit
pub struct FinalizationService {
    pools: Arc<dyn PoolRepository>,
    snapshots: Arc<dyn SnapshotStore>,
    prize_awarder: Arc<PrizeAwarder>,
    audit: Arc<AuditTrailService>,
}

impl FinalizationService {
    pub fn new(
        pools: Arc<dyn PoolRepository>,
        snapshots: Arc<dyn SnapshotStore>,
        prize_awarder: Arc<PrizeAwarder>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            pools,
            snapshots,
            prize_awarder,
            audit,
        }
    }

    async fn load_pool(&self, pool_id: Uuid, tenant_id: Uuid) -> AppResult<PoolWithMatches> {
        self.pools
            .find_with_matches(pool_id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pool {} not found", pool_id)))
    }

    /// Score every prediction and rank the players
    async fn rank_pool(&self, pool: &PoolWithMatches) -> AppResult<RankedPool> {
        let rules = RuleSetDocument::parse(&pool.pool.rule_set)?;
        let predictions = self
            .pools
            .find_predictions(pool.pool.id, pool.pool.tenant_id)
            .await?;

        let standings = build_standings(&predictions, &pool.matches, &rules);
        Ok(RankedPool {
            entries: generate_leaderboard(standings.players),
            total_predictions: standings.total_predictions,
        })
    }

    /// Finalize a pool.
    ///
    /// Unfinished matches and an existing FINAL snapshot block the run unless
    /// `force` is set. A prize awarding failure is logged and recorded in the
    /// summary and audit entry; every other failure aborts the run.
    pub async fn finalize_pool(
        &self,
        pool_id: Uuid,
        tenant_id: Uuid,
        options: FinalizeOptions,
    ) -> AppResult<FinalizationSummary> {
        info!(pool_id = %pool_id, force = options.force, dry_run = options.dry_run, "Finalizing pool");

        // 1. Pool and fixtures
        let pool = self.load_pool(pool_id, tenant_id).await?;

        // 2. Unfinished matches
        let unfinished = pool.unfinished_count();
        if unfinished > 0 {
            if !options.force {
                return Err(AppError::PreconditionFailed {
                    reason: PreconditionReason::UnfinishedMatches,
                    count: unfinished,
                    message: format!("{} matches are not finished", unfinished),
                });
            }
            warn!(pool_id = %pool_id, unfinished = unfinished, "Forcing finalization past unfinished matches");
        }

        // 3. Existing FINAL snapshot. Checked again under the pool lock in step 5.
        if let Some(existing) = self.snapshots.find_latest_final(pool_id, tenant_id).await? {
            if !options.force {
                return Err(AppError::already_finalized(existing.id));
            }
            warn!(pool_id = %pool_id, previous_snapshot = %existing.id, "Re-finalizing pool");
        }

        // 4. Score and rank
        let ranked = self.rank_pool(&pool).await?;
        let top_winners: Vec<LeaderboardEntry> = ranked.entries.iter().take(TOP_WINNERS).cloned().collect();

        if options.dry_run {
            info!(pool_id = %pool_id, leaderboard_size = ranked.entries.len(), "Dry run, nothing written");
            return Ok(FinalizationSummary {
                success: true,
                pool_id,
                snapshot_id: None,
                dry_run: true,
                forced: options.force,
                leaderboard_size: ranked.entries.len(),
                total_predictions: ranked.total_predictions,
                unfinished_matches: unfinished,
                awards_created: 0,
                prize_error: None,
                top_winners,
            });
        }

        // 5. FINAL snapshot
        let now = Utc::now();
        let snapshot = self
            .snapshots
            .create_final_snapshot(pool_id, tenant_id, ranked.snapshot_data(Some(now)), options.force)
            .await?;

        // 6. Prizes, best effort
        let (awards_created, prize_error) = match self.prize_awarder.award_prizes(pool_id, tenant_id, false).await {
            Ok(summary) => (summary.awards_created, None),
            Err(e) => {
                error!(pool_id = %pool_id, error = %e, "Prize awarding failed, continuing finalization");
                (0, Some(e.to_string()))
            }
        };

        // 7. Close the pool
        self.pools.deactivate(pool_id, tenant_id, now).await?;

        // 8. Audit
        let details = PoolFinalizedAudit {
            snapshot_id: snapshot.id,
            leaderboard_size: ranked.entries.len(),
            total_predictions: ranked.total_predictions,
            awards_created,
            unfinished_matches: unfinished,
            forced: options.force,
            prize_error: prize_error.clone(),
        };
        self.audit.log_pool_finalized(tenant_id, pool_id, &details).await?;

        info!(
            pool_id = %pool_id,
            snapshot_id = %snapshot.id,
            leaderboard_size = details.leaderboard_size,
            awards_created = awards_created,
            "Pool finalized"
        );

        Ok(FinalizationSummary {
            success: true,
            pool_id,
            snapshot_id: Some(snapshot.id),
            dry_run: false,
            forced: options.force,
            leaderboard_size: details.leaderboard_size,
            total_predictions: details.total_predictions,
            unfinished_matches: unfinished,
            awards_created,
            prize_error,
            top_winners,
        })
    }

    /// Append a LIVE snapshot of the pool as it stands. No guards apply and
    /// the pool stays open.
    pub async fn snapshot_leaderboard(&self, pool_id: Uuid, tenant_id: Uuid) -> AppResult<Snapshot> {
        let pool = self.load_pool(pool_id, tenant_id).await?;
        let ranked = self.rank_pool(&pool).await?;

        let snapshot = self
            .snapshots
            .create_snapshot(pool_id, tenant_id, SnapshotKind::Live, ranked.snapshot_data(None))
            .await?;

        info!(pool_id = %pool_id, snapshot_id = %snapshot.id, entries = snapshot.data.entries.len(), "LIVE snapshot stored");
        Ok(snapshot)
    }
}
