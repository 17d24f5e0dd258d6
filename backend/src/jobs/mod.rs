//! Job-style entry points.
//!
//! Every externally triggered operation is a [`Job`] value. [`JobRunner`]
//! executes one directly; [`JobWorker`] drains them from the `job_queue`
//! table.

pub mod worker;

pub use worker::JobWorker;

use crate::error::AppResult;
use crate::services::{AccessRedemptionService, AuditTrailService, FinalizationService, FinalizeOptions, PrizeAwarder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A queued request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Job {
    FinalizePool {
        pool_id: Uuid,
        tenant_id: Uuid,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        dry_run: bool,
    },
    AwardPrizes {
        pool_id: Uuid,
        tenant_id: Uuid,
        #[serde(default)]
        dry_run: bool,
    },
    SnapshotLeaderboard {
        pool_id: Uuid,
        tenant_id: Uuid,
    },
    ValidateCode {
        code: String,
        pool_id: Uuid,
        tenant_id: Uuid,
    },
    RedeemCode {
        code_id: Uuid,
        tenant_id: Uuid,
    },
    ValidateInvitation {
        token: String,
        pool_id: Uuid,
        tenant_id: Uuid,
    },
    RedeemInvitation {
        invitation_id: Uuid,
        tenant_id: Uuid,
        email: String,
    },
}

impl Job {
    /// Value stored in `job_queue.kind`
    pub fn kind(&self) -> &'static str {
        match self {
            Job::FinalizePool { .. } => "finalize_pool",
            Job::AwardPrizes { .. } => "award_prizes",
            Job::SnapshotLeaderboard { .. } => "snapshot_leaderboard",
            Job::ValidateCode { .. } => "validate_code",
            Job::RedeemCode { .. } => "redeem_code",
            Job::ValidateInvitation { .. } => "validate_invitation",
            Job::RedeemInvitation { .. } => "redeem_invitation",
        }
    }
}

/// Dispatches jobs to the services
pub struct JobRunner {
    finalization: Arc<FinalizationService>,
    prize_awarder: Arc<PrizeAwarder>,
    access: Arc<AccessRedemptionService>,
    audit: Arc<AuditTrailService>,
}

impl JobRunner {
    pub fn new(
        finalization: Arc<FinalizationService>,
        prize_awarder: Arc<PrizeAwarder>,
        access: Arc<AccessRedemptionService>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            finalization,
            prize_awarder,
            access,
            audit,
        }
    }

    /// Run one job and return its JSON result
    pub async fn run(&self, job: Job) -> AppResult<serde_json::Value> {
        info!(kind = job.kind(), "Running job");

        let value = match job {
            Job::FinalizePool {
                pool_id,
                tenant_id,
                force,
                dry_run,
            } => {
                let summary = self
                    .finalization
                    .finalize_pool(pool_id, tenant_id, FinalizeOptions { force, dry_run })
                    .await?;
                serde_json::to_value(summary)?
            }
            Job::AwardPrizes {
                pool_id,
                tenant_id,
                dry_run,
            } => {
                let summary = self.prize_awarder.award_prizes(pool_id, tenant_id, dry_run).await?;
                if !dry_run {
                    if let Err(e) = self
                        .audit
                        .log_prizes_awarded(tenant_id, pool_id, summary.awards_created)
                        .await
                    {
                        warn!(pool_id = %pool_id, error = %e, "Failed to audit prize run");
                    }
                }
                serde_json::to_value(summary)?
            }
            Job::SnapshotLeaderboard { pool_id, tenant_id } => {
                let snapshot = self.finalization.snapshot_leaderboard(pool_id, tenant_id).await?;
                serde_json::to_value(snapshot)?
            }
            Job::ValidateCode {
                code,
                pool_id,
                tenant_id,
            } => serde_json::to_value(self.access.validate_code(&code, pool_id, tenant_id).await?)?,
            Job::RedeemCode { code_id, tenant_id } => {
                serde_json::to_value(self.access.redeem_code(code_id, tenant_id).await?)?
            }
            Job::ValidateInvitation {
                token,
                pool_id,
                tenant_id,
            } => serde_json::to_value(self.access.validate_invitation(&token, pool_id, tenant_id).await?)?,
            Job::RedeemInvitation {
                invitation_id,
                tenant_id,
                email,
            } => serde_json::to_value(
                self.access
                    .redeem_invitation(invitation_id, tenant_id, &email)
                    .await?,
            )?,
        };

        Ok(value)
    }
}
