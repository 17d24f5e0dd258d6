use crate::config::PrizeOverlapPolicy;
use crate::error::{AppError, AppResult};
use crate::models::{find_overlap, NewPrize, Prize, PrizeAward, SnapshotEntry};
use crate::repositories::{PrizeRepository, SnapshotStore};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// A winner selected for a prize
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrizeWinner {
    pub user_id: Uuid,
    pub rank: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub points: Decimal,
    /// Already held an award for this prize before this run
    pub previously_awarded: bool,
}

impl PrizeWinner {
    fn from_entry(entry: &SnapshotEntry, previously_awarded: bool) -> Self {
        Self {
            user_id: entry.user_id,
            rank: entry.rank,
            points: entry.points,
            previously_awarded,
        }
    }
}

/// Per-prize outcome
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrizeResult {
    pub prize_id: Uuid,
    pub title: String,
    pub rank_from: i32,
    pub rank_to: i32,
    pub winners_count: usize,
    pub winners: Vec<PrizeWinner>,
    /// Awards written by this run (would be written, on a dry run)
    pub awards_created: u64,
}

/// Outcome of an award run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardSummary {
    pub snapshot_id: Uuid,
    pub dry_run: bool,
    pub awards_created: u64,
    pub prizes: Vec<PrizeResult>,
}

/// Turns the latest FINAL leaderboard into prize awards
pub struct PrizeAwarder {
    snapshots: Arc<dyn SnapshotStore>,
    prizes: Arc<dyn PrizeRepository>,
    overlap_policy: PrizeOverlapPolicy,
}

impl PrizeAwarder {
    pub fn new(snapshots: Arc<dyn SnapshotStore>, prizes: Arc<dyn PrizeRepository>) -> Self {
        Self {
            snapshots,
            prizes,
            overlap_policy: PrizeOverlapPolicy::Reject,
        }
    }

    pub fn with_overlap_policy(mut self, policy: PrizeOverlapPolicy) -> Self {
        self.overlap_policy = policy;
        self
    }

    /// Award every prize of the pool against its latest FINAL snapshot.
    ///
    /// Users already holding an award for a prize are subtracted before the
    /// insert, and the insert itself skips (prize, user) conflicts, so a
    /// second run over the same snapshot writes nothing. With `dry_run` the
    /// selection runs in full and nothing is written.
    pub async fn award_prizes(&self, pool_id: Uuid, tenant_id: Uuid, dry_run: bool) -> AppResult<AwardSummary> {
        let snapshot = self
            .snapshots
            .find_latest_final(pool_id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No FINAL snapshot for pool {}", pool_id)))?;

        let prizes = self.prizes.find_by_pool(pool_id, tenant_id).await?;
        if self.overlap_policy == PrizeOverlapPolicy::Reject {
            if let Some((a, b)) = find_overlap(&prizes) {
                return Err(AppError::Conflict(format!(
                    "Prizes '{}' ({}-{}) and '{}' ({}-{}) cover overlapping ranks",
                    a.title, a.rank_from, a.rank_to, b.title, b.rank_from, b.rank_to
                )));
            }
        }

        let mut claimed: HashSet<Uuid> = HashSet::new();
        let mut results = Vec::with_capacity(prizes.len());
        let mut awards_created = 0u64;

        for prize in &prizes {
            let result = self
                .award_prize(prize, &snapshot.data.entries, &mut claimed, tenant_id, dry_run)
                .await?;
            awards_created += result.awards_created;
            results.push(result);
        }

        info!(
            pool_id = %pool_id,
            snapshot_id = %snapshot.id,
            prizes = prizes.len(),
            awards_created = awards_created,
            dry_run = dry_run,
            "Prize run complete"
        );

        Ok(AwardSummary {
            snapshot_id: snapshot.id,
            dry_run,
            awards_created,
            prizes: results,
        })
    }

    async fn award_prize(
        &self,
        prize: &Prize,
        entries: &[SnapshotEntry],
        claimed: &mut HashSet<Uuid>,
        tenant_id: Uuid,
        dry_run: bool,
    ) -> AppResult<PrizeResult> {
        let first_match_wins = self.overlap_policy == PrizeOverlapPolicy::FirstMatchWins;
        let selected: Vec<&SnapshotEntry> = entries
            .iter()
            .filter(|e| prize.covers(e.rank))
            .filter(|e| !(first_match_wins && claimed.contains(&e.user_id)))
            .collect();

        let user_ids: Vec<Uuid> = selected.iter().map(|e| e.user_id).collect();
        let existing = self.prizes.find_awarded_users(prize.id, &user_ids).await?;

        let pending: Vec<PrizeAward> = selected
            .iter()
            .filter(|e| !existing.contains(&e.user_id))
            .map(|e| PrizeAward::new(prize.id, e.user_id, tenant_id, e.rank))
            .collect();

        let awards_created = if dry_run || pending.is_empty() {
            pending.len() as u64
        } else {
            self.prizes.insert_awards(&pending).await?
        };

        debug!(
            prize_id = %prize.id,
            winners = selected.len(),
            already_awarded = existing.len(),
            awards_created = awards_created,
            "Prize evaluated"
        );

        claimed.extend(user_ids);

        Ok(PrizeResult {
            prize_id: prize.id,
            title: prize.title.clone(),
            rank_from: prize.rank_from,
            rank_to: prize.rank_to,
            winners_count: selected.len(),
            winners: selected
                .iter()
                .map(|e| PrizeWinner::from_entry(e, existing.contains(&e.user_id)))
                .collect(),
            awards_created,
        })
    }

    /// Create a prize after validating its rank range. Under the `reject`
    /// policy a range overlapping an existing prize is a Conflict.
    pub async fn create_prize(&self, prize: NewPrize) -> AppResult<Prize> {
        prize.validate()?;

        if self.overlap_policy == PrizeOverlapPolicy::Reject {
            let existing = self.prizes.find_by_pool(prize.pool_id, prize.tenant_id).await?;
            if let Some(other) = existing.iter().find(|p| p.overlaps(prize.rank_from, prize.rank_to)) {
                return Err(AppError::Conflict(format!(
                    "Ranks {}-{} overlap prize '{}' ({}-{})",
                    prize.rank_from, prize.rank_to, other.title, other.rank_from, other.rank_to
                )));
            }
        }

        let created = self.prizes.create(prize).await?;
        info!(prize_id = %created.id, pool_id = %created.pool_id, "Prize created");
        Ok(created)
    }
}
