use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Prize for an inclusive range of leaderboard ranks
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Prize {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub tenant_id: Uuid,
    pub rank_from: i32,
    pub rank_to: i32,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Prize {
    pub fn covers(&self, rank: u32) -> bool {
        i64::from(rank) >= i64::from(self.rank_from) && i64::from(rank) <= i64::from(self.rank_to)
    }

    /// Whether the two rank ranges share at least one rank
    pub fn overlaps(&self, rank_from: i32, rank_to: i32) -> bool {
        self.rank_from <= rank_to && rank_from <= self.rank_to
    }
}

/// Input for a new prize row
#[derive(Debug, Clone)]
pub struct NewPrize {
    pub pool_id: Uuid,
    pub tenant_id: Uuid,
    pub rank_from: i32,
    pub rank_to: i32,
    pub title: String,
}

impl NewPrize {
    pub fn validate(&self) -> AppResult<()> {
        if self.rank_from < 1 {
            return Err(AppError::Validation(format!(
                "Prize rankFrom must be at least 1, got {}",
                self.rank_from
            )));
        }
        if self.rank_to < self.rank_from {
            return Err(AppError::Validation(format!(
                "Prize rankTo {} is below rankFrom {}",
                self.rank_to, self.rank_from
            )));
        }
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Prize title is required".to_string()));
        }
        Ok(())
    }
}

/// One winner of one prize; unique on (prize_id, user_id)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PrizeAward {
    pub prize_id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub rank: i32,
    pub awarded_at: DateTime<Utc>,
    pub notified: bool,
}

impl PrizeAward {
    pub fn new(prize_id: Uuid, user_id: Uuid, tenant_id: Uuid, rank: u32) -> Self {
        Self {
            prize_id,
            user_id,
            tenant_id,
            rank: rank as i32,
            awarded_at: Utc::now(),
            notified: false,
        }
    }
}

/// First pair of prizes whose rank ranges overlap, if any
pub fn find_overlap(prizes: &[Prize]) -> Option<(&Prize, &Prize)> {
    prizes.iter().enumerate().find_map(|(i, a)| {
        prizes[i + 1..]
            .iter()
            .find(|b| a.overlaps(b.rank_from, b.rank_to))
            .map(|b| (a, b))
    })
}
