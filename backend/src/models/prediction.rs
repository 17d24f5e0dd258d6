use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A scoreline, used both for predictions and for final results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub home_score: i32,
    pub away_score: i32,
}

impl Score {
    pub fn new(home_score: i32, away_score: i32) -> Self {
        Self {
            home_score,
            away_score,
        }
    }

    /// Goal differential (home - away)
    pub fn goal_diff(&self) -> i64 {
        i64::from(self.home_score) - i64::from(self.away_score)
    }
}

/// A user's prediction for one match. Written upstream, read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Prediction {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub home_score: i32,
    pub away_score: i32,
    /// Points computed upstream by the live-match updater, if any
    pub awarded_points: Option<i32>,
    pub is_exact: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl Prediction {
    pub fn score(&self) -> Score {
        Score::new(self.home_score, self.away_score)
    }
}
