use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::prediction::Score;

/// How users get into a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessPolicy {
    Public,
    Code,
    Invite,
}

impl AccessPolicy {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "PUBLIC" => Ok(AccessPolicy::Public),
            "CODE" => Ok(AccessPolicy::Code),
            "INVITE" => Ok(AccessPolicy::Invite),
            _ => Err(format!("Invalid access policy: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessPolicy::Public => "PUBLIC",
            AccessPolicy::Code => "CODE",
            AccessPolicy::Invite => "INVITE",
        }
    }
}

/// Match lifecycle as reported by the fixture sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    Cancelled,
    Postponed,
}

impl MatchStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "SCHEDULED" => Ok(MatchStatus::Scheduled),
            "LIVE" => Ok(MatchStatus::Live),
            "FINISHED" => Ok(MatchStatus::Finished),
            "CANCELLED" => Ok(MatchStatus::Cancelled),
            "POSTPONED" => Ok(MatchStatus::Postponed),
            _ => Err(format!("Invalid match status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Live => "LIVE",
            MatchStatus::Finished => "FINISHED",
            MatchStatus::Cancelled => "CANCELLED",
            MatchStatus::Postponed => "POSTPONED",
        }
    }

    /// FINISHED and CANCELLED never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Finished | MatchStatus::Cancelled)
    }
}

/// Prediction pool scoped to a tenant
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Pool {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub access_policy: String, // Stored as TEXT, use AccessPolicy enum for type safety
    pub rule_set: serde_json::Value, // Versioned RuleSetDocument
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Pool {
    /// Get access policy as an enum; unknown values are treated as PUBLIC
    pub fn access_policy_enum(&self) -> AccessPolicy {
        AccessPolicy::from_str(&self.access_policy).unwrap_or(AccessPolicy::Public)
    }
}

/// A fixture inside a pool
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Match {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub home_team: String,
    pub away_team: String,
    pub status: String, // Stored as TEXT, use MatchStatus enum for type safety
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub is_premium: bool,
    pub kickoff_at: DateTime<Utc>,
}

impl Match {
    /// Get status as an enum
    pub fn status_enum(&self) -> MatchStatus {
        MatchStatus::from_str(&self.status).unwrap_or(MatchStatus::Scheduled)
    }

    pub fn is_terminal(&self) -> bool {
        self.status_enum().is_terminal()
    }

    /// Final result, available once the match is FINISHED with both scores set
    pub fn result(&self) -> Option<Score> {
        if self.status_enum() != MatchStatus::Finished {
            return None;
        }
        match (self.home_score, self.away_score) {
            (Some(home), Some(away)) => Some(Score::new(home, away)),
            _ => None,
        }
    }
}

/// Pool together with its fixtures
#[derive(Debug, Clone)]
pub struct PoolWithMatches {
    pub pool: Pool,
    pub matches: Vec<Match>,
}

impl PoolWithMatches {
    /// Matches not yet FINISHED or CANCELLED
    pub fn unfinished_count(&self) -> usize {
        self.matches.iter().filter(|m| !m.is_terminal()).count()
    }
}
