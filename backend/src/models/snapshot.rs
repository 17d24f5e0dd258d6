use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Current layout of the snapshot `data` document
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Snapshot kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotKind {
    Live,
    Final,
}

impl SnapshotKind {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "LIVE" => Ok(SnapshotKind::Live),
            "FINAL" => Ok(SnapshotKind::Final),
            _ => Err(format!("Invalid snapshot kind: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Live => "LIVE",
            SnapshotKind::Final => "FINAL",
        }
    }
}

/// One ranked row in a persisted leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub user_id: Uuid,
    pub rank: u32,
    /// Written as a decimal string so fractional totals survive storage;
    /// numeric values are still accepted on read
    pub points: Decimal,
    pub exact_count: u32,
    pub sign_count: u32,
}

/// The `data` document of a snapshot; downstream consumers parse this shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub entries: Vec<SnapshotEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
    pub total_predictions: u64,
    pub total_users: u64,
}

fn default_schema_version() -> u32 {
    SNAPSHOT_SCHEMA_VERSION
}

impl SnapshotData {
    /// Structural checks applied whenever a document crosses the store boundary
    pub fn validate(&self) -> AppResult<()> {
        if self.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(AppError::Validation(format!(
                "Unsupported snapshot schema version {}",
                self.schema_version
            )));
        }

        if self.entries.len() as u64 != self.total_users {
            return Err(AppError::Validation(format!(
                "Snapshot lists {} entries but totalUsers is {}",
                self.entries.len(),
                self.total_users
            )));
        }

        let mut seen = HashSet::with_capacity(self.entries.len());
        let mut previous_rank = 0u32;
        for (index, entry) in self.entries.iter().enumerate() {
            if !seen.insert(entry.user_id) {
                return Err(AppError::Validation(format!(
                    "Snapshot lists user {} twice",
                    entry.user_id
                )));
            }
            // Competition ranking: a rank either repeats the previous one or equals the 1-based position
            let position = index as u32 + 1;
            let tied = index > 0 && entry.rank == previous_rank;
            if !tied && entry.rank != position {
                return Err(AppError::Validation(format!(
                    "Snapshot rank {} at position {} is out of order",
                    entry.rank, position
                )));
            }
            previous_rank = entry.rank;
        }

        Ok(())
    }

    /// Deserialize and validate a stored document
    pub fn from_value(value: serde_json::Value) -> AppResult<Self> {
        let data: SnapshotData = serde_json::from_value(value)
            .map_err(|e| AppError::Validation(format!("Malformed snapshot data: {}", e)))?;
        data.validate()?;
        Ok(data)
    }

    /// Entries whose rank falls in `[rank_from, rank_to]`
    pub fn entries_in_range(&self, rank_from: u32, rank_to: u32) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries
            .iter()
            .filter(move |e| e.rank >= rank_from && e.rank <= rank_to)
    }
}

/// Row in `leaderboard_snapshots`
#[derive(Debug, Clone, FromRow)]
pub struct SnapshotRow {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub tenant_id: Uuid,
    pub kind: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Immutable leaderboard snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub tenant_id: Uuid,
    pub kind: SnapshotKind,
    pub data: SnapshotData,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for Snapshot {
    type Error = AppError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let kind = SnapshotKind::from_str(&row.kind).map_err(AppError::Validation)?;
        Ok(Self {
            id: row.id,
            pool_id: row.pool_id,
            tenant_id: row.tenant_id,
            kind,
            data: SnapshotData::from_value(row.data)?,
            created_at: row.created_at,
        })
    }
}
