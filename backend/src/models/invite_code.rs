use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Invite code status; a projection of usage, expiry and the pause flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeStatus {
    Unused,
    PartiallyUsed,
    Used,
    Paused,
    Expired,
}

impl CodeStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "UNUSED" => Ok(CodeStatus::Unused),
            "PARTIALLY_USED" => Ok(CodeStatus::PartiallyUsed),
            "USED" => Ok(CodeStatus::Used),
            "PAUSED" => Ok(CodeStatus::Paused),
            "EXPIRED" => Ok(CodeStatus::Expired),
            _ => Err(format!("Invalid code status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeStatus::Unused => "UNUSED",
            CodeStatus::PartiallyUsed => "PARTIALLY_USED",
            CodeStatus::Used => "USED",
            CodeStatus::Paused => "PAUSED",
            CodeStatus::Expired => "EXPIRED",
        }
    }

    /// Status implied by usage alone
    pub fn from_usage(used_count: i32, uses_per_code: i32) -> Self {
        if used_count >= uses_per_code {
            CodeStatus::Used
        } else if used_count > 0 {
            CodeStatus::PartiallyUsed
        } else {
            CodeStatus::Unused
        }
    }
}

/// A generated set of codes sharing a usage cap and expiry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CodeBatch {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub pool_id: Uuid,
    pub name: String,
    pub uses_per_code: i32,
    pub code_count: i32,
    /// Codes (not uses) that reached USED
    pub used_codes: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Single invite code
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InviteCode {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub tenant_id: Uuid,
    pub pool_id: Uuid,
    pub code: String,
    pub uses_per_code: i32,
    pub used_count: i32,
    pub status: String, // Stored as TEXT, use CodeStatus enum for type safety
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of consuming one use of a code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeUse {
    pub used_count: i32,
    pub status: CodeStatus,
    /// True only for the use that moves the code into USED
    pub completes_code: bool,
}

impl InviteCode {
    /// Get the stored status as an enum
    pub fn status_enum(&self) -> CodeStatus {
        CodeStatus::from_str(&self.status).unwrap_or(CodeStatus::Unused)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at < now).unwrap_or(false)
    }

    pub fn remaining_uses(&self) -> i32 {
        (self.uses_per_code - self.used_count).max(0)
    }

    /// Status as seen by a redeemer at `now`
    pub fn effective_status(&self, now: DateTime<Utc>) -> CodeStatus {
        if self.is_expired(now) {
            return CodeStatus::Expired;
        }
        match self.status_enum() {
            CodeStatus::Paused => CodeStatus::Paused,
            _ => CodeStatus::from_usage(self.used_count, self.uses_per_code),
        }
    }

    /// Expiry, then pause, then remaining uses
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> AppResult<()> {
        if self.is_expired(now) {
            return Err(AppError::Expired(format!("Invite code {} has expired", self.code)));
        }
        if self.status_enum() == CodeStatus::Paused {
            return Err(AppError::Paused(format!("Invite code {} is paused", self.code)));
        }
        if self.used_count >= self.uses_per_code {
            return Err(AppError::LimitReached(format!(
                "Invite code {} has no uses left ({}/{})",
                self.code, self.used_count, self.uses_per_code
            )));
        }
        Ok(())
    }

    /// Compute the transition for one more use without applying it
    pub fn next_use(&self, now: DateTime<Utc>) -> AppResult<CodeUse> {
        self.check_redeemable(now)?;

        let used_count = self.used_count + 1;
        let status = if used_count >= self.uses_per_code {
            CodeStatus::Used
        } else {
            CodeStatus::PartiallyUsed
        };

        Ok(CodeUse {
            used_count,
            status,
            completes_code: status == CodeStatus::Used,
        })
    }

    pub fn apply_use(&mut self, code_use: &CodeUse, now: DateTime<Utc>) {
        self.used_count = code_use.used_count;
        self.status = code_use.status.as_str().to_string();
        self.updated_at = now;
    }

    /// Status after an administrative pause/resume
    pub fn status_after_pause(&self, paused: bool) -> CodeStatus {
        if paused {
            CodeStatus::Paused
        } else {
            CodeStatus::from_usage(self.used_count, self.uses_per_code)
        }
    }
}

/// Normalize user-entered codes before lookup
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
