use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Email invitation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

impl InvitationStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(InvitationStatus::Pending),
            "ACCEPTED" => Ok(InvitationStatus::Accepted),
            "EXPIRED" => Ok(InvitationStatus::Expired),
            _ => Err(format!("Invalid invitation status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Accepted => "ACCEPTED",
            InvitationStatus::Expired => "EXPIRED",
        }
    }
}

/// Single-use email invitation; the token is the capability
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub pool_id: Uuid,
    pub email: String,
    pub token: String,
    pub status: String, // Stored as TEXT, use InvitationStatus enum for type safety
    pub expires_at: DateTime<Utc>,
    pub sent_count: i32,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    /// Get status as an enum
    pub fn status_enum(&self) -> InvitationStatus {
        InvitationStatus::from_str(&self.status).unwrap_or(InvitationStatus::Pending)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Status as seen at `now`
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        match self.status_enum() {
            InvitationStatus::Pending if self.is_expired(now) => InvitationStatus::Expired,
            status => status,
        }
    }

    /// A PENDING invitation still inside its validity window
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == InvitationStatus::Pending
    }

    /// Accepted invitations stay accepted; expiry only applies while pending
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> AppResult<()> {
        match self.effective_status(now) {
            InvitationStatus::Pending => Ok(()),
            InvitationStatus::Accepted => Err(AppError::AlreadyUsed(format!(
                "Invitation {} has already been accepted",
                self.id
            ))),
            InvitationStatus::Expired => Err(AppError::Expired(format!(
                "Invitation {} has expired",
                self.id
            ))),
        }
    }

    /// Case-insensitive match against the redeemer's claimed email
    pub fn matches_email(&self, email: &str) -> bool {
        normalize_email(&self.email) == normalize_email(email)
    }

    pub fn check_email(&self, email: &str) -> AppResult<()> {
        if self.matches_email(email) {
            Ok(())
        } else {
            Err(AppError::EmailMismatch(format!(
                "Invitation {} was issued to a different email",
                self.id
            )))
        }
    }
}

/// Lowercased, trimmed email used for storage and duplicate checks
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
