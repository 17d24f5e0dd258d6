use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a registration was granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationSource {
    Code,
    Invitation,
}

impl RegistrationSource {
    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationSource::Code => "CODE",
            RegistrationSource::Invitation => "INVITATION",
        }
    }
}

/// A user's membership in a pool; unique on (pool_id, user_id)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Registration {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub pool_id: Uuid,
    pub user_id: Uuid,
    pub source: String,
    pub source_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Registration written in the same transaction as a redemption
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub pool_id: Uuid,
    pub user_id: Uuid,
    pub source: RegistrationSource,
}

impl NewRegistration {
    pub fn into_registration(self, tenant_id: Uuid, source_id: Uuid, now: DateTime<Utc>) -> Registration {
        Registration {
            id: Uuid::new_v4(),
            tenant_id,
            pool_id: self.pool_id,
            user_id: self.user_id,
            source: self.source.as_str().to_string(),
            source_id,
            created_at: now,
        }
    }
}
