use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit record accepted by the audit sink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub tenant_id: Uuid,
    pub action: String, // "pool.finalized", "code.redeemed", ...
    pub resource_type: String,
    pub resource_id: Uuid,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(
        tenant_id: Uuid,
        action: &str,
        resource_type: &str,
        resource_id: Uuid,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            tenant_id,
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id,
            metadata,
            created_at: Utc::now(),
        }
    }
}
