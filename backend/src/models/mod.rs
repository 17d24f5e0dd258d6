//! Domain models for the pool finalizer.
//!
//! Row types map one-to-one onto the PostgreSQL tables in `migrations/`.
//! Enum-like columns are stored as TEXT and exposed through `*_enum()`
//! accessors.

pub mod audit_log;
pub mod invitation;
pub mod invite_code;
pub mod job;
pub mod pool;
pub mod prediction;
pub mod prize;
pub mod registration;
pub mod rule_set;
pub mod snapshot;

// Re-export all models for convenient access
pub use audit_log::AuditLogEntry;
pub use invitation::{normalize_email, Invitation, InvitationStatus};
pub use invite_code::{normalize_code, CodeBatch, CodeStatus, CodeUse, InviteCode};
pub use job::{JobRecord, JobStatus};
pub use pool::{AccessPolicy, Match, MatchStatus, Pool, PoolWithMatches};
pub use prediction::{Prediction, Score};
pub use prize::{find_overlap, NewPrize, Prize, PrizeAward};
pub use registration::{NewRegistration, Registration, RegistrationSource};
pub use rule_set::{RuleSet, RuleSetDocument};
pub use snapshot::{Snapshot, SnapshotData, SnapshotEntry, SnapshotKind, SnapshotRow, SNAPSHOT_SCHEMA_VERSION};
