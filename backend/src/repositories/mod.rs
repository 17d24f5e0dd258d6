pub mod access_repository;
pub mod audit_repository;
pub mod job_repository;
pub mod pool_repository;
pub mod prize_repository;
pub mod snapshot_repository;

// Re-export all repositories for convenient access
pub use access_repository::{AccessRepository, PgAccessRepository};
pub use audit_repository::{AuditSink, PgAuditLogRepository};
pub use job_repository::{JobQueue, PgJobQueue};
pub use pool_repository::{PgPoolRepository, PoolRepository};
pub use prize_repository::{PgPrizeRepository, PrizeRepository};
pub use snapshot_repository::{PgSnapshotStore, SnapshotStore};
