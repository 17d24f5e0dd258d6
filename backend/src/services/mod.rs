pub mod access_redemption;
pub mod audit;
pub mod finalization;
pub mod prize_awarder;

pub use access_redemption::{random_code, AccessRedemptionService, CodeGenerator, NewCodeBatch};
pub use audit::{AuditTrailService, JsonLinesAuditSink, PoolFinalizedAudit};
pub use finalization::{FinalizationService, FinalizationSummary, FinalizeOptions, TOP_WINNERS};
pub use prize_awarder::{AwardSummary, PrizeAwarder, PrizeResult, PrizeWinner};
