use crate::database::DatabaseError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Why a finalization precondition blocked the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionReason {
    /// Some matches are not FINISHED/CANCELLED
    UnfinishedMatches,
    /// A FINAL snapshot already exists for the pool
    AlreadyFinalized,
}

impl PreconditionReason {
    /// Machine-readable reason code
    pub fn as_str(&self) -> &'static str {
        match self {
            PreconditionReason::UnfinishedMatches => "unfinished_matches",
            PreconditionReason::AlreadyFinalized => "already_finalized",
        }
    }
}

/// Coarse classification callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fix the input (or pass `force`) and retry
    InvalidInput,
    /// Terminal business-rule rejection for this attempt
    Rejected,
    /// Safe to retry as-is
    Transient,
    /// The object does not exist in this tenant scope
    NotFound,
    /// Bug or infrastructure failure
    Internal,
}

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors that did not map to a domain error
    #[error("SQL error: {0}")]
    Sqlx(SqlxError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Policy mismatch, duplicate active invitation, already registered
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Finalization guard tripped
    #[error("Precondition failed ({}): {message}", reason.as_str())]
    PreconditionFailed {
        reason: PreconditionReason,
        count: usize,
        message: String,
    },

    /// Usage cap reached
    #[error("Limit reached: {0}")]
    LimitReached(String),

    /// Past its expiry
    #[error("Expired: {0}")]
    Expired(String),

    /// Administratively paused
    #[error("Paused: {0}")]
    Paused(String),

    /// Single-use capability already consumed
    #[error("Already used: {0}")]
    AlreadyUsed(String),

    /// Redeemer identity does not match the invitation
    #[error("Email mismatch: {0}")]
    EmailMismatch(String),

    /// Concurrent transaction conflict
    #[error("Transient error: {0}")]
    Transient(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// UUID parsing errors
    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    /// Invariant breach or exhausted internal budget
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// A FINAL snapshot already closes the pool
    pub fn already_finalized(snapshot_id: uuid::Uuid) -> Self {
        AppError::PreconditionFailed {
            reason: PreconditionReason::AlreadyFinalized,
            count: 1,
            message: format!("Pool already finalized by snapshot {}", snapshot_id),
        }
    }

    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::NotFound(_) => ErrorClass::NotFound,
            AppError::Validation(_)
            | AppError::Conflict(_)
            | AppError::PreconditionFailed { .. }
            | AppError::InvalidUuid(_) => ErrorClass::InvalidInput,
            AppError::LimitReached(_)
            | AppError::Expired(_)
            | AppError::Paused(_)
            | AppError::AlreadyUsed(_)
            | AppError::EmailMismatch(_) => ErrorClass::Rejected,
            AppError::Transient(_) => ErrorClass::Transient,
            _ => ErrorClass::Internal,
        }
    }

    /// Only transaction conflicts are worth retrying
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Validation(_) | AppError::InvalidUuid(_) => 400,
            AppError::EmailMismatch(_) => 403,
            AppError::Conflict(_) | AppError::AlreadyUsed(_) => 409,
            AppError::PreconditionFailed { .. } => 412,
            AppError::Expired(_) => 410,
            AppError::LimitReached(_) | AppError::Paused(_) => 422,
            AppError::Transient(_) => 503,
            _ => 500,
        }
    }

    /// Short machine-readable code stored with failed jobs
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::PreconditionFailed { reason, .. } => reason.as_str(),
            AppError::LimitReached(_) => "limit_reached",
            AppError::Expired(_) => "expired",
            AppError::Paused(_) => "paused",
            AppError::AlreadyUsed(_) => "already_used",
            AppError::EmailMismatch(_) => "email_mismatch",
            AppError::Transient(_) => "transient",
            AppError::Validation(_) | AppError::InvalidUuid(_) => "validation",
            _ => "internal",
        }
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Serialization failure or deadlock; the transaction can be replayed
    #[error("Transaction conflict: {0}")]
    Transient(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::Conflict(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::Transient(msg) => AppError::Transient(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                match code.as_deref() {
                    // unique_violation
                    Some("23505") => RepositoryError::Duplicate(db_err.message().to_string()),
                    // foreign_key_violation, check_violation
                    Some("23503") | Some("23514") => {
                        RepositoryError::ConstraintViolation(db_err.message().to_string())
                    }
                    // serialization_failure, deadlock_detected
                    Some("40001") | Some("40P01") => {
                        RepositoryError::Transient(db_err.message().to_string())
                    }
                    _ => RepositoryError::Query(err),
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        RepositoryError::from(err).into()
    }
}
