// ==========================================
// Call-Off Management - API layer error types
// ==========================================
// Responsibility: the user-facing error taxonomy; converts repository
// errors into errors that carry every business-meaningful number
// (capacity, tolerance, current vs. expected status). A quantified
// business rejection must never collapse into a generic message.
// ==========================================

use crate::domain::shipment::AllocationGap;
use crate::domain::types::CallOffStatus;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API layer error type
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // Business rule errors
    // ==========================================
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error(
        "quota {quota_id} exceeded: requested {requested_t}t, available {available_t}t \
         (quota {quota_t}t +{tolerance_pct}%, consumed {consumed_t}t, pending {pending_t}t)"
    )]
    QuotaExceeded {
        quota_id: String,
        requested_t: i64,
        available_t: f64,
        quota_t: i64,
        tolerance_pct: f64,
        consumed_t: i64,
        pending_t: i64,
    },

    #[error(
        "quota {quota_id} tolerance exceeded: confirmed {consumed_t}t over ceiling {ceiling_t}t"
    )]
    ToleranceExceeded {
        quota_id: String,
        consumed_t: i64,
        ceiling_t: f64,
    },

    #[error("invalid transition on call-off {call_off_id}: {from} -> {to}")]
    InvalidTransition {
        call_off_id: String,
        from: CallOffStatus,
        to: CallOffStatus,
    },

    #[error("shipment allocation incomplete for call-off {call_off_id}: {}",
        .gaps.iter().map(|g| g.to_string()).collect::<Vec<_>>().join("; "))]
    IncompleteAllocation {
        call_off_id: String,
        gaps: Vec<AllocationGap>,
    },

    #[error("call-off {call_off_id} still has {line_count} shipment line(s); unwind them first")]
    LinkedResourceExists {
        call_off_id: String,
        line_count: i64,
    },

    // ==========================================
    // Concurrency control
    // ==========================================
    /// The one retryable error: the snapshot was stale, re-read and
    /// re-attempt. All other errors are terminal for the call.
    #[error("concurrent modification: {0}")]
    ConcurrencyConflict(String),

    // ==========================================
    // Data access
    // ==========================================
    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("database connection failed: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // Generic
    // ==========================================
    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// Conversion from RepositoryError
// Purpose: keep the quantified detail intact across the layer boundary
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // lifecycle gates
            RepositoryError::QuotaCapacityExceeded {
                quota_id,
                requested_t,
                consumed_t,
                pending_t,
                quota_t,
                tolerance_pct,
            } => {
                let ceiling = quota_t as f64 * (100.0 + tolerance_pct) / 100.0;
                ApiError::QuotaExceeded {
                    quota_id,
                    requested_t,
                    available_t: ceiling - (consumed_t + pending_t) as f64,
                    quota_t,
                    tolerance_pct,
                    consumed_t,
                    pending_t,
                }
            }
            RepositoryError::ToleranceExceeded {
                quota_id,
                consumed_t,
                ceiling_t,
            } => ApiError::ToleranceExceeded {
                quota_id,
                consumed_t,
                ceiling_t,
            },
            RepositoryError::InvalidStateTransition {
                call_off_id,
                from,
                to,
            } => ApiError::InvalidTransition {
                call_off_id,
                from,
                to,
            },
            RepositoryError::AllocationIncomplete { call_off_id, gaps } => {
                ApiError::IncompleteAllocation { call_off_id, gaps }
            }
            RepositoryError::LinkedShipmentLines {
                call_off_id,
                line_count,
            } => ApiError::LinkedResourceExists {
                call_off_id,
                line_count,
            },
            RepositoryError::ParentNotEditable {
                call_off_id,
                status,
            } => ApiError::ValidationError(format!(
                "call-off {call_off_id} is {status}; shipment lines are frozen"
            )),
            RepositoryError::LineOverAllocation {
                call_off_id,
                requested_t,
                unallocated_t,
            } => ApiError::ValidationError(format!(
                "shipment line of {requested_t}t exceeds the unallocated remainder \
                 of {unallocated_t}t on call-off {call_off_id}"
            )),

            // concurrency control
            RepositoryError::StaleRevision {
                call_off_id,
                expected,
                actual,
            } => ApiError::ConcurrencyConflict(format!(
                "call-off {call_off_id} was modified by another user \
                 (expected revision {expected}, actual {actual})"
            )),

            // database errors
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{entity} (id={id}) does not exist"))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("database lock failed: {msg}"))
            }
            RepositoryError::DatabaseTransactionError(msg) | RepositoryError::DatabaseQueryError(msg) => {
                ApiError::DatabaseError(msg)
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ValidationError(format!("unique constraint violation: {msg}"))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::ValidationError(format!("foreign key violation: {msg}"))
            }

            // data quality / generic
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result type alias
pub type ApiResult<T> = Result<T, ApiError>;
