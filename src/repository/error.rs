// ==========================================
// Call-Off Management - repository layer error types
// ==========================================
// Tooling: thiserror derive macro
// The lifecycle transactions surface their business-gate failures here
// so the API layer can map them to the user-facing taxonomy with all
// quantified detail intact.
// ==========================================

use thiserror::Error;

use crate::domain::shipment::AllocationGap;
use crate::domain::types::CallOffStatus;

/// Repository layer error type
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== concurrency control =====
    #[error("stale revision on call-off {call_off_id}: expected {expected}, actual {actual}")]
    StaleRevision {
        call_off_id: String,
        expected: i32,
        actual: i32,
    },

    // ===== lifecycle gates (evaluated inside the write transaction) =====
    #[error("invalid state transition on call-off {call_off_id}: {from} -> {to}")]
    InvalidStateTransition {
        call_off_id: String,
        from: CallOffStatus,
        to: CallOffStatus,
    },

    #[error(
        "quota {quota_id} capacity exceeded: requested {requested_t}t, \
         consumed {consumed_t}t + pending {pending_t}t against {quota_t}t +{tolerance_pct}%"
    )]
    QuotaCapacityExceeded {
        quota_id: String,
        requested_t: i64,
        consumed_t: i64,
        pending_t: i64,
        quota_t: i64,
        tolerance_pct: f64,
    },

    #[error("quota {quota_id} tolerance exceeded: confirmed {consumed_t}t over ceiling {ceiling_t}t")]
    ToleranceExceeded {
        quota_id: String,
        consumed_t: i64,
        ceiling_t: f64,
    },

    #[error("shipment allocation incomplete for call-off {call_off_id}")]
    AllocationIncomplete {
        call_off_id: String,
        gaps: Vec<AllocationGap>,
    },

    #[error("call-off {call_off_id} still has {line_count} shipment line(s)")]
    LinkedShipmentLines {
        call_off_id: String,
        line_count: i64,
    },

    #[error("call-off {call_off_id} is not editable in status {status}")]
    ParentNotEditable {
        call_off_id: String,
        status: CallOffStatus,
    },

    #[error(
        "shipment line over-allocates call-off {call_off_id}: requested {requested_t}t, \
         unallocated {unallocated_t}t"
    )]
    LineOverAllocation {
        call_off_id: String,
        requested_t: i64,
        unallocated_t: i64,
    },

    // ===== database errors =====
    #[error("record not found: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("database connection failed: {0}")]
    DatabaseConnectionError(String),

    #[error("database lock acquisition failed: {0}")]
    LockError(String),

    #[error("database transaction failed: {0}")]
    DatabaseTransactionError(String),

    #[error("database query failed: {0}")]
    DatabaseQueryError(String),

    #[error("unique constraint violation: {0}")]
    UniqueConstraintViolation(String),

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    // ===== data quality =====
    #[error("validation failed: {0}")]
    ValidationError(String),

    // ===== generic =====
    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result type alias
pub type RepositoryResult<T> = Result<T, RepositoryError>;
