// ==========================================
// Call-Off Management - data repository layer
// ==========================================
// Responsibility: data access; shields the database details
// Constraint: all queries parameterized, no SQL injection
// Lifecycle writes re-evaluate their admission guards inside the write
// transaction (conditional writes gated on current state).
// ==========================================

pub mod action_log_repo;
pub mod call_off_repo;
pub mod error;
pub mod quota_repo;
pub mod shipment_line_repo;

// Core re-exports
pub use action_log_repo::ActionLogRepository;
pub use call_off_repo::{CallOffFilter, CallOffRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use quota_repo::QuotaRepository;
pub use shipment_line_repo::ShipmentLineRepository;
