// ==========================================
// Call-Off Management - domain model layer
// ==========================================
// Responsibility: entities, types, pure business rules
// Hard rule: no data access logic here
// ==========================================

pub mod action_log;
pub mod balance;
pub mod call_off;
pub mod quota;
pub mod shipment;
pub mod types;

// Core re-exports
pub use action_log::{CallOffActionLog, CallOffActionType};
pub use balance::QuotaBalance;
pub use call_off::CallOff;
pub use quota::Quota;
pub use shipment::{allocation_gaps, AllocationGap, ShipmentLine};
pub use types::{CallOffStatus, Direction, ShipmentLineStatus, ToleranceStatus};
