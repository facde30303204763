// ==========================================
// Call-Off Management - API layer
// ==========================================
// Responsibility: business API surface for the HTTP/controller layer
// ==========================================

pub mod call_off_api;
pub mod error;
pub mod quota_api;
pub mod shipment_api;

// Core re-exports
pub use call_off_api::{CallOffApi, CreateCallOffRequest, UpdateCallOffRequest};
pub use error::{ApiError, ApiResult};
pub use quota_api::{QuotaApi, QuotaWithBalance};
pub use shipment_api::{AddLineRequest, AllocationReport, ShipmentLineApi, UpdateLineRequest};
