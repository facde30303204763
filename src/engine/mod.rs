// ==========================================
// Call-Off Management - engine layer
// ==========================================
// Responsibility: business rules over the repositories
// Hard rule: no SQL here; reads go through the repository layer
// ==========================================

pub mod quota_ledger;
pub mod shipment_allocation;

pub use quota_ledger::QuotaLedger;
pub use shipment_allocation::ShipmentAllocation;
