// ==========================================
// Call-Off Management - shipment allocation check
// ==========================================
// Gates CONFIRMED -> FULFILLED: the call-off's bundle quantity must be
// fully sub-allocated into shipment lines, each bound to a transport
// order. Reports the failing reason set so the caller can explain what
// is missing instead of a bare boolean.
// ==========================================

use std::sync::Arc;

use crate::domain::call_off::CallOff;
use crate::domain::shipment::{allocation_gaps, AllocationGap};
use crate::repository::error::RepositoryResult;
use crate::repository::shipment_line_repo::ShipmentLineRepository;

// ==========================================
// ShipmentAllocation
// ==========================================
pub struct ShipmentAllocation {
    shipment_line_repo: Arc<ShipmentLineRepository>,
}

impl ShipmentAllocation {
    pub fn new(shipment_line_repo: Arc<ShipmentLineRepository>) -> Self {
        Self { shipment_line_repo }
    }

    /// All reasons the call-off cannot be fulfilled yet; empty when the
    /// allocation is complete.
    pub fn check(&self, call_off: &CallOff) -> RepositoryResult<Vec<AllocationGap>> {
        let lines = self
            .shipment_line_repo
            .find_by_call_off(&call_off.call_off_id)?;
        Ok(allocation_gaps(call_off.bundle_qty, &lines))
    }

    pub fn is_complete(&self, call_off: &CallOff) -> RepositoryResult<bool> {
        Ok(self.check(call_off)?.is_empty())
    }
}
