// ==========================================
// Call-Off Management - shipment line domain model
// ==========================================
// A shipment line sub-allocates part of a call-off's bundle quantity
// for transport planning. Lines are editable only while the parent
// call-off is NEW or CONFIRMED and are frozen once it reaches a
// terminal state.
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::types::ShipmentLineStatus;

// ==========================================
// ShipmentLine - sub-allocation of a call-off
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub shipment_line_id: String,
    pub call_off_id: String,                // immutable
    pub bundle_qty: i64,                    // > 0, <= unallocated remainder of parent
    pub transport_order_id: Option<String>, // required before fulfillment
    pub status: ShipmentLineStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ShipmentLine {
    pub fn new(
        call_off_id: &str,
        bundle_qty: i64,
        transport_order_id: Option<String>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            shipment_line_id: Uuid::new_v4().to_string(),
            call_off_id: call_off_id.to_string(),
            bundle_qty,
            transport_order_id,
            status: ShipmentLineStatus::Planned,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// AllocationGap - why fulfillment is blocked
// ==========================================
// The fulfillment gate reports the failing reason set instead of a
// bare boolean so the caller can tell the user what is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationGap {
    /// No shipment lines exist at all
    NoLines,
    /// Lines cover less than the call-off quantity
    UnderAllocated { allocated_t: i64, required_t: i64 },
    /// Lines cover more than the call-off quantity
    OverAllocated { allocated_t: i64, required_t: i64 },
    /// One or more lines have no transport order assigned
    MissingTransportOrder { line_ids: Vec<String> },
}

impl fmt::Display for AllocationGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationGap::NoLines => write!(f, "no shipment lines exist"),
            AllocationGap::UnderAllocated {
                allocated_t,
                required_t,
            } => write!(
                f,
                "under-allocated: {}t of {}t covered",
                allocated_t, required_t
            ),
            AllocationGap::OverAllocated {
                allocated_t,
                required_t,
            } => write!(
                f,
                "over-allocated: {}t against {}t",
                allocated_t, required_t
            ),
            AllocationGap::MissingTransportOrder { line_ids } => write!(
                f,
                "{} line(s) missing a transport order",
                line_ids.len()
            ),
        }
    }
}

/// Check whether `lines` fully and correctly cover `bundle_qty`.
///
/// Complete iff: at least one line exists, the quantities sum exactly
/// to the call-off quantity, and every line carries a transport order.
/// Returns the empty vec when complete.
pub fn allocation_gaps(bundle_qty: i64, lines: &[ShipmentLine]) -> Vec<AllocationGap> {
    let mut gaps = Vec::new();

    if lines.is_empty() {
        gaps.push(AllocationGap::NoLines);
        return gaps;
    }

    let allocated: i64 = lines.iter().map(|l| l.bundle_qty).sum();
    if allocated < bundle_qty {
        gaps.push(AllocationGap::UnderAllocated {
            allocated_t: allocated,
            required_t: bundle_qty,
        });
    } else if allocated > bundle_qty {
        gaps.push(AllocationGap::OverAllocated {
            allocated_t: allocated,
            required_t: bundle_qty,
        });
    }

    let unassigned: Vec<String> = lines
        .iter()
        .filter(|l| l.transport_order_id.is_none())
        .map(|l| l.shipment_line_id.clone())
        .collect();
    if !unassigned.is_empty() {
        gaps.push(AllocationGap::MissingTransportOrder {
            line_ids: unassigned,
        });
    }

    gaps
}
