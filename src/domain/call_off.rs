// ==========================================
// Call-Off Management - call-off domain model
// ==========================================
// A call-off is a single draw-down request against exactly one quota.
// quota_id, counterparty_id, direction, incoterm and metal_code are
// snapshot from the quota at creation and immutable thereafter.
// Call-offs are never physically deleted; cancellation is a terminal
// state, not removal.
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::quota::Quota;
use crate::domain::types::CallOffStatus;

// ==========================================
// CallOff - draw-down request against a quota
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOff {
    pub call_off_id: String,
    pub quota_id: String,

    // ===== snapshot fields, derived from the quota at creation =====
    pub counterparty_id: String,
    pub direction: crate::domain::types::Direction,
    pub incoterm: String,
    pub metal_code: String,

    // ===== mutable while NEW =====
    pub bundle_qty: i64,                           // whole tonnes, > 0
    pub requested_delivery_date: Option<NaiveDate>,

    // ===== lifecycle =====
    pub status: CallOffStatus,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub confirmed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub fulfilled_at: Option<NaiveDateTime>,
    pub cancellation_reason: Option<String>,

    // Optimistic lock for quantity/date updates
    pub revision: i32,
}

impl CallOff {
    /// Build a NEW draft against `quota`, deriving the snapshot fields.
    ///
    /// Input validation (quantity range, delivery date, quota age,
    /// capacity admission) happens at the API layer before this is
    /// persisted.
    pub fn new_draft(
        quota: &Quota,
        bundle_qty: i64,
        requested_delivery_date: Option<NaiveDate>,
        created_by: &str,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            call_off_id: Uuid::new_v4().to_string(),
            quota_id: quota.quota_id.clone(),
            counterparty_id: quota.counterparty_id.clone(),
            direction: quota.direction,
            incoterm: quota.incoterm.clone(),
            metal_code: quota.metal_code.clone(),
            bundle_qty,
            requested_delivery_date,
            status: CallOffStatus::New,
            created_by: created_by.to_string(),
            created_at: now,
            confirmed_at: None,
            cancelled_at: None,
            fulfilled_at: None,
            cancellation_reason: None,
            revision: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Direction;

    #[test]
    fn draft_snapshots_quota_fields() {
        let quota = Quota {
            quota_id: "Q9".to_string(),
            counterparty_id: "GLENCORE".to_string(),
            direction: Direction::Sell,
            period: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            quantity_tonnes: 500,
            tolerance_pct: 2.5,
            incoterm: "CIF".to_string(),
            metal_code: "AL".to_string(),
            created_at: NaiveDate::from_ymd_opt(2026, 8, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        };
        let now = quota.created_at;
        let co = CallOff::new_draft(&quota, 100, None, "trader1", now);

        assert_eq!(co.status, CallOffStatus::New);
        assert_eq!(co.quota_id, "Q9");
        assert_eq!(co.counterparty_id, "GLENCORE");
        assert_eq!(co.direction, Direction::Sell);
        assert_eq!(co.incoterm, "CIF");
        assert_eq!(co.metal_code, "AL");
        assert_eq!(co.revision, 0);
        assert!(co.confirmed_at.is_none());
    }
}
