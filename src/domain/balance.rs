// ==========================================
// Call-Off Management - quota balance (derived view)
// ==========================================
// Computed live from the call-off set on every read. Never stored,
// never cached across an admission decision and its commit: a cached
// running total drifts under concurrent writes.
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::call_off::CallOff;
use crate::domain::quota::Quota;
use crate::domain::types::{CallOffStatus, ToleranceStatus};

// ==========================================
// QuotaBalance - consumption view over one quota
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaBalance {
    pub quota_id: String,
    pub quantity_tonnes: i64,
    pub tolerance_pct: f64,
    /// CONFIRMED + FULFILLED draw
    pub consumed_tonnes: i64,
    /// NEW (uncommitted) draw
    pub pending_tonnes: i64,
    /// quantity - consumed - pending; negative when tolerance headroom is in use
    pub remaining_tonnes: i64,
    pub tolerance_ceiling_tonnes: f64,
    /// consumed / quantity * 100, display only - never used in admission
    pub utilization_pct: f64,
    pub tolerance_status: ToleranceStatus,
}

impl QuotaBalance {
    /// Partition the call-off set by status and derive the balance.
    ///
    /// Cancelled call-offs contribute nothing. NEW counts as pending,
    /// CONFIRMED and FULFILLED count as consumed.
    pub fn compute(quota: &Quota, call_offs: &[CallOff]) -> Self {
        let mut consumed: i64 = 0;
        let mut pending: i64 = 0;

        for co in call_offs {
            match co.status {
                CallOffStatus::New => pending += co.bundle_qty,
                CallOffStatus::Confirmed | CallOffStatus::Fulfilled => consumed += co.bundle_qty,
                CallOffStatus::Cancelled => {}
            }
        }

        Self::from_totals(quota, consumed, pending)
    }

    /// Derive the balance from pre-aggregated totals (used when the
    /// totals come from a SQL SUM inside a transaction).
    pub fn from_totals(quota: &Quota, consumed_tonnes: i64, pending_tonnes: i64) -> Self {
        let committed = consumed_tonnes + pending_tonnes;
        let ceiling = quota.tolerance_ceiling_tonnes();

        let tolerance_status = if committed <= quota.quantity_tonnes {
            ToleranceStatus::WithinLimits
        } else if (committed as f64) <= ceiling {
            ToleranceStatus::OverQuota
        } else {
            ToleranceStatus::OverTolerance
        };

        Self {
            quota_id: quota.quota_id.clone(),
            quantity_tonnes: quota.quantity_tonnes,
            tolerance_pct: quota.tolerance_pct,
            consumed_tonnes,
            pending_tonnes,
            remaining_tonnes: quota.quantity_tonnes - committed,
            tolerance_ceiling_tonnes: ceiling,
            utilization_pct: consumed_tonnes as f64 / quota.quantity_tonnes as f64 * 100.0,
            tolerance_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Direction;
    use chrono::NaiveDate;

    fn quota(quantity: i64, tolerance_pct: f64) -> Quota {
        Quota {
            quota_id: "Q1".to_string(),
            counterparty_id: "CP1".to_string(),
            direction: Direction::Buy,
            period: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            quantity_tonnes: quantity,
            tolerance_pct,
            incoterm: "FOB".to_string(),
            metal_code: "CU".to_string(),
            created_at: NaiveDate::from_ymd_opt(2026, 8, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    fn call_off(qty: i64, status: CallOffStatus) -> CallOff {
        let q = quota(1000, 5.0);
        let mut co = CallOff::new_draft(&q, qty, None, "t", q.created_at);
        co.status = status;
        co
    }

    #[test]
    fn partitions_by_status() {
        let q = quota(1000, 5.0);
        let set = vec![
            call_off(300, CallOffStatus::Confirmed),
            call_off(200, CallOffStatus::Fulfilled),
            call_off(100, CallOffStatus::New),
            call_off(400, CallOffStatus::Cancelled), // ignored
        ];
        let b = QuotaBalance::compute(&q, &set);
        assert_eq!(b.consumed_tonnes, 500);
        assert_eq!(b.pending_tonnes, 100);
        assert_eq!(b.remaining_tonnes, 400);
        assert_eq!(b.tolerance_status, ToleranceStatus::WithinLimits);
        assert!((b.utilization_pct - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tolerance_status_bands() {
        let q = quota(1000, 5.0);
        assert_eq!(
            QuotaBalance::from_totals(&q, 1000, 0).tolerance_status,
            ToleranceStatus::WithinLimits
        );
        assert_eq!(
            QuotaBalance::from_totals(&q, 1001, 0).tolerance_status,
            ToleranceStatus::OverQuota
        );
        assert_eq!(
            QuotaBalance::from_totals(&q, 1050, 0).tolerance_status,
            ToleranceStatus::OverQuota
        );
        assert_eq!(
            QuotaBalance::from_totals(&q, 1051, 0).tolerance_status,
            ToleranceStatus::OverTolerance
        );
    }

    #[test]
    fn remaining_goes_negative_inside_tolerance() {
        let q = quota(1000, 5.0);
        let b = QuotaBalance::from_totals(&q, 1000, 30);
        assert_eq!(b.remaining_tonnes, -30);
        assert_eq!(b.tolerance_status, ToleranceStatus::OverQuota);
    }
}
