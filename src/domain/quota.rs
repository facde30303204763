// ==========================================
// Call-Off Management - quota domain model
// ==========================================
// A quota caps the tonnage tradeable with one counterparty for one
// metal, one direction, one settlement month. Quotas are created
// externally and are read-only here: no call-off operation mutates
// a quota row.
// ==========================================

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::Direction;

// ==========================================
// Quota - tonnage ceiling per counterparty/metal/direction/period
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quota {
    pub quota_id: String,
    pub counterparty_id: String,
    pub direction: Direction,
    pub period: NaiveDate,      // first day of the settlement month
    pub quantity_tonnes: i64,   // nominal ceiling, > 0
    pub tolerance_pct: f64,     // overdraw allowance, >= 0
    pub incoterm: String,
    pub metal_code: String,
    pub created_at: NaiveDateTime,
}

impl Quota {
    /// Tolerance-inflated ceiling in tonnes (display / error reporting)
    pub fn tolerance_ceiling_tonnes(&self) -> f64 {
        self.quantity_tonnes as f64 * (100.0 + self.tolerance_pct) / 100.0
    }

    /// Admission predicate for incremental consumption.
    ///
    /// NEW call-offs provisionally reserve up to the tolerance-inflated
    /// ceiling, same as confirmed draws: the check is a single combined
    /// cap over consumed + pending + additional. The comparison is done
    /// on integer operands scaled by 100 so the boundary is exact for
    /// whole-tonne quantities.
    pub fn admits_additional(&self, consumed_t: i64, pending_t: i64, additional_t: i64) -> bool {
        let projected = (consumed_t + pending_t + additional_t) as f64 * 100.0;
        let ceiling = self.quantity_tonnes as f64 * (100.0 + self.tolerance_pct);
        projected <= ceiling
    }

    /// Stricter sanity check used at NEW -> CONFIRMED: confirmed draws
    /// alone (not pending) must not already exceed the tolerance ceiling.
    pub fn confirmation_within_tolerance(&self, consumed_t: i64) -> bool {
        consumed_t as f64 * 100.0 <= self.quantity_tonnes as f64 * (100.0 + self.tolerance_pct)
    }

    /// True if the settlement month lies more than `months` calendar
    /// months before the month of `today`. Such quotas can no longer be
    /// drawn down.
    pub fn is_older_than_months(&self, today: NaiveDate, months: u32) -> bool {
        let period_idx = self.period.year() * 12 + self.period.month0() as i32;
        let today_idx = today.year() * 12 + today.month0() as i32;
        today_idx - period_idx > months as i32
    }
}
