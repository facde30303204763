// ==========================================
// Call-Off Management - quota ledger
// ==========================================
// Answers "what is quota Q's balance?" and "can N more tonnes be drawn
// right now?". The balance is always computed live from the call-off
// set, never from a stored running total (a cached counter drifts under
// concurrent writes).
//
// These checks are the friendly, advisory path: the repository
// re-evaluates the same domain predicates inside the write transaction
// before committing, so a stale read here can never over-admit.
// ==========================================

use std::sync::Arc;

use crate::domain::balance::QuotaBalance;
use crate::domain::quota::Quota;
use crate::repository::call_off_repo::CallOffRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::quota_repo::QuotaRepository;

// ==========================================
// QuotaLedger
// ==========================================
pub struct QuotaLedger {
    quota_repo: Arc<QuotaRepository>,
    call_off_repo: Arc<CallOffRepository>,
}

impl QuotaLedger {
    pub fn new(quota_repo: Arc<QuotaRepository>, call_off_repo: Arc<CallOffRepository>) -> Self {
        Self {
            quota_repo,
            call_off_repo,
        }
    }

    /// Current balance of a quota, recomputed from its call-off set.
    ///
    /// Fails only when the quota does not exist.
    pub fn get_balance(&self, quota_id: &str) -> RepositoryResult<QuotaBalance> {
        let quota = self
            .quota_repo
            .find_by_id(quota_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Quota".to_string(),
                id: quota_id.to_string(),
            })?;

        self.balance_for(&quota)
    }

    /// Balance for an already-loaded quota
    pub fn balance_for(&self, quota: &Quota) -> RepositoryResult<QuotaBalance> {
        let call_offs = self.call_off_repo.find_by_quota(&quota.quota_id)?;
        Ok(QuotaBalance::compute(quota, &call_offs))
    }

    /// Can `additional_t` more tonnes be drawn against `quota`?
    ///
    /// Combined cap: consumed + pending + additional must stay at or
    /// below the tolerance-inflated ceiling. Pending (NEW) draws share
    /// the tolerance headroom with confirmed ones.
    pub fn admit_consumption(&self, quota: &Quota, additional_t: i64) -> RepositoryResult<()> {
        let balance = self.balance_for(quota)?;
        if !quota.admits_additional(
            balance.consumed_tonnes,
            balance.pending_tonnes,
            additional_t,
        ) {
            return Err(RepositoryError::QuotaCapacityExceeded {
                quota_id: quota.quota_id.clone(),
                requested_t: additional_t,
                consumed_t: balance.consumed_tonnes,
                pending_t: balance.pending_tonnes,
                quota_t: quota.quantity_tonnes,
                tolerance_pct: quota.tolerance_pct,
            });
        }
        Ok(())
    }

    /// Sanity check at NEW -> CONFIRMED: confirmed consumption alone must
    /// not already exceed the tolerance ceiling. admit_consumption gated
    /// entry, so a failure here indicates a pathological state.
    pub fn admit_confirmation(&self, quota: &Quota) -> RepositoryResult<()> {
        let balance = self.balance_for(quota)?;
        if !quota.confirmation_within_tolerance(balance.consumed_tonnes) {
            return Err(RepositoryError::ToleranceExceeded {
                quota_id: quota.quota_id.clone(),
                consumed_t: balance.consumed_tonnes,
                ceiling_t: quota.tolerance_ceiling_tonnes(),
            });
        }
        Ok(())
    }
}
