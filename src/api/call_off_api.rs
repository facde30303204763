// ==========================================
// Call-Off Management - call-off API
// ==========================================
// Responsibility: the call-off lifecycle surface (create, update,
// confirm, cancel, fulfill, list). Validates input, consults the quota
// ledger before consumption-changing transitions, delegates the atomic
// write to the repository, and records every successful mutation in the
// action log.
//
// Authorization is the caller's concern: role gating happens before
// these methods are invoked.
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::config::BusinessLimits;
use crate::domain::action_log::{CallOffActionLog, CallOffActionType};
use crate::domain::call_off::CallOff;
use crate::domain::quota::Quota;
use crate::engine::quota_ledger::QuotaLedger;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::call_off_repo::{CallOffFilter, CallOffRepository};
use crate::repository::quota_repo::QuotaRepository;

// ==========================================
// Request types
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCallOffRequest {
    pub quota_id: String,
    pub bundle_qty: i64,
    pub requested_delivery_date: Option<NaiveDate>,
    pub created_by: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCallOffRequest {
    /// None leaves the quantity unchanged
    pub bundle_qty: Option<i64>,
    /// None leaves the delivery date unchanged
    pub requested_delivery_date: Option<NaiveDate>,
}

// ==========================================
// CallOffApi
// ==========================================
pub struct CallOffApi {
    quota_repo: Arc<QuotaRepository>,
    call_off_repo: Arc<CallOffRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    ledger: QuotaLedger,
    limits: BusinessLimits,
}

impl CallOffApi {
    pub fn new(
        quota_repo: Arc<QuotaRepository>,
        call_off_repo: Arc<CallOffRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        limits: BusinessLimits,
    ) -> Self {
        let ledger = QuotaLedger::new(Arc::clone(&quota_repo), Arc::clone(&call_off_repo));
        Self {
            quota_repo,
            call_off_repo,
            action_log_repo,
            ledger,
            limits,
        }
    }

    // ==========================================
    // Lifecycle operations
    // ==========================================

    /// Create a call-off in NEW against an open quota.
    ///
    /// Guards: quota exists, settlement month within the age window,
    /// quantity within limits, delivery date strictly in the future,
    /// capacity admission (pre-checked here, re-checked atomically at
    /// write time).
    pub fn create(&self, request: CreateCallOffRequest) -> ApiResult<CallOff> {
        if request.created_by.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "created_by must not be empty".to_string(),
            ));
        }
        self.validate_bundle_qty(request.bundle_qty)?;

        let today = chrono::Local::now().date_naive();
        validate_delivery_date(request.requested_delivery_date, today)?;

        let quota = self.load_quota(&request.quota_id)?;
        if quota.is_older_than_months(today, self.limits.quota_max_age_months) {
            return Err(ApiError::ValidationError(format!(
                "quota {} settles in {}, more than {} months ago",
                quota.quota_id,
                quota.period.format("%Y-%m"),
                self.limits.quota_max_age_months
            )));
        }

        // advisory pre-check; the insert re-validates inside its transaction
        self.ledger.admit_consumption(&quota, request.bundle_qty)?;

        let now = chrono::Local::now().naive_local();
        let call_off = CallOff::new_draft(
            &quota,
            request.bundle_qty,
            request.requested_delivery_date,
            &request.created_by,
            now,
        );
        self.call_off_repo.insert_admitted(&call_off, &quota)?;

        tracing::info!(
            call_off_id = %call_off.call_off_id,
            quota_id = %quota.quota_id,
            bundle_qty = call_off.bundle_qty,
            "call-off created"
        );
        self.log_action(
            &call_off.call_off_id,
            CallOffActionType::Create,
            &request.created_by,
            json!({
                "quota_id": quota.quota_id,
                "bundle_qty": call_off.bundle_qty,
                "requested_delivery_date": call_off.requested_delivery_date,
            }),
        );

        Ok(call_off)
    }

    /// Overwrite quantity and/or delivery date of a NEW call-off.
    ///
    /// A quantity increase must fit the quota's remaining headroom; a
    /// decrease always succeeds and frees tonnage back to the quota.
    pub fn update(
        &self,
        call_off_id: &str,
        request: UpdateCallOffRequest,
        operator: &str,
    ) -> ApiResult<CallOff> {
        if request.bundle_qty.is_none() && request.requested_delivery_date.is_none() {
            return Err(ApiError::ValidationError(
                "update request changes nothing".to_string(),
            ));
        }

        let current = self.load_call_off(call_off_id)?;
        let new_qty = request.bundle_qty.unwrap_or(current.bundle_qty);
        let new_date = request
            .requested_delivery_date
            .or(current.requested_delivery_date);

        self.validate_bundle_qty(new_qty)?;
        let today = chrono::Local::now().date_naive();
        validate_delivery_date(request.requested_delivery_date, today)?;

        let quota = self.load_quota(&current.quota_id)?;
        if new_qty > current.bundle_qty {
            self.ledger
                .admit_consumption(&quota, new_qty - current.bundle_qty)?;
        }

        self.call_off_repo.update_admitted(
            call_off_id,
            &quota,
            new_qty,
            new_date,
            current.revision,
        )?;

        tracing::info!(
            call_off_id = %call_off_id,
            old_qty = current.bundle_qty,
            new_qty,
            "call-off updated"
        );
        self.log_action(
            call_off_id,
            CallOffActionType::Update,
            operator,
            json!({
                "old_bundle_qty": current.bundle_qty,
                "new_bundle_qty": new_qty,
                "requested_delivery_date": new_date,
            }),
        );

        self.load_call_off(call_off_id)
    }

    /// NEW -> CONFIRMED: lock the consumption in against the quota.
    pub fn confirm(&self, call_off_id: &str, operator: &str) -> ApiResult<CallOff> {
        let current = self.load_call_off(call_off_id)?;
        let quota = self.load_quota(&current.quota_id)?;

        // advisory pre-check; the transition re-validates in its transaction
        self.ledger.admit_confirmation(&quota)?;

        let confirmed = self.call_off_repo.confirm_admitted(call_off_id, &quota)?;

        tracing::info!(call_off_id = %call_off_id, "call-off confirmed");
        self.log_action(
            call_off_id,
            CallOffActionType::Confirm,
            operator,
            json!({ "bundle_qty": confirmed.bundle_qty }),
        );

        Ok(confirmed)
    }

    /// NEW/CONFIRMED -> CANCELLED. A CONFIRMED call-off can only be
    /// cancelled once its shipment lines are removed.
    pub fn cancel(
        &self,
        call_off_id: &str,
        reason: Option<String>,
        operator: &str,
    ) -> ApiResult<CallOff> {
        let cancelled = self.call_off_repo.cancel(call_off_id, reason.as_deref())?;

        tracing::info!(call_off_id = %call_off_id, "call-off cancelled");
        self.log_action(
            call_off_id,
            CallOffActionType::Cancel,
            operator,
            json!({ "reason": reason }),
        );

        Ok(cancelled)
    }

    /// CONFIRMED -> FULFILLED, gated on complete shipment allocation.
    pub fn fulfill(&self, call_off_id: &str, operator: &str) -> ApiResult<CallOff> {
        let fulfilled = self.call_off_repo.fulfill(call_off_id)?;

        tracing::info!(call_off_id = %call_off_id, "call-off fulfilled");
        self.log_action(
            call_off_id,
            CallOffActionType::Fulfill,
            operator,
            json!({ "bundle_qty": fulfilled.bundle_qty }),
        );

        Ok(fulfilled)
    }

    // ==========================================
    // Reads
    // ==========================================

    pub fn get(&self, call_off_id: &str) -> ApiResult<CallOff> {
        self.load_call_off(call_off_id)
    }

    /// Filtered listing; read-only pass-through
    pub fn list(&self, filter: &CallOffFilter) -> ApiResult<Vec<CallOff>> {
        Ok(self.call_off_repo.list_filtered(filter)?)
    }

    /// Audit trail of one call-off
    pub fn action_history(&self, call_off_id: &str) -> ApiResult<Vec<CallOffActionLog>> {
        Ok(self.action_log_repo.find_by_call_off(call_off_id)?)
    }

    // ==========================================
    // Helpers
    // ==========================================

    fn load_quota(&self, quota_id: &str) -> ApiResult<Quota> {
        self.quota_repo
            .find_by_id(quota_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Quota (id={quota_id}) does not exist")))
    }

    fn load_call_off(&self, call_off_id: &str) -> ApiResult<CallOff> {
        self.call_off_repo
            .find_by_id(call_off_id)?
            .ok_or_else(|| ApiError::NotFound(format!("CallOff (id={call_off_id}) does not exist")))
    }

    fn validate_bundle_qty(&self, qty: i64) -> ApiResult<()> {
        if qty < self.limits.min_bundle_qty || qty > self.limits.max_bundle_qty {
            return Err(ApiError::ValidationError(format!(
                "bundle_qty {} outside allowed range [{}, {}]",
                qty, self.limits.min_bundle_qty, self.limits.max_bundle_qty
            )));
        }
        Ok(())
    }

    /// Audit logging never fails the business operation; a write error
    /// is logged and swallowed.
    fn log_action(
        &self,
        call_off_id: &str,
        action_type: CallOffActionType,
        operator: &str,
        payload: serde_json::Value,
    ) {
        let actor = if operator.trim().is_empty() {
            "system"
        } else {
            operator
        };
        let log = CallOffActionLog::new(
            call_off_id,
            action_type,
            actor,
            Some(payload),
            chrono::Local::now().naive_local(),
        );
        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(call_off_id = %call_off_id, error = %e, "action log write failed");
        }
    }
}

/// Requested delivery dates must be strictly in the future, at creation
/// and on every change.
fn validate_delivery_date(date: Option<NaiveDate>, today: NaiveDate) -> ApiResult<()> {
    if let Some(d) = date {
        if d <= today {
            return Err(ApiError::ValidationError(format!(
                "requested_delivery_date {d} is not strictly in the future (today: {today})"
            )));
        }
    }
    Ok(())
}
