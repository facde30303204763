// ==========================================
// Call-Off Management - shipment line API
// ==========================================
// Responsibility: transport planning edits on a call-off's shipment
// lines. Lines are editable only while the parent call-off is NEW or
// CONFIRMED; the repository enforces the guard atomically.
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{CallOffActionLog, CallOffActionType};
use crate::domain::shipment::{AllocationGap, ShipmentLine};
use crate::domain::types::ShipmentLineStatus;
use crate::engine::shipment_allocation::ShipmentAllocation;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::call_off_repo::CallOffRepository;
use crate::repository::shipment_line_repo::ShipmentLineRepository;

// ==========================================
// Request / response types
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLineRequest {
    pub bundle_qty: i64,
    pub transport_order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLineRequest {
    pub bundle_qty: Option<i64>,
    pub transport_order_id: Option<String>,
    pub status: Option<ShipmentLineStatus>,
}

/// Fulfillment readiness of a call-off's allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationReport {
    pub call_off_id: String,
    pub complete: bool,
    pub gaps: Vec<AllocationGap>,
}

// ==========================================
// ShipmentLineApi
// ==========================================
pub struct ShipmentLineApi {
    call_off_repo: Arc<CallOffRepository>,
    shipment_line_repo: Arc<ShipmentLineRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    allocation: ShipmentAllocation,
}

impl ShipmentLineApi {
    pub fn new(
        call_off_repo: Arc<CallOffRepository>,
        shipment_line_repo: Arc<ShipmentLineRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        let allocation = ShipmentAllocation::new(Arc::clone(&shipment_line_repo));
        Self {
            call_off_repo,
            shipment_line_repo,
            action_log_repo,
            allocation,
        }
    }

    /// Add a sub-allocation to a NEW/CONFIRMED call-off
    pub fn add_line(
        &self,
        call_off_id: &str,
        request: AddLineRequest,
        operator: &str,
    ) -> ApiResult<ShipmentLine> {
        if request.bundle_qty <= 0 {
            return Err(ApiError::ValidationError(format!(
                "shipment line bundle_qty must be positive, got {}",
                request.bundle_qty
            )));
        }

        let now = chrono::Local::now().naive_local();
        let line = ShipmentLine::new(call_off_id, request.bundle_qty, request.transport_order_id, now);
        self.shipment_line_repo.insert_guarded(&line)?;

        tracing::info!(
            call_off_id = %call_off_id,
            shipment_line_id = %line.shipment_line_id,
            bundle_qty = line.bundle_qty,
            "shipment line added"
        );
        self.log_action(
            call_off_id,
            CallOffActionType::AddLine,
            operator,
            json!({
                "shipment_line_id": line.shipment_line_id,
                "bundle_qty": line.bundle_qty,
                "transport_order_id": line.transport_order_id,
            }),
        );

        Ok(line)
    }

    /// Change quantity, transport order and/or status of a line
    pub fn update_line(
        &self,
        shipment_line_id: &str,
        request: UpdateLineRequest,
        operator: &str,
    ) -> ApiResult<ShipmentLine> {
        let current = self.load_line(shipment_line_id)?;

        let new_qty = request.bundle_qty.unwrap_or(current.bundle_qty);
        if new_qty <= 0 {
            return Err(ApiError::ValidationError(format!(
                "shipment line bundle_qty must be positive, got {new_qty}"
            )));
        }
        let new_transport = request
            .transport_order_id
            .or(current.transport_order_id.clone());
        let new_status = request.status.unwrap_or(current.status);

        self.shipment_line_repo.update_guarded(
            shipment_line_id,
            new_qty,
            new_transport.as_deref(),
            new_status,
        )?;

        self.log_action(
            &current.call_off_id,
            CallOffActionType::UpdateLine,
            operator,
            json!({
                "shipment_line_id": shipment_line_id,
                "bundle_qty": new_qty,
                "transport_order_id": new_transport,
                "status": new_status,
            }),
        );

        self.load_line(shipment_line_id)
    }

    /// Bind a line to a transport order (required before fulfillment)
    pub fn assign_transport(
        &self,
        shipment_line_id: &str,
        transport_order_id: &str,
        operator: &str,
    ) -> ApiResult<ShipmentLine> {
        if transport_order_id.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "transport_order_id must not be empty".to_string(),
            ));
        }

        let current = self.load_line(shipment_line_id)?;
        self.shipment_line_repo.update_guarded(
            shipment_line_id,
            current.bundle_qty,
            Some(transport_order_id),
            current.status,
        )?;

        self.log_action(
            &current.call_off_id,
            CallOffActionType::AssignTransport,
            operator,
            json!({
                "shipment_line_id": shipment_line_id,
                "transport_order_id": transport_order_id,
            }),
        );

        self.load_line(shipment_line_id)
    }

    /// Remove a line while the parent is still editable
    pub fn remove_line(&self, shipment_line_id: &str, operator: &str) -> ApiResult<()> {
        let current = self.load_line(shipment_line_id)?;
        self.shipment_line_repo.delete_guarded(shipment_line_id)?;

        self.log_action(
            &current.call_off_id,
            CallOffActionType::RemoveLine,
            operator,
            json!({ "shipment_line_id": shipment_line_id }),
        );

        Ok(())
    }

    pub fn list_lines(&self, call_off_id: &str) -> ApiResult<Vec<ShipmentLine>> {
        Ok(self.shipment_line_repo.find_by_call_off(call_off_id)?)
    }

    /// Would fulfillment succeed right now, and if not, why not?
    pub fn allocation_status(&self, call_off_id: &str) -> ApiResult<AllocationReport> {
        let call_off = self
            .call_off_repo
            .find_by_id(call_off_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("CallOff (id={call_off_id}) does not exist"))
            })?;

        let gaps = self.allocation.check(&call_off)?;
        Ok(AllocationReport {
            call_off_id: call_off_id.to_string(),
            complete: gaps.is_empty(),
            gaps,
        })
    }

    // ==========================================
    // Helpers
    // ==========================================

    fn load_line(&self, shipment_line_id: &str) -> ApiResult<ShipmentLine> {
        self.shipment_line_repo
            .find_by_id(shipment_line_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "ShipmentLine (id={shipment_line_id}) does not exist"
                ))
            })
    }

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
