// ==========================================
// Call-Off Management - action log domain model
// ==========================================
// Audit trail of lifecycle mutations. Append-only; every successful
// create/update/transition and shipment-line edit leaves a row.
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==========================================
// CallOffActionType
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallOffActionType {
    Create,
    Update,
    Confirm,
    Cancel,
    Fulfill,
    AddLine,
    UpdateLine,
    AssignTransport,
    RemoveLine,
}

impl fmt::Display for CallOffActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl CallOffActionType {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CREATE" => Some(CallOffActionType::Create),
            "UPDATE" => Some(CallOffActionType::Update),
            "CONFIRM" => Some(CallOffActionType::Confirm),
            "CANCEL" => Some(CallOffActionType::Cancel),
            "FULFILL" => Some(CallOffActionType::Fulfill),
            "ADD_LINE" => Some(CallOffActionType::AddLine),
            "UPDATE_LINE" => Some(CallOffActionType::UpdateLine),
            "ASSIGN_TRANSPORT" => Some(CallOffActionType::AssignTransport),
            "REMOVE_LINE" => Some(CallOffActionType::RemoveLine),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CallOffActionType::Create => "CREATE",
            CallOffActionType::Update => "UPDATE",
            CallOffActionType::Confirm => "CONFIRM",
            CallOffActionType::Cancel => "CANCEL",
            CallOffActionType::Fulfill => "FULFILL",
            CallOffActionType::AddLine => "ADD_LINE",
            CallOffActionType::UpdateLine => "UPDATE_LINE",
            CallOffActionType::AssignTransport => "ASSIGN_TRANSPORT",
            CallOffActionType::RemoveLine => "REMOVE_LINE",
        }
    }
}

// ==========================================
// CallOffActionLog - one audit row
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOffActionLog {
    pub action_id: String,
    pub call_off_id: String,
    pub action_type: CallOffActionType,
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub payload_json: Option<serde_json::Value>,
}

impl CallOffActionLog {
    pub fn new(
        call_off_id: &str,
        action_type: CallOffActionType,
        actor: &str,
        payload_json: Option<serde_json::Value>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            action_id: Uuid::new_v4().to_string(),
            call_off_id: call_off_id.to_string(),
            action_type,
            action_ts: now,
            actor: actor.to_string(),
            payload_json,
        }
    }
}
