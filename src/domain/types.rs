// ==========================================
// Call-Off Management - domain type definitions
// ==========================================
// Serialization format: SCREAMING_SNAKE_CASE (matches database TEXT columns)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Call-off status
// ==========================================
// State machine: NEW -> CONFIRMED -> FULFILLED
//                NEW/CONFIRMED -> CANCELLED
// FULFILLED and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallOffStatus {
    New,       // draft draw-down, quantity still editable
    Confirmed, // consumption locked in against the quota
    Fulfilled, // fully shipped (terminal)
    Cancelled, // withdrawn (terminal)
}

impl fmt::Display for CallOffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl CallOffStatus {
    /// Parse from the database string representation
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NEW" => Some(CallOffStatus::New),
            "CONFIRMED" => Some(CallOffStatus::Confirmed),
            "FULFILLED" => Some(CallOffStatus::Fulfilled),
            "CANCELLED" => Some(CallOffStatus::Cancelled),
            _ => None,
        }
    }

    /// Database string representation
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CallOffStatus::New => "NEW",
            CallOffStatus::Confirmed => "CONFIRMED",
            CallOffStatus::Fulfilled => "FULFILLED",
            CallOffStatus::Cancelled => "CANCELLED",
        }
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallOffStatus::Fulfilled | CallOffStatus::Cancelled)
    }

    /// Transition table of the call-off state machine
    ///
    /// Every edge not listed here must be rejected with an
    /// invalid-transition error, never silently ignored.
    pub fn can_transition_to(&self, to: CallOffStatus) -> bool {
        use CallOffStatus::*;
        matches!(
            (self, to),
            (New, Confirmed) | (New, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Fulfilled)
        )
    }
}

// ==========================================
// Trade direction
// ==========================================
// Direction of the quota with the counterparty; copied onto each
// call-off at creation and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Direction {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" => Some(Direction::Buy),
            "SELL" => Some(Direction::Sell),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

// ==========================================
// Shipment line status
// ==========================================
// Transport progress of a single sub-allocation. The core only reads
// this for reporting; fulfillment gating looks at quantity coverage and
// transport order assignment, not at line status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentLineStatus {
    Planned,
    Ready,
    Picked,
    Shipped,
    Delivered,
}

impl fmt::Display for ShipmentLineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ShipmentLineStatus {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PLANNED" => Some(ShipmentLineStatus::Planned),
            "READY" => Some(ShipmentLineStatus::Ready),
            "PICKED" => Some(ShipmentLineStatus::Picked),
            "SHIPPED" => Some(ShipmentLineStatus::Shipped),
            "DELIVERED" => Some(ShipmentLineStatus::Delivered),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ShipmentLineStatus::Planned => "PLANNED",
            ShipmentLineStatus::Ready => "READY",
            ShipmentLineStatus::Picked => "PICKED",
            ShipmentLineStatus::Shipped => "SHIPPED",
            ShipmentLineStatus::Delivered => "DELIVERED",
        }
    }
}

// ==========================================
// Tolerance status (derived, display only)
// ==========================================
// Classification of total committed draw (consumed + pending) against
// the nominal quota and the tolerance-inflated ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToleranceStatus {
    WithinLimits,
    OverQuota,
    OverTolerance,
}

impl fmt::Display for ToleranceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToleranceStatus::WithinLimits => write!(f, "WITHIN_LIMITS"),
            ToleranceStatus::OverQuota => write!(f, "OVER_QUOTA"),
            ToleranceStatus::OverTolerance => write!(f, "OVER_TOLERANCE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_matches_state_machine() {
        use CallOffStatus::*;

        assert!(New.can_transition_to(Confirmed));
        assert!(New.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Fulfilled));

        // edges that must be rejected
        assert!(!New.can_transition_to(Fulfilled));
        assert!(!Confirmed.can_transition_to(New));
        assert!(!Fulfilled.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Cancelled.can_transition_to(New));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        use CallOffStatus::*;
        for terminal in [Fulfilled, Cancelled] {
            assert!(terminal.is_terminal());
            for to in [New, Confirmed, Fulfilled, Cancelled] {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }

    #[test]
    fn status_db_roundtrip() {
        use CallOffStatus::*;
        for s in [New, Confirmed, Fulfilled, Cancelled] {
            assert_eq!(CallOffStatus::from_db_str(s.to_db_str()), Some(s));
        }
        assert_eq!(CallOffStatus::from_db_str("BOGUS"), None);
    }
}
