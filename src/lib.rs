// ==========================================
// Call-Off Management - core library
// ==========================================
// Traders and operations staff draw down tonnage from pre-agreed quotas
// by creating, confirming, cancelling and fulfilling call-off orders,
// optionally split into shipment lines for transport planning.
// Stack: Rust + SQLite
// ==========================================

// ==========================================
// Module declarations
// ==========================================

// Domain layer - entities and types
pub mod domain;

// Repository layer - data access
pub mod repository;

// Engine layer - business rules
pub mod engine;

// Configuration layer
pub mod config;

// Database infrastructure (connection init / unified PRAGMAs / schema)
pub mod db;

// Logging
pub mod logging;

// API layer - business interface
pub mod api;

// ==========================================
// Core type re-exports
// ==========================================

// Domain types
pub use domain::types::{CallOffStatus, Direction, ShipmentLineStatus, ToleranceStatus};

// Domain entities
pub use domain::{
    AllocationGap, CallOff, CallOffActionLog, CallOffActionType, Quota, QuotaBalance, ShipmentLine,
};

// Engines
pub use engine::{QuotaLedger, ShipmentAllocation};

// API
pub use api::{CallOffApi, QuotaApi, ShipmentLineApi};

// ==========================================
// Constants
// ==========================================

// System version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// System name
pub const APP_NAME: &str = "Call-Off Management";
