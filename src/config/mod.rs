// ==========================================
// Call-Off Management - configuration layer
// ==========================================
// Responsibility: tunable business limits, config_kv access
// ==========================================

pub mod limits;

pub use limits::{BusinessLimits, LimitsConfig};
