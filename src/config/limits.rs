// ==========================================
// Call-Off Management - business limits configuration
// ==========================================
// Responsibility: load tunable business limits from config_kv
// Storage: config_kv table (key-value, scope_id='global')
// Unknown keys fall back to compiled defaults.
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Config keys
const KEY_MIN_BUNDLE_QTY: &str = "calloff/min_bundle_qty";
const KEY_MAX_BUNDLE_QTY: &str = "calloff/max_bundle_qty";
const KEY_QUOTA_MAX_AGE_MONTHS: &str = "calloff/quota_max_age_months";

// ==========================================
// BusinessLimits
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessLimits {
    /// Smallest accepted bundle quantity (tonnes)
    pub min_bundle_qty: i64,
    /// Largest accepted bundle quantity (tonnes)
    pub max_bundle_qty: i64,
    /// A quota's settlement month may be at most this many calendar
    /// months in the past for new draw-downs
    pub quota_max_age_months: u32,
}

impl Default for BusinessLimits {
    fn default() -> Self {
        Self {
            min_bundle_qty: 1,
            max_bundle_qty: 10_000,
            quota_max_age_months: 6,
        }
    }
}

// ==========================================
// LimitsConfig - config_kv-backed loader
// ==========================================
pub struct LimitsConfig {
    conn: Arc<Mutex<Connection>>,
}

impl LimitsConfig {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        match conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        ) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> RepositoryResult<T> {
        match self.get_value(key)? {
            Some(raw) => raw.trim().parse::<T>().map_err(|_| {
                RepositoryError::ValidationError(format!("config {key} has invalid value: {raw}"))
            }),
            None => Ok(default),
        }
    }

    /// Load the limits, falling back to defaults for absent keys.
    /// Misconfigured values are an error, not a silent fallback.
    pub fn load(&self) -> RepositoryResult<BusinessLimits> {
        let defaults = BusinessLimits::default();
        let limits = BusinessLimits {
            min_bundle_qty: self.get_parsed(KEY_MIN_BUNDLE_QTY, defaults.min_bundle_qty)?,
            max_bundle_qty: self.get_parsed(KEY_MAX_BUNDLE_QTY, defaults.max_bundle_qty)?,
            quota_max_age_months: self
                .get_parsed(KEY_QUOTA_MAX_AGE_MONTHS, defaults.quota_max_age_months)?,
        };

        if limits.min_bundle_qty < 1 || limits.max_bundle_qty < limits.min_bundle_qty {
            return Err(RepositoryError::ValidationError(format!(
                "invalid bundle quantity limits: min={}, max={}",
                limits.min_bundle_qty, limits.max_bundle_qty
            )));
        }

        Ok(limits)
    }

    /// Write a limit override (tests / admin tooling)
    pub fn set_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
               ON CONFLICT (scope_id, key) DO UPDATE SET value = excluded.value,
                   updated_at = datetime('now')"#,
            params![key, value],
        )?;

        Ok(())
    }
}
