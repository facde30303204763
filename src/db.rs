// ==========================================
// Call-Off Management - SQLite connection setup
// ==========================================
// Goals:
// - Unify PRAGMA behavior for every Connection::open (no module with
//   foreign keys on while another runs without them)
// - Unify busy_timeout to reduce sporadic busy errors under concurrent writes
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// Default busy_timeout (milliseconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// schema_version the code expects
///
/// Used as a warning probe only (no automatic migration) so we never run
/// silently against an outdated database file.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Apply the unified PRAGMAs to a SQLite connection
///
/// Note:
/// - foreign_keys must be enabled per connection
/// - busy_timeout must be configured per connection
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a SQLite connection with the unified configuration applied
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Read schema_version (returns None if the table does not exist)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// Create the full schema on a fresh database (idempotent)
///
/// Schema notes:
/// - quota is read-only from the core's perspective; rows are seeded
///   externally (or by tests)
/// - call_off.status / call_off.revision drive the conditional-write
///   discipline used by the lifecycle transactions
/// - consumption is always recomputed from call_off rows; there is no
///   running-total column on quota
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS quota (
            quota_id TEXT PRIMARY KEY,
            counterparty_id TEXT NOT NULL,
            direction TEXT NOT NULL,
            period TEXT NOT NULL,
            quantity_tonnes INTEGER NOT NULL CHECK (quantity_tonnes > 0),
            tolerance_pct REAL NOT NULL DEFAULT 0 CHECK (tolerance_pct >= 0),
            incoterm TEXT NOT NULL,
            metal_code TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS call_off (
            call_off_id TEXT PRIMARY KEY,
            quota_id TEXT NOT NULL REFERENCES quota(quota_id),
            counterparty_id TEXT NOT NULL,
            direction TEXT NOT NULL,
            incoterm TEXT NOT NULL,
            metal_code TEXT NOT NULL,
            bundle_qty INTEGER NOT NULL CHECK (bundle_qty > 0),
            requested_delivery_date TEXT,
            status TEXT NOT NULL DEFAULT 'NEW',
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            confirmed_at TEXT,
            cancelled_at TEXT,
            fulfilled_at TEXT,
            cancellation_reason TEXT,
            revision INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_call_off_quota ON call_off(quota_id);
        CREATE INDEX IF NOT EXISTS idx_call_off_status ON call_off(status);

        CREATE TABLE IF NOT EXISTS shipment_line (
            shipment_line_id TEXT PRIMARY KEY,
            call_off_id TEXT NOT NULL REFERENCES call_off(call_off_id),
            bundle_qty INTEGER NOT NULL CHECK (bundle_qty > 0),
            transport_order_id TEXT,
            status TEXT NOT NULL DEFAULT 'PLANNED',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_shipment_line_call_off ON shipment_line(call_off_id);

        CREATE TABLE IF NOT EXISTS call_off_action_log (
            action_id TEXT PRIMARY KEY,
            call_off_id TEXT NOT NULL,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_call_off ON call_off_action_log(call_off_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(
            read_schema_version(&conn).unwrap(),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }

    #[test]
    fn schema_version_absent_on_empty_db() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
