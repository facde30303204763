// ==========================================
// Call-Off Management - shipment line repository
// ==========================================
// Line edits are guarded inside the write transaction: the parent
// call-off must be NEW or CONFIRMED, and the line quantity must fit the
// parent's unallocated remainder. Lines freeze once the parent reaches
// a terminal state.
// ==========================================

use crate::domain::shipment::ShipmentLine;
use crate::domain::types::{CallOffStatus, ShipmentLineStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, TransactionBehavior};
use std::sync::{Arc, Mutex};

const LINE_COLUMNS: &str = "shipment_line_id, call_off_id, bundle_qty, transport_order_id, \
                            status, created_at, updated_at";

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// ShipmentLineRepository
// ==========================================
pub struct ShipmentLineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ShipmentLineRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // Reads
    // ==========================================

    pub fn find_by_id(&self, shipment_line_id: &str) -> RepositoryResult<Option<ShipmentLine>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            &format!("SELECT {LINE_COLUMNS} FROM shipment_line WHERE shipment_line_id = ?"),
            params![shipment_line_id],
            map_shipment_line_row,
        ) {
            Ok(line) => Ok(Some(line)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_by_call_off(&self, call_off_id: &str) -> RepositoryResult<Vec<ShipmentLine>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {LINE_COLUMNS} FROM shipment_line WHERE call_off_id = ? ORDER BY created_at"
        ))?;

        let lines = stmt
            .query_map(params![call_off_id], map_shipment_line_row)?
            .collect::<Result<Vec<ShipmentLine>, _>>()?;

        Ok(lines)
    }

    pub fn count_by_call_off(&self, call_off_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM shipment_line WHERE call_off_id = ?",
            params![call_off_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    // ==========================================
    // Guarded writes
    // ==========================================

    /// Insert a line for an editable parent, checked atomically.
    pub fn insert_guarded(&self, line: &ShipmentLine) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let parent_qty = check_parent_editable(&tx, &line.call_off_id)?;
        let allocated = allocated_total(&tx, &line.call_off_id, None)?;
        let unallocated = parent_qty - allocated;
        if line.bundle_qty > unallocated {
            return Err(RepositoryError::LineOverAllocation {
                call_off_id: line.call_off_id.clone(),
                requested_t: line.bundle_qty,
                unallocated_t: unallocated,
            });
        }

        tx.execute(
            r#"INSERT INTO shipment_line (
                shipment_line_id, call_off_id, bundle_qty, transport_order_id,
                status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &line.shipment_line_id,
                &line.call_off_id,
                &line.bundle_qty,
                &line.transport_order_id,
                line.status.to_db_str(),
                &line.created_at.format(TS_FORMAT).to_string(),
                &line.updated_at.format(TS_FORMAT).to_string(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Change quantity/transport/status of an existing line, re-checking
    /// the parent guard and remainder (excluding the line itself).
    pub fn update_guarded(
        &self,
        shipment_line_id: &str,
        bundle_qty: i64,
        transport_order_id: Option<&str>,
        status: ShipmentLineStatus,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let call_off_id: String = tx
            .query_row(
                "SELECT call_off_id FROM shipment_line WHERE shipment_line_id = ?",
                params![shipment_line_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                    entity: "ShipmentLine".to_string(),
                    id: shipment_line_id.to_string(),
                },
                other => other.into(),
            })?;

        let parent_qty = check_parent_editable(&tx, &call_off_id)?;
        let allocated = allocated_total(&tx, &call_off_id, Some(shipment_line_id))?;
        let unallocated = parent_qty - allocated;
        if bundle_qty > unallocated {
            return Err(RepositoryError::LineOverAllocation {
                call_off_id,
                requested_t: bundle_qty,
                unallocated_t: unallocated,
            });
        }

        let now = chrono::Local::now().naive_local();
        tx.execute(
            r#"UPDATE shipment_line
               SET bundle_qty = ?, transport_order_id = ?, status = ?, updated_at = ?
               WHERE shipment_line_id = ?"#,
            params![
                &bundle_qty,
                &transport_order_id,
                status.to_db_str(),
                &now.format(TS_FORMAT).to_string(),
                shipment_line_id,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Remove a line while the parent is still editable.
    pub fn delete_guarded(&self, shipment_line_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let call_off_id: String = tx
            .query_row(
                "SELECT call_off_id FROM shipment_line WHERE shipment_line_id = ?",
                params![shipment_line_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                    entity: "ShipmentLine".to_string(),
                    id: shipment_line_id.to_string(),
                },
                other => other.into(),
            })?;

        check_parent_editable(&tx, &call_off_id)?;

        tx.execute(
            "DELETE FROM shipment_line WHERE shipment_line_id = ?",
            params![shipment_line_id],
        )?;

        tx.commit()?;
        Ok(())
    }
}

// ==========================================
// Guard helpers
// ==========================================

/// Parent must exist and be NEW or CONFIRMED; returns its bundle_qty.
fn check_parent_editable(conn: &Connection, call_off_id: &str) -> RepositoryResult<i64> {
    let row: Option<(String, i64)> = match conn.query_row(
        "SELECT status, bundle_qty FROM call_off WHERE call_off_id = ?",
        params![call_off_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    ) {
        Ok(r) => Some(r),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };

    let (status_raw, bundle_qty) = row.ok_or_else(|| RepositoryError::NotFound {
        entity: "CallOff".to_string(),
        id: call_off_id.to_string(),
    })?;

    let status = CallOffStatus::from_db_str(&status_raw).ok_or_else(|| {
        RepositoryError::InternalError(format!(
            "call-off {call_off_id} has unknown status: {status_raw}"
        ))
    })?;

    if status.is_terminal() {
        return Err(RepositoryError::ParentNotEditable {
            call_off_id: call_off_id.to_string(),
            status,
        });
    }

    Ok(bundle_qty)
}

/// Total allocated tonnage for a call-off, optionally excluding one line
/// (used when re-sizing that line).
fn allocated_total(
    conn: &Connection,
    call_off_id: &str,
    exclude_line: Option<&str>,
) -> rusqlite::Result<i64> {
    match exclude_line {
        Some(line_id) => conn.query_row(
            r#"SELECT COALESCE(SUM(bundle_qty), 0) FROM shipment_line
               WHERE call_off_id = ? AND shipment_line_id != ?"#,
            params![call_off_id, line_id],
            |row| row.get(0),
        ),
        None => conn.query_row(
            "SELECT COALESCE(SUM(bundle_qty), 0) FROM shipment_line WHERE call_off_id = ?",
            params![call_off_id],
            |row| row.get(0),
        ),
    }
}

/// Map a database row to a ShipmentLine
pub(crate) fn map_shipment_line_row(row: &rusqlite::Row) -> rusqlite::Result<ShipmentLine> {
    let status_raw: String = row.get(4)?;
    let status = ShipmentLineStatus::from_db_str(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown shipment line status: {status_raw}").into(),
        )
    })?;

    Ok(ShipmentLine {
        shipment_line_id: row.get(0)?,
        call_off_id: row.get(1)?,
        bundle_qty: row.get(2)?,
        transport_order_id: row.get(3)?,
        status,
        created_at: parse_ts(row, 5)?,
        updated_at: parse_ts(row, 6)?,
    })
}

fn parse_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&row.get::<_, String>(idx)?, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
