// ==========================================
// Call-Off Management - call-off repository
// ==========================================
// Owns the lifecycle writes. Every consumption-changing write runs in a
// single BEGIN IMMEDIATE transaction that recomputes the quota totals
// and re-evaluates the domain admission predicate before touching the
// row: "read balance, decide, write" never interleaves with another
// caller's for the same quota. Status transitions are conditional
// UPDATEs gated on the expected current status.
// ==========================================

use crate::domain::call_off::CallOff;
use crate::domain::quota::Quota;
use crate::domain::shipment::allocation_gaps;
use crate::domain::types::{CallOffStatus, Direction};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::shipment_line_repo::map_shipment_line_row;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, TransactionBehavior};
use std::sync::{Arc, Mutex};

const CALL_OFF_COLUMNS: &str = "call_off_id, quota_id, counterparty_id, direction, incoterm, \
                                metal_code, bundle_qty, requested_delivery_date, status, \
                                created_by, created_at, confirmed_at, cancelled_at, fulfilled_at, \
                                cancellation_reason, revision";

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// CallOffFilter - list query filters
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CallOffFilter {
    pub quota_id: Option<String>,
    pub status: Option<CallOffStatus>,
    pub direction: Option<Direction>,
    pub delivery_from: Option<NaiveDate>,
    pub delivery_to: Option<NaiveDate>,
}

// ==========================================
// CallOffRepository
// ==========================================
pub struct CallOffRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CallOffRepository {
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

    pub fn find_by_id(&self, call_off_id: &str) -> RepositoryResult<Option<CallOff>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            &format!("SELECT {CALL_OFF_COLUMNS} FROM call_off WHERE call_off_id = ?"),
            params![call_off_id],
            map_call_off_row,
        ) {
            Ok(call_off) => Ok(Some(call_off)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All call-offs drawn against a quota (any status), oldest first
    pub fn find_by_quota(&self, quota_id: &str) -> RepositoryResult<Vec<CallOff>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {CALL_OFF_COLUMNS} FROM call_off WHERE quota_id = ? ORDER BY created_at"
        ))?;

        let call_offs = stmt
            .query_map(params![quota_id], map_call_off_row)?
            .collect::<Result<Vec<CallOff>, _>>()?;

        Ok(call_offs)
    }

    /// Filtered listing for the read-only pass-through surface
    pub fn list_filtered(&self, filter: &CallOffFilter) -> RepositoryResult<Vec<CallOff>> {
        let conn = self.get_conn()?;

        let mut sql = format!("SELECT {CALL_OFF_COLUMNS} FROM call_off WHERE 1=1");
        let mut values: Vec<String> = Vec::new();

        if let Some(quota_id) = &filter.quota_id {
            sql.push_str(" AND quota_id = ?");
            values.push(quota_id.clone());
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            values.push(status.to_db_str().to_string());
        }
        if let Some(direction) = filter.direction {
            sql.push_str(" AND direction = ?");
            values.push(direction.to_db_str().to_string());
        }
        if let Some(from) = filter.delivery_from {
            sql.push_str(" AND requested_delivery_date >= ?");
            values.push(from.format("%Y-%m-%d").to_string());
        }
        if let Some(to) = filter.delivery_to {
            sql.push_str(" AND requested_delivery_date <= ?");
            values.push(to.format("%Y-%m-%d").to_string());
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let call_offs = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), map_call_off_row)?
            .collect::<Result<Vec<CallOff>, _>>()?;

        Ok(call_offs)
    }

    /// Live (consumed, pending) totals for a quota, outside a transaction.
    /// Advisory read: the lifecycle writes recompute inside their own
    /// transaction before deciding.
    pub fn consumption_totals(&self, quota_id: &str) -> RepositoryResult<(i64, i64)> {
        let conn = self.get_conn()?;
        Ok(consumption_totals(&conn, quota_id)?)
    }

    // ==========================================
    // Lifecycle writes (atomic admission)
    // ==========================================

    /// Insert a NEW call-off, re-checking capacity admission inside the
    /// write transaction.
    pub fn insert_admitted(&self, call_off: &CallOff, quota: &Quota) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (consumed, pending) = consumption_totals(&tx, &quota.quota_id)?;
        if !quota.admits_additional(consumed, pending, call_off.bundle_qty) {
            return Err(RepositoryError::QuotaCapacityExceeded {
                quota_id: quota.quota_id.clone(),
                requested_t: call_off.bundle_qty,
                consumed_t: consumed,
                pending_t: pending,
                quota_t: quota.quantity_tonnes,
                tolerance_pct: quota.tolerance_pct,
            });
        }

        tx.execute(
            r#"INSERT INTO call_off (
                call_off_id, quota_id, counterparty_id, direction, incoterm, metal_code,
                bundle_qty, requested_delivery_date, status, created_by, created_at,
                cancellation_reason, revision
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &call_off.call_off_id,
                &call_off.quota_id,
                &call_off.counterparty_id,
                call_off.direction.to_db_str(),
                &call_off.incoterm,
                &call_off.metal_code,
                &call_off.bundle_qty,
                &call_off
                    .requested_delivery_date
                    .map(|d| d.format("%Y-%m-%d").to_string()),
                call_off.status.to_db_str(),
                &call_off.created_by,
                &call_off.created_at.format(TS_FORMAT).to_string(),
                &call_off.cancellation_reason,
                &call_off.revision,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Overwrite quantity/date of a NEW call-off.
    ///
    /// A quantity increase re-runs capacity admission on the delta inside
    /// the transaction (the current pending total already contains the
    /// old quantity). Guarded by the expected revision: a mismatch means
    /// another caller changed the row since it was read.
    pub fn update_admitted(
        &self,
        call_off_id: &str,
        quota: &Quota,
        new_qty: i64,
        new_date: Option<NaiveDate>,
        expected_revision: i32,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (status, old_qty, _revision) = load_row_state(&tx, call_off_id)?;
        if status != CallOffStatus::New {
            return Err(RepositoryError::InvalidStateTransition {
                call_off_id: call_off_id.to_string(),
                from: status,
                to: CallOffStatus::New,
            });
        }

        if new_qty > old_qty {
            let (consumed, pending) = consumption_totals(&tx, &quota.quota_id)?;
            let delta = new_qty - old_qty;
            if !quota.admits_additional(consumed, pending, delta) {
                return Err(RepositoryError::QuotaCapacityExceeded {
                    quota_id: quota.quota_id.clone(),
                    requested_t: delta,
                    consumed_t: consumed,
                    pending_t: pending,
                    quota_t: quota.quantity_tonnes,
                    tolerance_pct: quota.tolerance_pct,
                });
            }
        }

        let rows_affected = tx.execute(
            r#"UPDATE call_off
               SET bundle_qty = ?, requested_delivery_date = ?, revision = revision + 1
               WHERE call_off_id = ? AND status = 'NEW' AND revision = ?"#,
            params![
                &new_qty,
                &new_date.map(|d| d.format("%Y-%m-%d").to_string()),
                call_off_id,
                &expected_revision,
            ],
        )?;

        if rows_affected == 0 {
            let actual: i32 = tx.query_row(
                "SELECT revision FROM call_off WHERE call_off_id = ?",
                params![call_off_id],
                |row| row.get(0),
            )?;
            return Err(RepositoryError::StaleRevision {
                call_off_id: call_off_id.to_string(),
                expected: expected_revision,
                actual,
            });
        }

        tx.commit()?;
        Ok(())
    }

    /// NEW -> CONFIRMED, re-checking the confirmed-only tolerance ceiling
    /// inside the transaction.
    pub fn confirm_admitted(&self, call_off_id: &str, quota: &Quota) -> RepositoryResult<CallOff> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (status, _qty, _revision) = load_row_state(&tx, call_off_id)?;
        if status != CallOffStatus::New {
            return Err(RepositoryError::InvalidStateTransition {
                call_off_id: call_off_id.to_string(),
                from: status,
                to: CallOffStatus::Confirmed,
            });
        }

        let (consumed, _pending) = consumption_totals(&tx, &quota.quota_id)?;
        if !quota.confirmation_within_tolerance(consumed) {
            return Err(RepositoryError::ToleranceExceeded {
                quota_id: quota.quota_id.clone(),
                consumed_t: consumed,
                ceiling_t: quota.tolerance_ceiling_tonnes(),
            });
        }

        let now = chrono::Local::now().naive_local();
        tx.execute(
            r#"UPDATE call_off
               SET status = 'CONFIRMED', confirmed_at = ?, revision = revision + 1
               WHERE call_off_id = ? AND status = 'NEW'"#,
            params![&now.format(TS_FORMAT).to_string(), call_off_id],
        )?;

        let updated = load_call_off(&tx, call_off_id)?;
        tx.commit()?;
        Ok(updated)
    }

    /// NEW/CONFIRMED -> CANCELLED.
    ///
    /// Cancelling a CONFIRMED call-off is blocked while shipment lines
    /// exist (transport planning must be unwound first).
    pub fn cancel(&self, call_off_id: &str, reason: Option<&str>) -> RepositoryResult<CallOff> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (status, _qty, _revision) = load_row_state(&tx, call_off_id)?;
        match status {
            CallOffStatus::New => {}
            CallOffStatus::Confirmed => {
                let line_count: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM shipment_line WHERE call_off_id = ?",
                    params![call_off_id],
                    |row| row.get(0),
                )?;
                if line_count > 0 {
                    return Err(RepositoryError::LinkedShipmentLines {
                        call_off_id: call_off_id.to_string(),
                        line_count,
                    });
                }
            }
            other => {
                return Err(RepositoryError::InvalidStateTransition {
                    call_off_id: call_off_id.to_string(),
                    from: other,
                    to: CallOffStatus::Cancelled,
                });
            }
        }

        let now = chrono::Local::now().naive_local();
        tx.execute(
            r#"UPDATE call_off
               SET status = 'CANCELLED', cancelled_at = ?, cancellation_reason = ?,
                   revision = revision + 1
               WHERE call_off_id = ? AND status IN ('NEW', 'CONFIRMED')"#,
            params![&now.format(TS_FORMAT).to_string(), &reason, call_off_id],
        )?;

        let updated = load_call_off(&tx, call_off_id)?;
        tx.commit()?;
        Ok(updated)
    }

    /// CONFIRMED -> FULFILLED, gated on complete shipment allocation.
    pub fn fulfill(&self, call_off_id: &str) -> RepositoryResult<CallOff> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (status, bundle_qty, _revision) = load_row_state(&tx, call_off_id)?;
        if status != CallOffStatus::Confirmed {
            return Err(RepositoryError::InvalidStateTransition {
                call_off_id: call_off_id.to_string(),
                from: status,
                to: CallOffStatus::Fulfilled,
            });
        }

        let mut stmt = tx.prepare(
            r#"SELECT shipment_line_id, call_off_id, bundle_qty, transport_order_id,
                      status, created_at, updated_at
               FROM shipment_line WHERE call_off_id = ?"#,
        )?;
        let lines = stmt
            .query_map(params![call_off_id], map_shipment_line_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let gaps = allocation_gaps(bundle_qty, &lines);
        if !gaps.is_empty() {
            return Err(RepositoryError::AllocationIncomplete {
                call_off_id: call_off_id.to_string(),
                gaps,
            });
        }

        let now = chrono::Local::now().naive_local();
        tx.execute(
            r#"UPDATE call_off
               SET status = 'FULFILLED', fulfilled_at = ?, revision = revision + 1
               WHERE call_off_id = ? AND status = 'CONFIRMED'"#,
            params![&now.format(TS_FORMAT).to_string(), call_off_id],
        )?;

        let updated = load_call_off(&tx, call_off_id)?;
        tx.commit()?;
        Ok(updated)
    }
}

// ==========================================
// Row helpers
// ==========================================

/// (consumed, pending) SUM over call_off rows for one quota.
/// Works on a plain connection or inside a transaction.
fn consumption_totals(conn: &Connection, quota_id: &str) -> rusqlite::Result<(i64, i64)> {
    conn.query_row(
        r#"SELECT
               COALESCE(SUM(CASE WHEN status IN ('CONFIRMED', 'FULFILLED') THEN bundle_qty END), 0),
               COALESCE(SUM(CASE WHEN status = 'NEW' THEN bundle_qty END), 0)
           FROM call_off WHERE quota_id = ?"#,
        params![quota_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}

/// Current (status, bundle_qty, revision) of a call-off row
fn load_row_state(
    conn: &Connection,
    call_off_id: &str,
) -> RepositoryResult<(CallOffStatus, i64, i32)> {
    let row: Option<(String, i64, i32)> = match conn.query_row(
        "SELECT status, bundle_qty, revision FROM call_off WHERE call_off_id = ?",
        params![call_off_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    ) {
        Ok(r) => Some(r),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };

    let (status_raw, qty, revision) = row.ok_or_else(|| RepositoryError::NotFound {
        entity: "CallOff".to_string(),
        id: call_off_id.to_string(),
    })?;

    let status = CallOffStatus::from_db_str(&status_raw).ok_or_else(|| {
        RepositoryError::InternalError(format!(
            "call-off {call_off_id} has unknown status: {status_raw}"
        ))
    })?;

    Ok((status, qty, revision))
}

fn load_call_off(conn: &Connection, call_off_id: &str) -> RepositoryResult<CallOff> {
    conn.query_row(
        &format!("SELECT {CALL_OFF_COLUMNS} FROM call_off WHERE call_off_id = ?"),
        params![call_off_id],
        map_call_off_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
            entity: "CallOff".to_string(),
            id: call_off_id.to_string(),
        },
        other => other.into(),
    })
}

/// Map a database row to a CallOff
pub(crate) fn map_call_off_row(row: &rusqlite::Row) -> rusqlite::Result<CallOff> {
    let direction_raw: String = row.get(3)?;
    let direction = Direction::from_db_str(&direction_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown direction: {direction_raw}").into(),
        )
    })?;

    let status_raw: String = row.get(8)?;
    let status = CallOffStatus::from_db_str(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            format!("unknown status: {status_raw}").into(),
        )
    })?;

    Ok(CallOff {
        call_off_id: row.get(0)?,
        quota_id: row.get(1)?,
        counterparty_id: row.get(2)?,
        direction,
        incoterm: row.get(4)?,
        metal_code: row.get(5)?,
        bundle_qty: row.get(6)?,
        requested_delivery_date: row
            .get::<_, Option<String>>(7)?
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        status,
        created_by: row.get(9)?,
        created_at: parse_ts(row, 10)?,
        confirmed_at: parse_opt_ts(row, 11)?,
        cancelled_at: parse_opt_ts(row, 12)?,
        fulfilled_at: parse_opt_ts(row, 13)?,
        cancellation_reason: row.get(14)?,
        revision: row.get(15)?,
    })
}

fn parse_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&row.get::<_, String>(idx)?, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_opt_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(s) => NaiveDateTime::parse_from_str(&s, TS_FORMAT)
            .map(Some)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            }),
        None => Ok(None),
    }
}
