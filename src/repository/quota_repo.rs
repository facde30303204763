// ==========================================
// Call-Off Management - quota repository
// ==========================================
// Quotas are created by the upstream trade-capture system; the core
// only reads them. insert() exists for seeding and tests.
// Hard rule: repositories contain no business logic
// ==========================================

use crate::domain::quota::Quota;
use crate::domain::types::Direction;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const QUOTA_COLUMNS: &str = "quota_id, counterparty_id, direction, period, quantity_tonnes, \
                             tolerance_pct, incoterm, metal_code, created_at";

// ==========================================
// QuotaRepository
// ==========================================
pub struct QuotaRepository {
    conn: Arc<Mutex<Connection>>,
}

impl QuotaRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Insert a quota (seed/test path; production rows arrive externally)
    pub fn insert(&self, quota: &Quota) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO quota (
                quota_id, counterparty_id, direction, period, quantity_tonnes,
                tolerance_pct, incoterm, metal_code, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &quota.quota_id,
                &quota.counterparty_id,
                quota.direction.to_db_str(),
                &quota.period.format("%Y-%m-%d").to_string(),
                &quota.quantity_tonnes,
                &quota.tolerance_pct,
                &quota.incoterm,
                &quota.metal_code,
                &quota.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        Ok(quota.quota_id.clone())
    }

    /// Look up a quota by id
    pub fn find_by_id(&self, quota_id: &str) -> RepositoryResult<Option<Quota>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            &format!("SELECT {QUOTA_COLUMNS} FROM quota WHERE quota_id = ?"),
            params![quota_id],
            map_quota_row,
        ) {
            Ok(quota) => Ok(Some(quota)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All quotas, most recent settlement period first
    pub fn list_all(&self) -> RepositoryResult<Vec<Quota>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {QUOTA_COLUMNS} FROM quota ORDER BY period DESC, counterparty_id"
        ))?;

        let quotas = stmt
            .query_map([], map_quota_row)?
            .collect::<Result<Vec<Quota>, _>>()?;

        Ok(quotas)
    }
}

/// Map a database row to a Quota
pub(crate) fn map_quota_row(row: &rusqlite::Row) -> rusqlite::Result<Quota> {
    let direction_raw: String = row.get(2)?;
    let direction = Direction::from_db_str(&direction_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown direction: {direction_raw}").into(),
        )
    })?;

    Ok(Quota {
        quota_id: row.get(0)?,
        counterparty_id: row.get(1)?,
        direction,
        period: NaiveDate::parse_from_str(&row.get::<_, String>(3)?, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        quantity_tonnes: row.get(4)?,
        tolerance_pct: row.get(5)?,
        incoterm: row.get(6)?,
        metal_code: row.get(7)?,
        created_at: NaiveDateTime::parse_from_str(
            &row.get::<_, String>(8)?,
            "%Y-%m-%d %H:%M:%S",
        )
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}
