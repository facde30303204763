// ==========================================
// Call-Off Management - action log repository
// ==========================================
// Append-only audit trail. Payload is stored as a JSON text column.
// ==========================================

use crate::domain::action_log::{CallOffActionLog, CallOffActionType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// ActionLogRepository
// ==========================================
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, log: &CallOffActionLog) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let payload = match &log.payload_json {
            Some(v) => Some(serde_json::to_string(v).map_err(|e| {
                RepositoryError::InternalError(format!("payload serialization failed: {e}"))
            })?),
            None => None,
        };

        conn.execute(
            r#"INSERT INTO call_off_action_log (
                action_id, call_off_id, action_type, action_ts, actor, payload_json
            ) VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                &log.action_id,
                &log.call_off_id,
                log.action_type.to_db_str(),
                &log.action_ts.format(TS_FORMAT).to_string(),
                &log.actor,
                &payload,
            ],
        )?;

        Ok(())
    }

    /// Full audit trail of one call-off, oldest first
    pub fn find_by_call_off(&self, call_off_id: &str) -> RepositoryResult<Vec<CallOffActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT action_id, call_off_id, action_type, action_ts, actor, payload_json
               FROM call_off_action_log
               WHERE call_off_id = ?
               ORDER BY action_ts, rowid"#,
        )?;

        let logs = stmt
            .query_map(params![call_off_id], map_action_log_row)?
            .collect::<Result<Vec<CallOffActionLog>, _>>()?;

        Ok(logs)
    }
}

fn map_action_log_row(row: &rusqlite::Row) -> rusqlite::Result<CallOffActionLog> {
    let action_raw: String = row.get(2)?;
    let action_type = CallOffActionType::from_db_str(&action_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown action type: {action_raw}").into(),
        )
    })?;

    let payload_json = row
        .get::<_, Option<String>>(5)?
        .and_then(|s| serde_json::from_str(&s).ok());

    Ok(CallOffActionLog {
        action_id: row.get(0)?,
        call_off_id: row.get(1)?,
        action_type,
        action_ts: NaiveDateTime::parse_from_str(&row.get::<_, String>(3)?, TS_FORMAT).map_err(
            |e| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            },
        )?,
        actor: row.get(4)?,
        payload_json,
    })
}
