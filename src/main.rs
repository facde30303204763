// ==========================================
// Call-Off Management - service entry point
// ==========================================
// Bootstraps logging and the SQLite database; the HTTP layer mounts the
// API structs from here.
// ==========================================

use calloff_service::{db, logging};

fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", calloff_service::APP_NAME, calloff_service::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::var("CALLOFF_DB").unwrap_or_else(|_| "calloff.db".to_string());
    tracing::info!("using database: {}", db_path);

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    match db::read_schema_version(&conn)? {
        Some(v) if v == db::CURRENT_SCHEMA_VERSION => {
            tracing::info!("schema version {} ok", v);
        }
        Some(v) => {
            tracing::warn!(
                "schema version mismatch: database {} vs expected {}",
                v,
                db::CURRENT_SCHEMA_VERSION
            );
        }
        None => tracing::warn!("schema version table missing"),
    }

    tracing::info!("database ready");
    Ok(())
}
