// ==========================================
// Test helpers
// ==========================================
// Responsibility: temp database setup, fixture seeding, wired-up API
// instances for integration tests
// ==========================================

#![allow(dead_code)]

use std::error::Error;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::Connection;
use tempfile::NamedTempFile;

use calloff_service::api::{CallOffApi, QuotaApi, ShipmentLineApi};
use calloff_service::config::BusinessLimits;
use calloff_service::db;
use calloff_service::domain::types::Direction;
use calloff_service::domain::Quota;
use calloff_service::repository::{
    ActionLogRepository, CallOffRepository, QuotaRepository, ShipmentLineRepository,
};

/// Everything an integration test needs, wired against one temp database
pub struct TestApp {
    _temp_file: NamedTempFile,
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub quota_repo: Arc<QuotaRepository>,
    pub call_off_repo: Arc<CallOffRepository>,
    pub shipment_line_repo: Arc<ShipmentLineRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
    pub call_off_api: CallOffApi,
    pub quota_api: QuotaApi,
    pub shipment_api: ShipmentLineApi,
}

/// Create a temp database with the full schema and wire up the APIs
pub fn setup_app() -> TestApp {
    setup_app_with_limits(BusinessLimits::default())
}

pub fn setup_app_with_limits(limits: BusinessLimits) -> TestApp {
    calloff_service::logging::init_test();

    let (temp_file, db_path) = create_test_db().expect("test database setup failed");
    let conn = db::open_sqlite_connection(&db_path).expect("open test connection failed");
    let conn = Arc::new(Mutex::new(conn));

    let quota_repo = Arc::new(QuotaRepository::new(Arc::clone(&conn)));
    let call_off_repo = Arc::new(CallOffRepository::new(Arc::clone(&conn)));
    let shipment_line_repo = Arc::new(ShipmentLineRepository::new(Arc::clone(&conn)));
    let action_log_repo = Arc::new(ActionLogRepository::new(Arc::clone(&conn)));

    let call_off_api = CallOffApi::new(
        Arc::clone(&quota_repo),
        Arc::clone(&call_off_repo),
        Arc::clone(&action_log_repo),
        limits,
    );
    let quota_api = QuotaApi::new(Arc::clone(&quota_repo), Arc::clone(&call_off_repo));
    let shipment_api = ShipmentLineApi::new(
        Arc::clone(&call_off_repo),
        Arc::clone(&shipment_line_repo),
        Arc::clone(&action_log_repo),
    );

    TestApp {
        _temp_file: temp_file,
        db_path,
        conn,
        quota_repo,
        call_off_repo,
        shipment_line_repo,
        action_log_repo,
        call_off_api,
        quota_api,
        shipment_api,
    }
}

/// Create a temp database file and initialize the schema
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// First day of the current settlement month
pub fn current_period() -> NaiveDate {
    let today = chrono::Local::now().date_naive();
    NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap()
}

/// A settlement month `months` calendar months before the current one
pub fn period_months_ago(months: i32) -> NaiveDate {
    let current = current_period();
    let idx = current.year() * 12 + current.month0() as i32 - months;
    NaiveDate::from_ymd_opt(idx.div_euclid(12), idx.rem_euclid(12) as u32 + 1, 1).unwrap()
}

/// A delivery date `days` days in the future
pub fn future_date(days: i64) -> NaiveDate {
    chrono::Local::now().date_naive() + Duration::days(days)
}

/// Seed a BUY quota for the current settlement month
pub fn seed_quota(app: &TestApp, quota_id: &str, quantity_tonnes: i64, tolerance_pct: f64) -> Quota {
    seed_quota_for_period(app, quota_id, quantity_tonnes, tolerance_pct, current_period())
}

pub fn seed_quota_for_period(
    app: &TestApp,
    quota_id: &str,
    quantity_tonnes: i64,
    tolerance_pct: f64,
    period: NaiveDate,
) -> Quota {
    let quota = Quota {
        quota_id: quota_id.to_string(),
        counterparty_id: "CP-GLENCORE".to_string(),
        direction: Direction::Buy,
        period,
        quantity_tonnes,
        tolerance_pct,
        incoterm: "FOB".to_string(),
        metal_code: "CU".to_string(),
        created_at: chrono::Local::now().naive_local(),
    };
    app.quota_repo.insert(&quota).expect("quota seed failed");
    quota
}
