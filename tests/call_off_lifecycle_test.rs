// ==========================================
// Call-off lifecycle integration tests
// ==========================================
// The NEW -> CONFIRMED -> FULFILLED / CANCELLED state machine through
// the API surface: guards at creation, transition validity, terminal
// immutability, optimistic revision locking.
// ==========================================

mod test_helpers;

use calloff_service::api::{AddLineRequest, ApiError, CreateCallOffRequest, UpdateCallOffRequest};
use calloff_service::domain::CallOffActionType;
use calloff_service::repository::RepositoryError;
use calloff_service::CallOffStatus;
use test_helpers::*;

fn create_request(quota_id: &str, bundle_qty: i64) -> CreateCallOffRequest {
    CreateCallOffRequest {
        quota_id: quota_id.to_string(),
        bundle_qty,
        requested_delivery_date: Some(future_date(21)),
        created_by: "trader.zhang".to_string(),
    }
}

#[test]
fn create_produces_a_new_draft_with_quota_snapshot() {
    let app = setup_app();
    let quota = seed_quota(&app, "Q1", 1000, 5.0);

    let co = app.call_off_api.create(create_request("Q1", 120)).unwrap();

    assert_eq!(co.status, CallOffStatus::New);
    assert_eq!(co.quota_id, "Q1");
    assert_eq!(co.bundle_qty, 120);
    assert_eq!(co.counterparty_id, quota.counterparty_id);
    assert_eq!(co.direction, quota.direction);
    assert_eq!(co.incoterm, quota.incoterm);
    assert_eq!(co.metal_code, quota.metal_code);
    assert_eq!(co.created_by, "trader.zhang");
    assert_eq!(co.revision, 0);
    assert!(co.confirmed_at.is_none());
    assert!(co.cancelled_at.is_none());
    assert!(co.fulfilled_at.is_none());

    // round-trips through the database unchanged
    let loaded = app.call_off_api.get(&co.call_off_id).unwrap();
    assert_eq!(loaded.bundle_qty, 120);
    assert_eq!(loaded.status, CallOffStatus::New);
    assert_eq!(loaded.requested_delivery_date, co.requested_delivery_date);
}

#[test]
fn create_guards() {
    let app = setup_app();
    seed_quota(&app, "Q1", 1000, 5.0);

    // quantity outside the configured range
    assert!(matches!(
        app.call_off_api.create(create_request("Q1", 0)),
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(
        app.call_off_api.create(create_request("Q1", -5)),
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(
        app.call_off_api.create(create_request("Q1", 10_001)),
        Err(ApiError::ValidationError(_))
    ));

    // unknown quota
    assert!(matches!(
        app.call_off_api.create(create_request("Q-NOPE", 10)),
        Err(ApiError::NotFound(_))
    ));

    // missing operator
    let mut req = create_request("Q1", 10);
    req.created_by = "  ".to_string();
    assert!(matches!(
        app.call_off_api.create(req),
        Err(ApiError::ValidationError(_))
    ));
}

#[test]
fn delivery_date_must_be_in_the_future() {
    let app = setup_app();
    seed_quota(&app, "Q1", 1000, 5.0);

    for days in [0i64, -1, -30] {
        let mut req = create_request("Q1", 10);
        req.requested_delivery_date = Some(future_date(days));
        match app.call_off_api.create(req) {
            Err(ApiError::ValidationError(msg)) => {
                assert!(msg.contains("strictly in the future"), "got: {msg}")
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    // omitted date is allowed
    let mut req = create_request("Q1", 10);
    req.requested_delivery_date = None;
    app.call_off_api.create(req).unwrap();
}

#[test]
fn stale_quota_period_is_rejected() {
    let app = setup_app();
    seed_quota_for_period(&app, "Q-OLD", 1000, 5.0, period_months_ago(7));
    seed_quota_for_period(&app, "Q-EDGE", 1000, 5.0, period_months_ago(6));

    match app.call_off_api.create(create_request("Q-OLD", 10)) {
        Err(ApiError::ValidationError(msg)) => assert!(msg.contains("Q-OLD")),
        other => panic!("expected ValidationError, got {other:?}"),
    }

    // exactly at the age window boundary is still drawable
    app.call_off_api.create(create_request("Q-EDGE", 10)).unwrap();
}

#[test]
fn confirm_locks_in_the_draw() {
    let app = setup_app();
    seed_quota(&app, "Q1", 1000, 5.0);

    let co = app.call_off_api.create(create_request("Q1", 200)).unwrap();
    let confirmed = app.call_off_api.confirm(&co.call_off_id, "ops.li").unwrap();

    assert_eq!(confirmed.status, CallOffStatus::Confirmed);
    assert!(confirmed.confirmed_at.is_some());
    assert!(confirmed.revision > co.revision);

    let balance = app.quota_api.get_balance("Q1").unwrap();
    assert_eq!(balance.consumed_tonnes, 200);
    assert_eq!(balance.pending_tonnes, 0);

    // double confirm is an invalid transition
    match app.call_off_api.confirm(&co.call_off_id, "ops.li") {
        Err(ApiError::InvalidTransition { from, to, .. }) => {
            assert_eq!(from, CallOffStatus::Confirmed);
            assert_eq!(to, CallOffStatus::Confirmed);
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
}

#[test]
fn confirmed_call_off_rejects_edits() {
    let app = setup_app();
    seed_quota(&app, "Q1", 1000, 5.0);

    let co = app.call_off_api.create(create_request("Q1", 200)).unwrap();
    app.call_off_api.confirm(&co.call_off_id, "ops.li").unwrap();

    let result = app.call_off_api.update(
        &co.call_off_id,
        UpdateCallOffRequest {
            bundle_qty: Some(300),
            requested_delivery_date: None,
        },
        "trader.zhang",
    );
    match result {
        Err(ApiError::InvalidTransition { from, .. }) => {
            assert_eq!(from, CallOffStatus::Confirmed)
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
}

#[test]
fn no_op_update_is_rejected() {
    let app = setup_app();
    seed_quota(&app, "Q1", 1000, 5.0);
    let co = app.call_off_api.create(create_request("Q1", 10)).unwrap();

    assert!(matches!(
        app.call_off_api
            .update(&co.call_off_id, UpdateCallOffRequest::default(), "trader.zhang"),
        Err(ApiError::ValidationError(_))
    ));
}

#[test]
fn cancel_from_new_records_the_reason() {
    let app = setup_app();
    seed_quota(&app, "Q1", 1000, 5.0);

    let co = app.call_off_api.create(create_request("Q1", 10)).unwrap();
    let cancelled = app
        .call_off_api
        .cancel(&co.call_off_id, Some("duplicate entry".to_string()), "trader.zhang")
        .unwrap();

    assert_eq!(cancelled.status, CallOffStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("duplicate entry"));
    assert!(cancelled.cancelled_at.is_some());

    // terminal: a second cancel is invalid
    match app.call_off_api.cancel(&co.call_off_id, None, "trader.zhang") {
        Err(ApiError::InvalidTransition { from, to, .. }) => {
            assert_eq!(from, CallOffStatus::Cancelled);
            assert_eq!(to, CallOffStatus::Cancelled);
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
}

#[test]
fn fulfill_requires_a_confirmed_call_off() {
    let app = setup_app();
    seed_quota(&app, "Q1", 1000, 5.0);
    let co = app.call_off_api.create(create_request("Q1", 10)).unwrap();

    match app.call_off_api.fulfill(&co.call_off_id, "ops.li") {
        Err(ApiError::InvalidTransition { from, to, .. }) => {
            assert_eq!(from, CallOffStatus::New);
            assert_eq!(to, CallOffStatus::Fulfilled);
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }
}

#[test]
fn fulfilled_call_off_is_immutable() {
    let app = setup_app();
    seed_quota(&app, "Q1", 1000, 5.0);

    let co = app.call_off_api.create(create_request("Q1", 25)).unwrap();
    app.call_off_api.confirm(&co.call_off_id, "ops.li").unwrap();
    app.shipment_api
        .add_line(
            &co.call_off_id,
            AddLineRequest {
                bundle_qty: 25,
                transport_order_id: Some("TO-100".to_string()),
            },
            "ops.li",
        )
        .unwrap();
    let fulfilled = app.call_off_api.fulfill(&co.call_off_id, "ops.li").unwrap();
    assert_eq!(fulfilled.status, CallOffStatus::Fulfilled);
    assert!(fulfilled.fulfilled_at.is_some());

    let update = UpdateCallOffRequest {
        bundle_qty: Some(30),
        requested_delivery_date: None,
    };
    assert!(matches!(
        app.call_off_api.update(&co.call_off_id, update, "trader.zhang"),
        Err(ApiError::InvalidTransition { .. })
    ));
    assert!(matches!(
        app.call_off_api.confirm(&co.call_off_id, "ops.li"),
        Err(ApiError::InvalidTransition { .. })
    ));
    assert!(matches!(
        app.call_off_api.cancel(&co.call_off_id, None, "ops.li"),
        Err(ApiError::InvalidTransition { .. })
    ));
    assert!(matches!(
        app.call_off_api.fulfill(&co.call_off_id, "ops.li"),
        Err(ApiError::InvalidTransition { .. })
    ));

    // consumption stays booked after fulfillment
    let balance = app.quota_api.get_balance("Q1").unwrap();
    assert_eq!(balance.consumed_tonnes, 25);
}

#[test]
fn stale_revision_is_reported_as_a_conflict() {
    let app = setup_app();
    let quota = seed_quota(&app, "Q1", 1000, 5.0);
    let co = app.call_off_api.create(create_request("Q1", 10)).unwrap();

    // a concurrent editor saw revision 0 and writes after someone else
    // already bumped the row
    app.call_off_repo
        .update_admitted(&co.call_off_id, &quota, 15, None, co.revision)
        .unwrap();

    let result = app
        .call_off_repo
        .update_admitted(&co.call_off_id, &quota, 20, None, co.revision);
    match result {
        Err(RepositoryError::StaleRevision {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected StaleRevision, got {other:?}"),
    }

    // the first write stands
    let loaded = app.call_off_api.get(&co.call_off_id).unwrap();
    assert_eq!(loaded.bundle_qty, 15);
}

#[test]
fn action_history_records_every_mutation_in_order() {
    let app = setup_app();
    seed_quota(&app, "Q1", 1000, 5.0);

    let co = app.call_off_api.create(create_request("Q1", 40)).unwrap();
    app.call_off_api
        .update(
            &co.call_off_id,
            UpdateCallOffRequest {
                bundle_qty: Some(60),
                requested_delivery_date: None,
            },
            "trader.zhang",
        )
        .unwrap();
    app.call_off_api.confirm(&co.call_off_id, "ops.li").unwrap();
    app.call_off_api
        .cancel(&co.call_off_id, Some("mill outage".to_string()), "ops.li")
        .unwrap();

    let history = app.call_off_api.action_history(&co.call_off_id).unwrap();
    let actions: Vec<CallOffActionType> = history.iter().map(|e| e.action_type).collect();
    assert_eq!(
        actions,
        vec![
            CallOffActionType::Create,
            CallOffActionType::Update,
            CallOffActionType::Confirm,
            CallOffActionType::Cancel,
        ]
    );
    assert_eq!(history[2].actor, "ops.li");
    assert!(history[3]
        .payload_json
        .as_ref()
        .and_then(|p| p.get("reason"))
        .and_then(|r| r.as_str())
        .map(|r| r.contains("mill outage"))
        .unwrap_or(false));
}
