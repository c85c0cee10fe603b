//! PostgreSQL store tests.
//!
//! These need Docker for the Postgres container:
//! `cargo test --test postgres_store_tests -- --ignored`

mod common;

use chrono::{Duration, Utc};
use common::*;
use dispatch_core::common::PartnerId;
use dispatch_core::domains::dispatch::models::{
    DispatchAttempt, NewDispatchAttempt, Partner, RequestLogEntry, RequestStatus, ServiceKind,
};
use dispatch_core::domains::dispatch::{DispatchEngine, DispatchOutcome, DispatchTrigger};
use dispatch_core::domains::presence::PresenceCollection;
use dispatch_core::kernel::{BaseDispatchStore, ServerDeps, TestDependencies};
use std::sync::Arc;
use test_context::test_context;
use tokio_test::assert_ok;

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn request_round_trips_through_postgres(ctx: &TestHarness) {
    let store = ctx.store();
    let mut ride = ride_request();
    ride.service_class = Some("auto".to_string());
    ride.insert(ServiceKind::Ride, &ctx.db_pool).await.unwrap();

    let found = assert_ok!(store.find_request(ServiceKind::Ride, ride.id).await).unwrap();

    assert_eq!(found.id, ride.id);
    assert_eq!(found.status, RequestStatus::Searching);
    assert_eq!(found.service_class.as_deref(), Some("auto"));
    assert_eq!(found.details["riderName"], "Meera");
    assert!(found.rejected_by.is_empty());

    // Other kinds live in other tables
    assert!(store
        .find_request(ServiceKind::Garage, ride.id)
        .await
        .unwrap()
        .is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn terminal_write_is_guarded(ctx: &TestHarness) {
    let store = ctx.store();
    let service = service_request();
    service.insert(ServiceKind::Garage, &ctx.db_pool).await.unwrap();

    let applied = store
        .mark_terminal(ServiceKind::Garage, service.id, &RequestStatus::NoMechanicsAvailable)
        .await
        .unwrap();
    assert!(applied);

    // Already terminal: a second write does nothing
    let applied = store
        .mark_terminal(ServiceKind::Garage, service.id, &RequestStatus::DispatchError)
        .await
        .unwrap();
    assert!(!applied);

    let stored = store
        .find_request(ServiceKind::Garage, service.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::NoMechanicsAvailable);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn terminal_write_does_not_touch_assigned_request(ctx: &TestHarness) {
    let store = ctx.store();
    let mut ride = ride_request();
    ride.assigned_partner_id = Some(PartnerId::new());
    ride.insert(ServiceKind::Ride, &ctx.db_pool).await.unwrap();

    let applied = store
        .mark_terminal(ServiceKind::Ride, ride.id, &RequestStatus::NoDriversAvailable)
        .await
        .unwrap();

    assert!(!applied);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn rejections_append_in_order_without_duplicates(ctx: &TestHarness) {
    let store = ctx.store();
    let case = emergency_case();
    case.insert(ServiceKind::Emergency, &ctx.db_pool).await.unwrap();
    let first = PartnerId::new();
    let second = PartnerId::new();

    let updated = store
        .append_rejection(ServiceKind::Emergency, case.id, first)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.rejected_by, vec![first]);
    assert_eq!(updated.dispatcher_rejected_by, vec![first]);

    let duplicate = store
        .append_rejection(ServiceKind::Emergency, case.id, first)
        .await
        .unwrap();
    assert!(duplicate.is_none());

    let updated = store
        .append_rejection(ServiceKind::Emergency, case.id, second)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.rejected_by, vec![first, second]);

    store
        .mark_terminal(ServiceKind::Emergency, case.id, &RequestStatus::AllPartnersBusy)
        .await
        .unwrap();
    let after_terminal = store
        .append_rejection(ServiceKind::Emergency, case.id, PartnerId::new())
        .await
        .unwrap();
    assert!(after_terminal.is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn attempts_are_numbered_per_request(ctx: &TestHarness) {
    let store = ctx.store();
    let service = service_request();
    service.insert(ServiceKind::Garage, &ctx.db_pool).await.unwrap();

    for outcome in ["send_failed", "notified"] {
        store
            .record_attempt(&NewDispatchAttempt {
                kind: ServiceKind::Garage,
                request_id: service.id,
                partner_ids: vec![PartnerId::new()],
                outcome: outcome.to_string(),
            })
            .await
            .unwrap();
    }

    assert_eq!(
        store.count_attempts(ServiceKind::Garage, service.id).await.unwrap(),
        2
    );
    assert_eq!(
        store.count_attempts(ServiceKind::Ride, service.id).await.unwrap(),
        0
    );

    let attempts = DispatchAttempt::find_by_request(ServiceKind::Garage, service.id, &ctx.db_pool)
        .await
        .unwrap();
    let numbered: Vec<_> = attempts
        .iter()
        .map(|a| (a.attempt_number, a.outcome.as_str()))
        .collect();
    assert_eq!(numbered, vec![(1, "send_failed"), (2, "notified")]);
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn log_entries_are_appended_oldest_first(ctx: &TestHarness) {
    let store = ctx.store();
    let case = emergency_case();
    case.insert(ServiceKind::Emergency, &ctx.db_pool).await.unwrap();

    let now = Utc::now();
    for (offset, message) in [(0, "first"), (1, "second")] {
        store
            .append_log(
                ServiceKind::Emergency,
                case.id,
                &RequestLogEntry {
                    timestamp: now + Duration::seconds(offset),
                    message: message.to_string(),
                    before: case.snapshot(),
                    after: case.snapshot(),
                },
            )
            .await
            .unwrap();
    }

    let logs = RequestLogEntry::find_by_request(ServiceKind::Emergency, case.id, &ctx.db_pool)
        .await
        .unwrap();
    let messages: Vec<_> = logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "second"]);
    assert_eq!(logs[0].after["id"], serde_json::json!(case.id));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn women_only_filter_runs_in_query(ctx: &TestHarness) {
    let store = ctx.store();
    let certified = Partner {
        gender: Some("Female".to_string()),
        women_only_certified: true,
        ..partner_km_away(1.0)
    };
    let uncertified = Partner {
        gender: Some("female".to_string()),
        ..partner_km_away(1.0)
    };
    certified.insert(ServiceKind::Ride, &ctx.db_pool).await.unwrap();
    uncertified.insert(ServiceKind::Ride, &ctx.db_pool).await.unwrap();

    let ids: Vec<PartnerId> = store
        .find_online_partners(ServiceKind::Ride, true)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();

    assert!(ids.contains(&certified.id));
    assert!(!ids.contains(&uncertified.id));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn sweep_takes_stale_partners_offline(ctx: &TestHarness) {
    let store = ctx.store();
    let now = Utc::now();
    let stale = partner_last_seen(now - Duration::minutes(3));
    let fresh = partner_last_seen(now - Duration::seconds(30));
    stale.insert(ServiceKind::Garage, &ctx.db_pool).await.unwrap();
    fresh.insert(ServiceKind::Garage, &ctx.db_pool).await.unwrap();

    let swept = store
        .sweep_presence(PresenceCollection::Mechanics, now - Duration::minutes(2))
        .await
        .unwrap();
    assert!(swept >= 1);

    let online: Vec<PartnerId> = store
        .find_online_partners(ServiceKind::Garage, false)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert!(!online.contains(&stale.id));
    assert!(online.contains(&fresh.id));
}

#[test_context(TestHarness)]
#[tokio::test]
#[ignore] // Requires Docker
async fn engine_dispatches_against_postgres(ctx: &TestHarness) {
    let mocks = TestDependencies::new();
    let deps = ServerDeps::new(
        Arc::new(ctx.store()),
        mocks.push_service.clone(),
        mocks.geocoder.clone(),
        mocks.webhook.clone(),
        mocks.policy.clone(),
    );

    let service = service_request();
    service.insert(ServiceKind::Garage, &ctx.db_pool).await.unwrap();
    let unreachable = tokenless_partner_km_away(0.5);
    unreachable.insert(ServiceKind::Garage, &ctx.db_pool).await.unwrap();

    let outcomes = DispatchEngine::new(deps)
        .handle(DispatchTrigger::Created {
            kind: ServiceKind::Garage,
            request: service.clone(),
        })
        .await
        .unwrap();

    // The tokenless mechanic is the nearest in this test, and is rejected first
    assert!(matches!(
        outcomes.first(),
        Some(DispatchOutcome::SyntheticRejection { partner_id, .. }) if *partner_id == unreachable.id
    ));

    let stored = ctx
        .store()
        .find_request(ServiceKind::Garage, service.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.rejected_by.contains(&unreachable.id));
    assert!(stored.dispatcher_rejected_by.contains(&unreachable.id));
    assert_eq!(
        stored.location_address.as_deref(),
        Some("221B Baker Street, London")
    );
}
