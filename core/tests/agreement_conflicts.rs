//! Integration tests: one authoritative agreement per vehicle.

use chrono::{DateTime, NaiveDate, Utc};
use fleetdesk_core::{
    engine::ReconEngine,
    model::{Agreement, AgreementStatus, Vehicle},
};

fn agreement(id: &str, vehicle_id: &str, status: AgreementStatus, created_secs: i64) -> Agreement {
    Agreement {
        id:               id.into(),
        agreement_number: format!("AG-{id}"),
        vehicle_id:       vehicle_id.into(),
        customer_id:      format!("cust-{id}"),
        start_date:       NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date:         None,
        status,
        rent_amount:      2500.0,
        daily_late_fee:   None,
        created_at:       DateTime::<Utc>::from_timestamp(1_704_067_200 + created_secs, 0).unwrap(),
    }
}

fn build(vehicles: &[&str]) -> ReconEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = ReconEngine::build_test().unwrap();
    for (i, id) in vehicles.iter().enumerate() {
        engine
            .store
            .insert_vehicle(&Vehicle {
                id:            (*id).into(),
                license_plate: format!("P-{i:03}"),
                make:          "Nissan".into(),
                model:         "Sunny".into(),
            })
            .unwrap();
    }
    engine
}

fn status_of(engine: &ReconEngine, id: &str) -> AgreementStatus {
    engine.store.get_agreement(id).unwrap().unwrap().status
}

/// Two active agreements: the older one is cancelled, the newer stays.
#[test]
fn older_duplicate_is_cancelled() {
    let engine = build(&["veh-v"]);
    engine.store.insert_agreement(&agreement("ag-t1", "veh-v", AgreementStatus::Active, 0)).unwrap();
    engine.store.insert_agreement(&agreement("ag-t2", "veh-v", AgreementStatus::Active, 60)).unwrap();

    let out = engine.reconcile_vehicle_agreements().unwrap();

    assert_eq!(out.vehicles_examined, 1);
    assert_eq!(out.conflicted_vehicles, 1);
    assert_eq!(out.updated_count, 1);
    assert_eq!(out.cancelled, vec!["ag-t1".to_string()]);
    assert!(out.report.is_clean());
    assert_eq!(status_of(&engine, "ag-t1"), AgreementStatus::Cancelled);
    assert_eq!(status_of(&engine, "ag-t2"), AgreementStatus::Active);

    let events = engine.store.events_for_subject("ag-t1").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "agreement_cancelled");
}

/// A second pass finds nothing left to do.
#[test]
fn reconciliation_is_idempotent() {
    let engine = build(&["veh-v"]);
    engine.store.insert_agreement(&agreement("ag-a", "veh-v", AgreementStatus::Active, 0)).unwrap();
    engine.store.insert_agreement(&agreement("ag-b", "veh-v", AgreementStatus::Active, 60)).unwrap();
    engine.store.insert_agreement(&agreement("ag-c", "veh-v", AgreementStatus::Active, 120)).unwrap();

    let first = engine.reconcile_vehicle_agreements().unwrap();
    assert_eq!(first.updated_count, 2);

    let second = engine.reconcile_vehicle_agreements().unwrap();
    assert_eq!(second.updated_count, 0);
    assert_eq!(second.conflicted_vehicles, 0);
    assert_eq!(engine.store.agreement_count(AgreementStatus::Active).unwrap(), 1);
    assert_eq!(status_of(&engine, "ag-c"), AgreementStatus::Active);
}

/// A newer pending-payment booking supersedes an older active agreement.
#[test]
fn pending_payment_competes_with_active() {
    let engine = build(&["veh-v"]);
    engine.store.insert_agreement(&agreement("ag-old", "veh-v", AgreementStatus::Active, 0)).unwrap();
    engine
        .store
        .insert_agreement(&agreement("ag-new", "veh-v", AgreementStatus::PendingPayment, 60))
        .unwrap();

    let out = engine.reconcile_vehicle_agreements().unwrap();
    assert_eq!(out.cancelled, vec!["ag-old".to_string()]);
    assert_eq!(status_of(&engine, "ag-new"), AgreementStatus::PendingPayment);
}

/// Closed agreements and other vehicles are left alone.
#[test]
fn only_competing_statuses_on_the_same_vehicle_conflict() {
    let engine = build(&["veh-v", "veh-w"]);
    engine.store.insert_agreement(&agreement("ag-done", "veh-v", AgreementStatus::Completed, 0)).unwrap();
    engine.store.insert_agreement(&agreement("ag-v", "veh-v", AgreementStatus::Active, 60)).unwrap();
    engine.store.insert_agreement(&agreement("ag-w", "veh-w", AgreementStatus::Active, 30)).unwrap();

    let out = engine.reconcile_vehicle_agreements().unwrap();
    assert_eq!(out.vehicles_examined, 2);
    assert_eq!(out.conflicted_vehicles, 0);
    assert_eq!(out.updated_count, 0);
    assert_eq!(status_of(&engine, "ag-done"), AgreementStatus::Completed);
    assert_eq!(status_of(&engine, "ag-v"), AgreementStatus::Active);
    assert_eq!(status_of(&engine, "ag-w"), AgreementStatus::Active);
}

#[test]
fn identical_timestamps_keep_the_larger_id() {
    let engine = build(&["veh-v"]);
    engine.store.insert_agreement(&agreement("ag-1", "veh-v", AgreementStatus::Active, 0)).unwrap();
    engine.store.insert_agreement(&agreement("ag-2", "veh-v", AgreementStatus::Active, 0)).unwrap();

    let out = engine.reconcile_vehicle_agreements().unwrap();
    assert_eq!(out.cancelled, vec!["ag-1".to_string()]);
}
