//! Integration tests: special payments and late fee accounting.

use chrono::{DateTime, NaiveDate, Utc};
use fleetdesk_core::{
    config::{LateFeePolicy, ReconConfig},
    engine::ReconEngine,
    error::{CoreError, CoreResult, ErrorKind},
    late_fee::LateFee,
    model::{
        Agreement, AgreementStatus, AssignmentStatus, EntryType, FineAssignmentPatch, LedgerEntry,
        LedgerPatch, NewLedgerEntry, PaymentStatus, TrafficFine, Vehicle,
    },
    port::ReconPort,
    special_payment::{record_special_payment, PaymentBranch, SpecialPaymentOptions},
    store::SqliteStore,
    types::EntityId,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn lease(id: &str, rent: f64) -> Agreement {
    Agreement {
        id:               id.into(),
        agreement_number: format!("AG-{id}"),
        vehicle_id:       "veh-1".into(),
        customer_id:      "cust-1".into(),
        start_date:       date(2024, 1, 1),
        end_date:         None,
        status:           AgreementStatus::Active,
        rent_amount:      rent,
        daily_late_fee:   Some(120.0),
        created_at:       DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap(),
    }
}

fn seeded_store(store: &SqliteStore) {
    store
        .insert_vehicle(&Vehicle {
            id:            "veh-1".into(),
            license_plate: "ABC-123".into(),
            make:          "Toyota".into(),
            model:         "Corolla".into(),
        })
        .unwrap();
    store.insert_agreement(&lease("lease-1", 1000.0)).unwrap();
    store.insert_agreement(&lease("lease-2", 1500.0)).unwrap();
}

fn build() -> ReconEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = ReconEngine::build_test().unwrap();
    seeded_store(&engine.store);
    engine
}

/// An existing rent entry with `paid` already applied.
fn existing_entry(engine: &ReconEngine, lease_id: &str, amount: f64, paid: f64) -> EntityId {
    engine
        .store
        .insert_new_ledger_entry(&NewLedgerEntry {
            lease_id:          lease_id.into(),
            entry_type:        EntryType::Rent,
            amount,
            amount_paid:       paid,
            balance:           amount - paid,
            status:            PaymentStatus::PartiallyPaid,
            payment_date:      Some(date(2024, 3, 2)),
            original_due_date: Some(date(2024, 3, 1)),
            days_overdue:      0,
            late_fine_amount:  0.0,
            payment_method:    Some("cash".into()),
            description:       Some("Rent payment for March 2024".into()),
        })
        .unwrap()
}

fn entries_of(engine: &ReconEngine, lease_id: &str, kind: EntryType) -> Vec<LedgerEntry> {
    engine
        .store
        .ledger_entries_for_lease(lease_id)
        .unwrap()
        .into_iter()
        .filter(|e| e.entry_type == kind)
        .collect()
}

// ── New entries ───────────────────────────────────────────────────

/// Paying on the 15th creates a rent entry carrying 14 days of late fine
/// and a separate, fully settled LATE_PAYMENT_FEE entry.
#[test]
fn late_payment_creates_rent_and_fee_entries() {
    let engine = build();
    let options = SpecialPaymentOptions {
        include_late_payment_fee: true,
        payment_method: Some("card".into()),
        ..Default::default()
    };

    let receipt = engine
        .record_special_payment("lease-1", 1000.0, date(2024, 3, 15), &options)
        .unwrap();

    assert_eq!(receipt.branch, PaymentBranch::CreatedNew);
    assert_eq!(receipt.late_fee.days_late, 14);
    assert_eq!(receipt.late_fee.fee_amount, 1680.0);
    assert!(receipt.late_fee_entry_id.is_some());

    let rent = entries_of(&engine, "lease-1", EntryType::Rent);
    assert_eq!(rent.len(), 1);
    let rent = &rent[0];
    assert_eq!(rent.id, receipt.entry_id);
    assert_eq!(rent.amount, 1000.0);
    assert_eq!(rent.amount_paid, 1000.0);
    assert_eq!(rent.balance, 0.0);
    assert_eq!(rent.status, PaymentStatus::Completed);
    assert_eq!(rent.days_overdue, 14);
    assert_eq!(rent.late_fine_amount, 1680.0);
    assert_eq!(rent.original_due_date, Some(date(2024, 3, 1)));
    assert_eq!(rent.payment_method.as_deref(), Some("card"));
    assert!(rent.id.starts_with("pay-"));

    let fees = entries_of(&engine, "lease-1", EntryType::LatePaymentFee);
    assert_eq!(fees.len(), 1);
    let fee = &fees[0];
    assert_eq!(Some(&fee.id), receipt.late_fee_entry_id.as_ref());
    assert_eq!(fee.amount, 1680.0);
    assert_eq!(fee.amount_paid, 1680.0);
    assert_eq!(fee.balance, 0.0);
    assert_eq!(fee.status, PaymentStatus::Completed);
    assert_eq!(
        fee.description.as_deref(),
        Some("Late payment fee for March 2024 (14 days late)")
    );

    assert_eq!(engine.store.event_count("payment_recorded").unwrap(), 1);
    assert_eq!(engine.store.event_count("late_payment_fee_recorded").unwrap(), 1);
}

/// The fee is capped at 3000 even after 29 days; without the flag no
/// separate fee entry is written but the rent entry still records it.
#[test]
fn capped_fee_is_recorded_on_rent_entry_without_separate_line() {
    let engine = build();
    let receipt = engine
        .record_special_payment("lease-1", 1000.0, date(2024, 4, 30), &SpecialPaymentOptions::default())
        .unwrap();

    assert_eq!(receipt.late_fee.days_late, 29);
    assert_eq!(receipt.late_fee.fee_amount, 3000.0);
    assert!(receipt.late_fee_entry_id.is_none());
    assert!(entries_of(&engine, "lease-1", EntryType::LatePaymentFee).is_empty());

    let rent = &entries_of(&engine, "lease-1", EntryType::Rent)[0];
    assert_eq!(rent.late_fine_amount, 3000.0);
    assert_eq!(engine.store.event_count("late_payment_fee_recorded").unwrap(), 0);
}

/// A payment on the 1st is on time; the fee flag has nothing to charge.
#[test]
fn payment_on_first_of_month_charges_nothing() {
    let engine = build();
    let options = SpecialPaymentOptions {
        include_late_payment_fee: true,
        ..Default::default()
    };
    let receipt = engine
        .record_special_payment("lease-1", 1000.0, date(2024, 5, 1), &options)
        .unwrap();

    assert_eq!(receipt.late_fee.days_late, 0);
    assert_eq!(receipt.late_fee.fee_amount, 0.0);
    assert!(receipt.late_fee_entry_id.is_none());
    assert_eq!(engine.store.ledger_entry_count("lease-1").unwrap(), 1);
}

#[test]
fn partial_first_payment_leaves_balance_open() {
    let engine = build();
    let options = SpecialPaymentOptions {
        is_partial_payment: true,
        ..Default::default()
    };
    let receipt = engine
        .record_special_payment("lease-1", 400.0, date(2024, 3, 1), &options)
        .unwrap();

    assert_eq!(receipt.update.status(), PaymentStatus::PartiallyPaid);
    let rent = engine.store.get_ledger_entry(&receipt.entry_id).unwrap().unwrap();
    assert_eq!(rent.amount, 1000.0);
    assert_eq!(rent.amount_paid, 400.0);
    assert_eq!(rent.balance, 600.0);
    assert_eq!(rent.status, PaymentStatus::PartiallyPaid);
}

#[test]
fn contractual_amount_overrides_agreement_rent() {
    let engine = build();
    let options = SpecialPaymentOptions {
        is_partial_payment: true,
        contractual_amount: Some(1200.0),
        ..Default::default()
    };
    let receipt = engine
        .record_special_payment("lease-1", 1000.0, date(2024, 3, 1), &options)
        .unwrap();

    let rent = engine.store.get_ledger_entry(&receipt.entry_id).unwrap().unwrap();
    assert_eq!(rent.amount, 1200.0);
    assert_eq!(rent.balance, 200.0);
}

// ── Existing entries ──────────────────────────────────────────────

/// 400 of 1000 paid, 600 more settles the entry.
#[test]
fn payment_settles_existing_entry() {
    let engine = build();
    let target = existing_entry(&engine, "lease-1", 1000.0, 400.0);
    let options = SpecialPaymentOptions {
        target_payment_id: Some(target.clone()),
        include_late_payment_fee: true,
        ..Default::default()
    };

    let receipt = engine
        .record_special_payment("lease-1", 600.0, date(2024, 3, 20), &options)
        .unwrap();

    assert_eq!(receipt.branch, PaymentBranch::UpdatedExisting);
    assert_eq!(receipt.entry_id, target);
    // Late fees are never re-applied to an existing entry.
    assert!(receipt.late_fee_entry_id.is_none());
    assert_eq!(receipt.late_fee, LateFee::NONE);

    let entry = engine.store.get_ledger_entry(&target).unwrap().unwrap();
    assert_eq!(entry.amount_paid, 1000.0);
    assert_eq!(entry.balance, 0.0);
    assert_eq!(entry.status, PaymentStatus::Completed);
    assert_eq!(entry.payment_date, Some(date(2024, 3, 20)));
    assert_eq!(engine.store.ledger_entry_count("lease-1").unwrap(), 1);

    let events = engine.store.events_for_subject(&target).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "payment_recorded");
    assert!(events[0].payload.contains("\"updated_existing\":true"));
}

/// 300 of 1000 paid, 200 more leaves 500 outstanding. The pending target
/// hint is honoured when no explicit target is given.
#[test]
fn pending_target_receives_partial_payment() {
    let engine = build();
    let target = existing_entry(&engine, "lease-1", 1000.0, 300.0);
    let options = SpecialPaymentOptions {
        pending_target_id: Some(target.clone()),
        ..Default::default()
    };

    engine
        .record_special_payment("lease-1", 200.0, date(2024, 3, 10), &options)
        .unwrap();

    let entry = engine.store.get_ledger_entry(&target).unwrap().unwrap();
    assert_eq!(entry.amount_paid, 500.0);
    assert_eq!(entry.balance, 500.0);
    assert_eq!(entry.status, PaymentStatus::PartiallyPaid);
}

#[test]
fn explicit_target_wins_over_pending_hint() {
    let engine = build();
    let explicit = existing_entry(&engine, "lease-1", 1000.0, 0.0);
    let hinted = existing_entry(&engine, "lease-1", 1000.0, 0.0);
    let options = SpecialPaymentOptions {
        target_payment_id: Some(explicit.clone()),
        pending_target_id: Some(hinted.clone()),
        ..Default::default()
    };

    engine
        .record_special_payment("lease-1", 250.0, date(2024, 3, 10), &options)
        .unwrap();

    assert_eq!(engine.store.get_ledger_entry(&explicit).unwrap().unwrap().amount_paid, 250.0);
    assert_eq!(engine.store.get_ledger_entry(&hinted).unwrap().unwrap().amount_paid, 0.0);
}

/// 900 of 1000 paid: a 500 payment would overshoot and is refused.
#[test]
fn payment_above_remaining_balance_is_rejected() {
    let engine = build();
    let target = existing_entry(&engine, "lease-1", 1000.0, 900.0);
    let options = SpecialPaymentOptions {
        target_payment_id: Some(target.clone()),
        ..Default::default()
    };

    let err = engine
        .record_special_payment("lease-1", 500.0, date(2024, 3, 10), &options)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let entry = engine.store.get_ledger_entry(&target).unwrap().unwrap();
    assert_eq!(entry.amount_paid, 900.0);
    assert_eq!(entry.balance, 100.0);
    assert_eq!(engine.store.event_count("payment_recorded").unwrap(), 0);

    // Exactly the remainder is still accepted.
    engine
        .record_special_payment("lease-1", 100.0, date(2024, 3, 10), &options)
        .unwrap();
    assert_eq!(engine.store.get_ledger_entry(&target).unwrap().unwrap().status, PaymentStatus::Completed);
}

// ── Rejections ────────────────────────────────────────────────────

#[test]
fn non_positive_amount_is_rejected_before_any_write() {
    let engine = build();
    for amount in [0.0, -50.0, f64::NAN] {
        let err = engine
            .record_special_payment("lease-1", amount, date(2024, 3, 10), &SpecialPaymentOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "amount {amount}");
    }
    assert_eq!(engine.store.ledger_entry_count("lease-1").unwrap(), 0);
    assert_eq!(engine.store.event_count("payment_recorded").unwrap(), 0);
}

#[test]
fn unknown_target_is_not_found() {
    let engine = build();
    let options = SpecialPaymentOptions {
        target_payment_id: Some("pay-missing".into()),
        ..Default::default()
    };
    let err = engine
        .record_special_payment("lease-1", 100.0, date(2024, 3, 10), &options)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(engine.store.ledger_entry_count("lease-1").unwrap(), 0);
}

#[test]
fn target_from_another_lease_is_rejected() {
    let engine = build();
    let foreign = existing_entry(&engine, "lease-2", 1500.0, 0.0);
    let options = SpecialPaymentOptions {
        target_payment_id: Some(foreign.clone()),
        ..Default::default()
    };
    let err = engine
        .record_special_payment("lease-1", 100.0, date(2024, 3, 10), &options)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(engine.store.get_ledger_entry(&foreign).unwrap().unwrap().amount_paid, 0.0);
}

/// A settled entry takes no further payments.
#[test]
fn completed_target_is_rejected() {
    let engine = build();
    let target = existing_entry(&engine, "lease-1", 1000.0, 400.0);
    let options = SpecialPaymentOptions {
        target_payment_id: Some(target.clone()),
        ..Default::default()
    };
    engine
        .record_special_payment("lease-1", 600.0, date(2024, 3, 10), &options)
        .unwrap();

    let err = engine
        .record_special_payment("lease-1", 600.0, date(2024, 3, 12), &options)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let entry = engine.store.get_ledger_entry(&target).unwrap().unwrap();
    assert_eq!(entry.amount_paid, 1000.0);
    assert_eq!(entry.payment_date, Some(date(2024, 3, 10)));
    assert_eq!(engine.store.event_count("payment_recorded").unwrap(), 1);
}

#[test]
fn unknown_lease_is_not_found() {
    let engine = build();
    let err = engine
        .record_special_payment("lease-404", 100.0, date(2024, 3, 10), &SpecialPaymentOptions::default())
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "lease", .. }));
}

// ── Partial failure ───────────────────────────────────────────────

/// Delegates to a real store but refuses LATE_PAYMENT_FEE inserts.
struct FeeInsertFails(SqliteStore);

impl ReconPort for FeeInsertFails {
    fn fetch_lease(&self, id: &str) -> CoreResult<Option<Agreement>> {
        self.0.fetch_lease(id)
    }
    fn list_active_leases_for_vehicle(&self, vehicle_id: &str) -> CoreResult<Vec<Agreement>> {
        self.0.list_active_leases_for_vehicle(vehicle_id)
    }
    fn list_agreements_with_status(&self, statuses: &[AgreementStatus]) -> CoreResult<Vec<Agreement>> {
        self.0.list_agreements_with_status(statuses)
    }
    fn update_lease_status(&self, id: &str, status: AgreementStatus) -> CoreResult<()> {
        self.0.update_lease_status(id, status)
    }
    fn fetch_vehicle_id_by_plate(&self, plate: &str) -> CoreResult<Option<EntityId>> {
        self.0.fetch_vehicle_id_by_plate(plate)
    }
    fn fetch_ledger_entry(&self, id: &str) -> CoreResult<Option<LedgerEntry>> {
        self.0.fetch_ledger_entry(id)
    }
    fn list_ledger_entries_for_lease(&self, lease_id: &str) -> CoreResult<Vec<LedgerEntry>> {
        self.0.list_ledger_entries_for_lease(lease_id)
    }
    fn list_open_ledger_entries(&self) -> CoreResult<Vec<LedgerEntry>> {
        self.0.list_open_ledger_entries()
    }
    fn insert_ledger_entry(&self, entry: &NewLedgerEntry) -> CoreResult<EntityId> {
        if entry.entry_type == EntryType::LatePaymentFee {
            return Err(CoreError::Other(anyhow::anyhow!("backend unavailable")));
        }
        self.0.insert_ledger_entry(entry)
    }
    fn update_ledger_entry(&self, id: &str, patch: &LedgerPatch) -> CoreResult<()> {
        self.0.update_ledger_entry(id, patch)
    }
    fn fetch_fine(&self, id: &str) -> CoreResult<Option<TrafficFine>> {
        self.0.fetch_fine(id)
    }
    fn list_fines_by_assignment(&self, status: AssignmentStatus) -> CoreResult<Vec<TrafficFine>> {
        self.0.list_fines_by_assignment(status)
    }
    fn update_fine_assignment(&self, id: &str, patch: &FineAssignmentPatch) -> CoreResult<()> {
        self.0.update_fine_assignment(id, patch)
    }
}

/// The rent entry stays written and the error names it.
#[test]
fn failed_fee_insert_reports_the_recorded_rent_entry() {
    let store = SqliteStore::in_memory().unwrap();
    store.migrate().unwrap();
    seeded_store(&store);
    let port = FeeInsertFails(store);
    let options = SpecialPaymentOptions {
        include_late_payment_fee: true,
        ..Default::default()
    };

    let err = record_special_payment(
        &port,
        &LateFeePolicy::default(),
        "lease-1",
        1000.0,
        date(2024, 3, 15),
        &options,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);

    let entries = port.0.ledger_entries_for_lease("lease-1").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, EntryType::Rent);
    assert!(err.to_string().contains(&entries[0].id));

    let CoreError::LateFeeNotRecorded { receipt, .. } = &err else {
        panic!("expected LateFeeNotRecorded, got {err:?}");
    };
    assert_eq!(receipt.entry_id, entries[0].id);
    assert_eq!(receipt.branch, PaymentBranch::CreatedNew);
    assert_eq!(receipt.late_fee.fee_amount, 1680.0);
    assert!(receipt.late_fee_entry_id.is_none());
}

/// Through the engine: the fee insert is aborted by the database, yet the
/// rent entry that did land still gets its payment_recorded audit event.
#[test]
fn failed_fee_insert_still_audits_the_rent_payment() {
    let _ = env_logger::builder().is_test(true).try_init();
    let uri = format!("file:fee_fail_{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
    let store = SqliteStore::open(&uri).unwrap();
    store.migrate().unwrap();
    seeded_store(&store);

    let admin = rusqlite::Connection::open_with_flags(
        &uri,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE | rusqlite::OpenFlags::SQLITE_OPEN_URI,
    )
    .unwrap();
    admin
        .execute_batch(
            "CREATE TRIGGER block_fee BEFORE INSERT ON ledger_entry
             WHEN NEW.entry_type = 'LATE_PAYMENT_FEE'
             BEGIN SELECT RAISE(ABORT, 'fee ledger offline'); END;",
        )
        .unwrap();

    let engine = ReconEngine::new(store, ReconConfig::default_test());
    let options = SpecialPaymentOptions {
        include_late_payment_fee: true,
        ..Default::default()
    };
    let err = engine
        .record_special_payment("lease-1", 1000.0, date(2024, 3, 15), &options)
        .unwrap_err();
    assert!(matches!(err, CoreError::LateFeeNotRecorded { .. }));

    assert_eq!(engine.store.ledger_entry_count("lease-1").unwrap(), 1);
    assert_eq!(engine.store.event_count("payment_recorded").unwrap(), 1);
    assert_eq!(engine.store.event_count("late_payment_fee_recorded").unwrap(), 0);
    drop(admin);
}
