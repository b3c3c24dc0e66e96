//! Deterministic demo fleet for batch runs.
//!
//! Same seed, same fleet: plates, lease periods, payments, and fines are
//! all drawn from one PCG stream so a run can be reproduced exactly.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use fleetdesk_core::{
    engine::ReconEngine,
    model::{
        Agreement, AgreementStatus, AssignmentStatus, EntryType, FinePaymentStatus, NewLedgerEntry,
        PaymentStatus, TrafficFine, Vehicle,
    },
    special_payment::SpecialPaymentOptions,
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

const MAKES: &[(&str, &str)] = &[
    ("Toyota", "Corolla"),
    ("Hyundai", "Elantra"),
    ("Kia", "Sportage"),
    ("Nissan", "Sunny"),
    ("Ford", "Transit"),
];

#[derive(Debug, Default)]
pub struct DemoSummary {
    pub vehicles:   usize,
    pub agreements: usize,
    pub entries:    usize,
    pub fines:      usize,
}

pub fn seed_demo_fleet(engine: &ReconEngine, seed: u64, vehicle_count: usize) -> Result<DemoSummary> {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let mut summary = DemoSummary::default();
    let year_start = date(2024, 1, 1)?;
    let mut created_seq: i64 = 0;

    for v in 0..vehicle_count {
        let (make, model) = MAKES[rng.gen_range(0..MAKES.len())];
        let vehicle = Vehicle {
            id:            format!("veh-{v:04}"),
            license_plate: format!("FD-{:04}", rng.gen_range(1000..10000) + v * 10_000),
            make:          make.into(),
            model:         model.into(),
        };
        engine.store.insert_vehicle(&vehicle)?;
        summary.vehicles += 1;

        // Back-to-back leases; the last one is open-ended.
        let lease_count = rng.gen_range(1..=3);
        let mut start = year_start + Duration::days(rng.gen_range(0..30));
        for l in 0..lease_count {
            let last = l + 1 == lease_count;
            let end = (!last).then(|| start + Duration::days(rng.gen_range(45..120)));
            created_seq += 1;
            let agreement = Agreement {
                id:               format!("lease-{v:04}-{l}"),
                agreement_number: format!("AG-{:05}", created_seq),
                vehicle_id:       vehicle.id.clone(),
                customer_id:      format!("cust-{:04}", rng.gen_range(0..vehicle_count * 3)),
                start_date:       start,
                end_date:         end,
                status:           AgreementStatus::Active,
                rent_amount:      f64::from(rng.gen_range(20..60u32)) * 100.0,
                daily_late_fee:   rng.gen_bool(0.8).then_some(120.0),
                created_at:       created_at(created_seq),
            };
            engine.store.insert_agreement(&agreement)?;
            summary.agreements += 1;

            if last {
                summary.entries += seed_payments(engine, &mut rng, &agreement)?;
            }
            if let Some(end) = end {
                start = end + Duration::days(rng.gen_range(1..10));
            }
        }

        // Occasional duplicate booking left behind by the front desk.
        if rng.gen_bool(0.15) {
            created_seq += 1;
            let duplicate = Agreement {
                id:               format!("lease-{v:04}-dup"),
                agreement_number: format!("AG-{:05}", created_seq),
                vehicle_id:       vehicle.id.clone(),
                customer_id:      format!("cust-{:04}", rng.gen_range(0..vehicle_count * 3)),
                start_date:       start,
                end_date:         None,
                status:           AgreementStatus::PendingPayment,
                rent_amount:      3000.0,
                daily_late_fee:   None,
                created_at:       created_at(created_seq),
            };
            engine.store.insert_agreement(&duplicate)?;
            summary.agreements += 1;
        }

        for f in 0..rng.gen_range(0..4) {
            let plate = match rng.gen_range(0..20) {
                0 => None,
                1 => Some(format!("XX-{}", rng.gen_range(100..999))),
                _ => Some(vehicle.license_plate.clone()),
            };
            let fine = TrafficFine {
                id:                format!("fine-{v:04}-{f}"),
                license_plate:     plate,
                violation_date:    Some(year_start + Duration::days(rng.gen_range(0..365))),
                fine_amount:       f64::from(rng.gen_range(1..10u32)) * 150.0,
                payment_status:    FinePaymentStatus::Pending,
                vehicle_id:        None,
                lease_id:          None,
                assignment_status: AssignmentStatus::Pending,
            };
            engine.store.insert_fine(&fine)?;
            summary.fines += 1;
        }
    }

    log::info!(
        "demo fleet seeded: seed={seed} vehicles={} agreements={} entries={} fines={}",
        summary.vehicles,
        summary.agreements,
        summary.entries,
        summary.fines
    );
    Ok(summary)
}

/// A paid month, sometimes late or partial, and one unpaid month.
/// Returns the number of ledger entries written.
fn seed_payments(engine: &ReconEngine, rng: &mut Pcg64Mcg, agreement: &Agreement) -> Result<usize> {
    let paid_on = date(2024, 11, rng.gen_range(1..=28))?;
    let partial = rng.gen_bool(0.3);
    let amount = if partial {
        (agreement.rent_amount * 0.5).round()
    } else {
        agreement.rent_amount
    };
    let options = SpecialPaymentOptions {
        include_late_payment_fee: rng.gen_bool(0.5),
        is_partial_payment: partial,
        payment_method: Some("bank_transfer".into()),
        ..SpecialPaymentOptions::default()
    };
    let receipt = engine.record_special_payment(&agreement.id, amount, paid_on, &options)?;

    engine.store.insert_new_ledger_entry(&NewLedgerEntry {
        lease_id:          agreement.id.clone(),
        entry_type:        EntryType::Rent,
        amount:            agreement.rent_amount,
        amount_paid:       0.0,
        balance:           agreement.rent_amount,
        status:            PaymentStatus::Pending,
        payment_date:      None,
        original_due_date: Some(date(2024, 12, 1)?),
        days_overdue:      0,
        late_fine_amount:  0.0,
        payment_method:    None,
        description:       Some("Rent due for December 2024".into()),
    })?;
    Ok(2 + usize::from(receipt.late_fee_entry_id.is_some()))
}

fn created_at(seq: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200 + seq * 60, 0).unwrap_or_default()
}

fn date(y: i32, m: u32, d: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| anyhow::anyhow!("invalid date {y}-{m}-{d}"))
}
