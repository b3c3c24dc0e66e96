//! fleetdesk-runner: headless reconciliation runner.
//!
//! Usage:
//!   fleetdesk-runner --seed 7 --vehicles 40 --as-of 2025-01-15 --db fleet.db
//!   fleetdesk-runner --db fleet.db --ipc-mode

mod demo;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use fleetdesk_core::{
    engine::ReconEngine,
    error::{AssignmentError, CoreError},
    model::{AgreementStatus, AssignmentStatus},
    special_payment::SpecialPaymentOptions,
    types::Money,
};
use serde::Serialize;
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    RecordPayment {
        lease_id: String,
        amount: Money,
        payment_date: NaiveDate,
        #[serde(default)]
        options: SpecialPaymentOptions,
    },
    AssignFine {
        fine_id: String,
    },
    AutoAssignFines,
    ValidateFines,
    ReconcileAgreements,
    RefreshOverdue {
        as_of: NaiveDate,
    },
    LeaseBalance {
        lease_id: String,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let vehicles = parse_arg(&args, "--vehicles", 25usize);
    let as_of = parse_arg(&args, "--as-of", Utc::now().date_naive());
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");

    if !ipc_mode {
        println!("FleetDesk reconciliation runner");
        println!("  seed:      {seed}");
        println!("  vehicles:  {vehicles}");
        println!("  as of:     {as_of}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let engine = ReconEngine::build(db, data_dir)?;

    if ipc_mode {
        run_ipc_loop(&engine)
    } else {
        run_batch(&engine, seed, vehicles, as_of)
    }
}

fn run_batch(engine: &ReconEngine, seed: u64, vehicles: usize, as_of: NaiveDate) -> Result<()> {
    if engine.store.vehicle_count()? == 0 {
        let seeded = demo::seed_demo_fleet(engine, seed, vehicles)?;
        println!(
            "seeded {} vehicles, {} agreements, {} ledger entries, {} fines",
            seeded.vehicles, seeded.agreements, seeded.entries, seeded.fines
        );
    } else {
        log::info!("existing fleet found, skipping demo seeding");
    }

    let assigned = engine.auto_assign_fines()?;
    let validated = engine.validate_fine_assignments()?;
    let overdue = engine.refresh_overdue_entries(as_of)?;
    let conflicts = engine.reconcile_vehicle_agreements()?;

    println!();
    println!("=== RECONCILIATION SUMMARY ===");
    println!(
        "  fines assigned:     {} of {} ({} failed)",
        assigned.report.succeeded, assigned.report.processed, assigned.report.failed
    );
    for failure in &assigned.report.failures {
        println!("    {:<16} {:?}: {}", failure.item_id, failure.kind, failure.message);
    }
    println!(
        "  fines re-checked:   {} ({} cleared)",
        validated.report.processed,
        validated.cleared.len()
    );
    println!(
        "  overdue refreshed:  {} entries ({} newly overdue)",
        overdue.updated.len(),
        overdue.marked_overdue.len()
    );
    println!(
        "  agreement audit:    {} vehicles, {} in conflict, {} cancelled",
        conflicts.vehicles_examined, conflicts.conflicted_vehicles, conflicts.updated_count
    );

    println!();
    println!("=== STORE TOTALS ===");
    println!("  active agreements:    {}", engine.store.agreement_count(AgreementStatus::Active)?);
    println!("  cancelled agreements: {}", engine.store.agreement_count(AgreementStatus::Cancelled)?);
    println!("  fines assigned:       {}", engine.store.fine_count(AssignmentStatus::Assigned)?);
    println!("  fines pending:        {}", engine.store.fine_count(AssignmentStatus::Pending)?);
    Ok(())
}

fn run_ipc_loop(engine: &ReconEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string(), "kind": "parse" });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let response = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::RecordPayment { lease_id, amount, payment_date, options } => respond(
                engine.record_special_payment(&lease_id, amount, payment_date, &options),
                CoreError::kind,
            ),
            IpcCommand::AssignFine { fine_id } => respond(engine.assign_fine(&fine_id), AssignmentError::kind),
            IpcCommand::AutoAssignFines => respond(engine.auto_assign_fines(), CoreError::kind),
            IpcCommand::ValidateFines => respond(engine.validate_fine_assignments(), CoreError::kind),
            IpcCommand::ReconcileAgreements => {
                respond(engine.reconcile_vehicle_agreements(), CoreError::kind)
            }
            IpcCommand::RefreshOverdue { as_of } => {
                respond(engine.refresh_overdue_entries(as_of), CoreError::kind)
            }
            IpcCommand::LeaseBalance { lease_id } => {
                respond(engine.lease_balance(&lease_id), CoreError::kind)
            }
        };
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }
    Ok(())
}

/// Success serializes the result; failure becomes `{ "error", "kind" }`.
fn respond<T, E, K>(result: Result<T, E>, kind: impl Fn(&E) -> K) -> serde_json::Value
where
    T: Serialize,
    E: std::fmt::Display,
    K: Serialize,
{
    match result {
        Ok(value) => serde_json::to_value(value)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string(), "kind": "serialization" })),
        Err(e) => {
            log::warn!("ipc command failed: {e}");
            serde_json::json!({ "error": e.to_string(), "kind": kind(&e) })
        }
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
