//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! Reconciliation code reaches it through the `ReconPort` trait and
//! never executes SQL directly.

use crate::{
    error::CoreResult,
    event::{EventLogEntry, LedgerEvent},
    model::{
        Agreement, AgreementStatus, AssignmentStatus, FineAssignmentPatch, LedgerEntry,
        LedgerPatch, NewLedgerEntry, TrafficFine,
    },
    port::ReconPort,
    types::EntityId,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

mod agreement;
mod fine;
mod ledger;
mod vehicle;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> CoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> CoreResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_fleet.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_ledger.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_traffic_fines.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &LedgerEvent) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (event_type, subject_id, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.type_name(),
                event.subject_id(),
                serde_json::to_string(event)?,
                timestamp(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_subject(&self, subject_id: &str) -> CoreResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_type, subject_id, payload, recorded_at
             FROM event_log WHERE subject_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![subject_id], map_event_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, event_type: &str) -> CoreResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE event_type = ?1",
            params![event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventLogEntry> {
    Ok(EventLogEntry {
        id:          Some(row.get(0)?),
        event_type:  row.get(1)?,
        subject_id:  row.get(2)?,
        payload:     row.get(3)?,
        recorded_at: row.get(4)?,
    })
}

/// Fixed-width RFC 3339 so timestamps also sort correctly as text.
pub(crate) fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn new_id(prefix: &str) -> EntityId {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

// ── Raw row types ─────────────────────────────────────────────────
// Loosely typed as stored; converted to model types via TryFrom.

#[derive(Debug, Clone)]
pub struct AgreementRow {
    pub agreement_id:     String,
    pub agreement_number: String,
    pub vehicle_id:       String,
    pub customer_id:      String,
    pub start_date:       String,
    pub end_date:         Option<String>,
    pub status:           String,
    pub rent_amount:      f64,
    pub daily_late_fee:   Option<f64>,
    pub created_at:       String,
}

#[derive(Debug, Clone)]
pub struct LedgerEntryRow {
    pub entry_id:          String,
    pub lease_id:          String,
    pub entry_type:        String,
    pub amount:            f64,
    pub amount_paid:       f64,
    pub balance:           f64,
    pub status:            String,
    pub payment_date:      Option<String>,
    pub original_due_date: Option<String>,
    pub days_overdue:      i64,
    pub late_fine_amount:  f64,
    pub payment_method:    Option<String>,
    pub description:       Option<String>,
    pub created_at:        String,
}

#[derive(Debug, Clone)]
pub struct TrafficFineRow {
    pub fine_id:           String,
    pub license_plate:     Option<String>,
    pub violation_date:    Option<String>,
    pub fine_amount:       f64,
    pub payment_status:    String,
    pub vehicle_id:        Option<String>,
    pub lease_id:          Option<String>,
    pub assignment_status: String,
}

// ── Port implementation ───────────────────────────────────────────

impl ReconPort for SqliteStore {
    fn fetch_lease(&self, id: &str) -> CoreResult<Option<Agreement>> {
        self.get_agreement(id)
    }

    fn list_active_leases_for_vehicle(&self, vehicle_id: &str) -> CoreResult<Vec<Agreement>> {
        self.agreements_for_vehicle(vehicle_id, AgreementStatus::Active)
    }

    fn list_agreements_with_status(&self, statuses: &[AgreementStatus]) -> CoreResult<Vec<Agreement>> {
        self.agreements_with_status(statuses)
    }

    fn update_lease_status(&self, id: &str, status: AgreementStatus) -> CoreResult<()> {
        self.set_agreement_status(id, status)
    }

    fn fetch_vehicle_id_by_plate(&self, plate: &str) -> CoreResult<Option<EntityId>> {
        self.vehicle_id_by_plate(plate)
    }

    fn fetch_ledger_entry(&self, id: &str) -> CoreResult<Option<LedgerEntry>> {
        self.get_ledger_entry(id)
    }

    fn list_ledger_entries_for_lease(&self, lease_id: &str) -> CoreResult<Vec<LedgerEntry>> {
        self.ledger_entries_for_lease(lease_id)
    }

    fn list_open_ledger_entries(&self) -> CoreResult<Vec<LedgerEntry>> {
        self.open_ledger_entries()
    }

    fn insert_ledger_entry(&self, entry: &NewLedgerEntry) -> CoreResult<EntityId> {
        self.insert_new_ledger_entry(entry)
    }

    fn update_ledger_entry(&self, id: &str, patch: &LedgerPatch) -> CoreResult<()> {
        self.apply_ledger_patch(id, patch)
    }

    fn fetch_fine(&self, id: &str) -> CoreResult<Option<TrafficFine>> {
        self.get_fine(id)
    }

    fn list_fines_by_assignment(&self, status: AssignmentStatus) -> CoreResult<Vec<TrafficFine>> {
        self.fines_by_assignment(status)
    }

    fn update_fine_assignment(&self, id: &str, patch: &FineAssignmentPatch) -> CoreResult<()> {
        self.set_fine_assignment(id, patch)
    }
}
