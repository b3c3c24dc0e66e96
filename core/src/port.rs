//! The persistence port: every call the reconciliation core makes
//! against the backend.
//!
//! RULE: Orchestrators receive a port explicitly. There is no global
//! client; tests substitute an in-memory store or a failing double.
//!
//! Calls are independent request/response units. No call holds a lock
//! or transaction open across another; concurrent writers race with
//! last-write-wins semantics at the backend.

use crate::{
    error::CoreResult,
    model::{
        Agreement, AgreementStatus, AssignmentStatus, FineAssignmentPatch, LedgerEntry,
        LedgerPatch, NewLedgerEntry, TrafficFine,
    },
    types::EntityId,
};

pub trait ReconPort {
    // ── Agreements ────────────────────────────────────────────────

    fn fetch_lease(&self, id: &str) -> CoreResult<Option<Agreement>>;

    /// Active agreements for a vehicle, most recently created first.
    fn list_active_leases_for_vehicle(&self, vehicle_id: &str) -> CoreResult<Vec<Agreement>>;

    fn list_agreements_with_status(&self, statuses: &[AgreementStatus]) -> CoreResult<Vec<Agreement>>;

    fn update_lease_status(&self, id: &str, status: AgreementStatus) -> CoreResult<()>;

    // ── Vehicles ──────────────────────────────────────────────────

    /// Exact license-plate lookup.
    fn fetch_vehicle_id_by_plate(&self, plate: &str) -> CoreResult<Option<EntityId>>;

    // ── Ledger ────────────────────────────────────────────────────

    fn fetch_ledger_entry(&self, id: &str) -> CoreResult<Option<LedgerEntry>>;

    fn list_ledger_entries_for_lease(&self, lease_id: &str) -> CoreResult<Vec<LedgerEntry>>;

    /// Entries still carrying an amount owed (pending, partially paid, overdue).
    fn list_open_ledger_entries(&self) -> CoreResult<Vec<LedgerEntry>>;

    fn insert_ledger_entry(&self, entry: &NewLedgerEntry) -> CoreResult<EntityId>;

    fn update_ledger_entry(&self, id: &str, patch: &LedgerPatch) -> CoreResult<()>;

    // ── Traffic fines ─────────────────────────────────────────────

    fn fetch_fine(&self, id: &str) -> CoreResult<Option<TrafficFine>>;

    fn list_fines_by_assignment(&self, status: AssignmentStatus) -> CoreResult<Vec<TrafficFine>>;

    fn update_fine_assignment(&self, id: &str, patch: &FineAssignmentPatch) -> CoreResult<()>;
}
