//! The reconciliation engine: the entry point the back office calls.
//!
//! OPERATIONS:
//!   - record_special_payment      (rent payment + late fee accounting)
//!   - assign_fine / auto_assign_fines
//!   - validate_fine_assignments   (clears assignments that no longer hold)
//!   - reconcile_vehicle_agreements
//!   - refresh_overdue_entries
//!   - lease_balance
//!
//! RULES:
//!   - The engine owns no reconciliation logic; it wires the store and
//!     config into the orchestrator functions.
//!   - Every persisted state change is followed by an audit event.
//!   - A failed audit write never undoes or fails the operation it describes.

use crate::{
    agreement_conflicts::{reconcile_vehicle_agreements, ConflictReport},
    balance::{lease_balance, LeaseBalance},
    config::ReconConfig,
    error::{AssignmentError, CoreError, CoreResult},
    event::LedgerEvent,
    fine_assignment::{
        assign_fine_to_customer, auto_assign_fines, validate_fine_assignments, AutoAssignReport,
        FineAssignment, FineValidationReport,
    },
    overdue::{refresh_overdue_entries, OverdueReport},
    special_payment::{record_special_payment, PaymentBranch, PaymentReceipt, SpecialPaymentOptions},
    store::SqliteStore,
    types::Money,
};
use chrono::NaiveDate;

pub struct ReconEngine {
    pub store:  SqliteStore,
    pub config: ReconConfig,
}

impl ReconEngine {
    pub fn new(store: SqliteStore, config: ReconConfig) -> Self {
        Self { store, config }
    }

    /// Open (and migrate) the database at `db_path` with config from `data_dir`.
    pub fn build(db_path: &str, data_dir: &str) -> anyhow::Result<Self> {
        let config = ReconConfig::load(data_dir)?;
        let store = SqliteStore::open(db_path)?;
        store.migrate()?;
        Ok(Self::new(store, config))
    }

    /// In-memory store with test config.
    pub fn build_test() -> CoreResult<Self> {
        let store = SqliteStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, ReconConfig::default_test()))
    }

    // ── Payments ──────────────────────────────────────────────────

    pub fn record_special_payment(
        &self,
        agreement_id: &str,
        amount: Money,
        payment_date: NaiveDate,
        options: &SpecialPaymentOptions,
    ) -> CoreResult<PaymentReceipt> {
        let result = record_special_payment(
            &self.store,
            &self.config.late_fee,
            agreement_id,
            amount,
            payment_date,
            options,
        );
        match result {
            Ok(receipt) => {
                self.record_payment_events(&receipt, amount, payment_date);
                Ok(receipt)
            }
            // The rent entry is persisted even though the fee entry is not.
            Err(CoreError::LateFeeNotRecorded { receipt, reason }) => {
                self.record_payment_events(&receipt, amount, payment_date);
                Err(CoreError::LateFeeNotRecorded { receipt, reason })
            }
            Err(e) => Err(e),
        }
    }

    pub fn refresh_overdue_entries(&self, as_of: NaiveDate) -> CoreResult<OverdueReport> {
        let report = refresh_overdue_entries(&self.store, &self.config.late_fee, as_of)?;
        for entry_id in &report.marked_overdue {
            self.record(LedgerEvent::LedgerEntryMarkedOverdue {
                entry_id: entry_id.clone(),
                as_of,
            });
        }
        Ok(report)
    }

    pub fn lease_balance(&self, lease_id: &str) -> CoreResult<LeaseBalance> {
        lease_balance(&self.store, lease_id)
    }

    // ── Traffic fines ─────────────────────────────────────────────

    pub fn assign_fine(&self, fine_id: &str) -> Result<FineAssignment, AssignmentError> {
        let assignment = assign_fine_to_customer(&self.store, fine_id)?;
        self.record_assignment(&assignment);
        Ok(assignment)
    }

    pub fn auto_assign_fines(&self) -> CoreResult<AutoAssignReport> {
        let report = auto_assign_fines(&self.store)?;
        for assignment in &report.assignments {
            self.record_assignment(assignment);
        }
        Ok(report)
    }

    pub fn validate_fine_assignments(&self) -> CoreResult<FineValidationReport> {
        let report = validate_fine_assignments(&self.store, &self.config.fine_validation)?;
        for fine_id in &report.cleared {
            self.record(LedgerEvent::FineAssignmentCleared { fine_id: fine_id.clone() });
        }
        Ok(report)
    }

    // ── Agreements ────────────────────────────────────────────────

    pub fn reconcile_vehicle_agreements(&self) -> CoreResult<ConflictReport> {
        let report = reconcile_vehicle_agreements(&self.store, &self.config.conflict_statuses)?;
        for agreement_id in &report.cancelled {
            self.record(LedgerEvent::AgreementCancelled {
                agreement_id: agreement_id.clone(),
                reason:       "superseded by a newer agreement for the same vehicle".into(),
            });
        }
        Ok(report)
    }

    fn record_payment_events(&self, receipt: &PaymentReceipt, amount: Money, payment_date: NaiveDate) {
        self.record(LedgerEvent::PaymentRecorded {
            lease_id:         receipt.lease_id.clone(),
            entry_id:         receipt.entry_id.clone(),
            amount,
            amount_paid:      receipt.update.amount_paid(),
            balance:          receipt.update.balance(),
            status:           receipt.update.status().as_str().to_string(),
            payment_date,
            updated_existing: receipt.branch == PaymentBranch::UpdatedExisting,
        });
        if let Some(fee_entry_id) = &receipt.late_fee_entry_id {
            self.record(LedgerEvent::LatePaymentFeeRecorded {
                lease_id:   receipt.lease_id.clone(),
                entry_id:   fee_entry_id.clone(),
                days_late:  receipt.late_fee.days_late,
                fee_amount: receipt.late_fee.fee_amount,
            });
        }
    }

    fn record_assignment(&self, a: &FineAssignment) {
        self.record(LedgerEvent::FineAssigned {
            fine_id:     a.fine_id.clone(),
            lease_id:    a.lease_id.clone(),
            customer_id: a.customer_id.clone(),
        });
    }

    fn record(&self, event: LedgerEvent) {
        if let Err(e) = self.store.append_event(&event) {
            log::warn!("audit event {} for {} not written: {e}", event.type_name(), event.subject_id());
        }
    }
}
