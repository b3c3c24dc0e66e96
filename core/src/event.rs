//! Audit events: one per state change made by the engine.
//!
//! RULE: Events are written only after the change they describe has
//! been persisted. Variants are added over time, never removed or reordered.

use crate::types::{EntityId, Money};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    // ── Payments ───────────────────────────────────
    PaymentRecorded {
        lease_id: EntityId,
        entry_id: EntityId,
        amount: Money,
        amount_paid: Money,
        balance: Money,
        status: String,
        payment_date: NaiveDate,
        updated_existing: bool,
    },
    LatePaymentFeeRecorded {
        lease_id: EntityId,
        entry_id: EntityId,
        days_late: i64,
        fee_amount: Money,
    },
    LedgerEntryMarkedOverdue {
        entry_id: EntityId,
        as_of: NaiveDate,
    },

    // ── Traffic fines ──────────────────────────────
    FineAssigned {
        fine_id: EntityId,
        lease_id: EntityId,
        customer_id: EntityId,
    },
    FineAssignmentCleared {
        fine_id: EntityId,
    },

    // ── Agreements ─────────────────────────────────
    AgreementCancelled {
        agreement_id: EntityId,
        reason: String,
    },
}

impl LedgerEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PaymentRecorded { .. }          => "payment_recorded",
            Self::LatePaymentFeeRecorded { .. }   => "late_payment_fee_recorded",
            Self::LedgerEntryMarkedOverdue { .. } => "ledger_entry_marked_overdue",
            Self::FineAssigned { .. }             => "fine_assigned",
            Self::FineAssignmentCleared { .. }    => "fine_assignment_cleared",
            Self::AgreementCancelled { .. }       => "agreement_cancelled",
        }
    }

    /// The record the event is about, used to index the log.
    pub fn subject_id(&self) -> &str {
        match self {
            Self::PaymentRecorded { entry_id, .. }
            | Self::LatePaymentFeeRecorded { entry_id, .. }
            | Self::LedgerEntryMarkedOverdue { entry_id, .. } => entry_id,
            Self::FineAssigned { fine_id, .. } | Self::FineAssignmentCleared { fine_id } => fine_id,
            Self::AgreementCancelled { agreement_id, .. } => agreement_id,
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:          Option<i64>,
    pub event_type:  String,
    pub subject_id:  String,
    pub payload:     String, // JSON-serialized LedgerEvent
    pub recorded_at: String,
}
