//! Payment ledger resolution: pure arithmetic for applying a payment.
//!
//! RULE: Ledger entries are only ever mutated through a `LedgerUpdate`
//! produced here. Persistence is the caller's job.

use crate::{
    model::{LedgerEntry, LedgerPatch, PaymentStatus},
    types::{EntityId, Money},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A payment event as entered by the back office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingPayment {
    pub amount:       Money,
    pub payment_date: NaiveDate,
    pub method:       Option<String>,
}

/// Terms used only when no entry exists yet for the period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryTerms {
    /// Contractual amount due, normally the agreement's rent.
    pub contractual_amount: Money,
    pub is_partial_payment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntryPlan {
    pub amount:      Money,
    pub amount_paid: Money,
    pub balance:     Money,
    pub status:      PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalPayment {
    pub entry_id:   EntityId,
    pub total_paid: Money,
    /// Floored at zero; overpayment is not carried as a negative balance.
    pub balance:    Money,
    pub status:     PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerUpdate {
    NewEntry(NewEntryPlan),
    Additional(AdditionalPayment),
}

impl LedgerUpdate {
    pub fn status(&self) -> PaymentStatus {
        match self {
            Self::NewEntry(p)   => p.status,
            Self::Additional(a) => a.status,
        }
    }

    pub fn balance(&self) -> Money {
        match self {
            Self::NewEntry(p)   => p.balance,
            Self::Additional(a) => a.balance,
        }
    }

    pub fn amount_paid(&self) -> Money {
        match self {
            Self::NewEntry(p)   => p.amount_paid,
            Self::Additional(a) => a.total_paid,
        }
    }
}

impl AdditionalPayment {
    pub fn to_patch(&self, incoming: &IncomingPayment) -> LedgerPatch {
        LedgerPatch {
            amount_paid:    Some(self.total_paid),
            balance:        Some(self.balance),
            status:         Some(self.status),
            payment_date:   Some(incoming.payment_date),
            payment_method: incoming.method.clone(),
            ..LedgerPatch::default()
        }
    }
}

/// Resolve a payment against an existing entry, or plan a new one.
///
/// Assumes `incoming.amount > 0`; callers validate before reaching here.
pub fn resolve_payment(
    existing: Option<&LedgerEntry>,
    incoming: &IncomingPayment,
    terms: &EntryTerms,
) -> LedgerUpdate {
    debug_assert!(incoming.amount > 0.0, "payment amount must be validated by the caller");

    match existing {
        None => {
            let amount = terms.contractual_amount;
            let amount_paid = incoming.amount;
            let remaining = amount - amount_paid;
            let status = if remaining <= 0.0 || !terms.is_partial_payment {
                PaymentStatus::Completed
            } else {
                PaymentStatus::PartiallyPaid
            };
            LedgerUpdate::NewEntry(NewEntryPlan {
                amount,
                amount_paid,
                balance: remaining.max(0.0),
                status,
            })
        }
        Some(entry) => {
            let total_paid = entry.amount_paid + incoming.amount;
            let remaining = entry.amount - total_paid;
            let status = if remaining <= 0.0 {
                PaymentStatus::Completed
            } else {
                PaymentStatus::PartiallyPaid
            };
            LedgerUpdate::Additional(AdditionalPayment {
                entry_id: entry.id.clone(),
                total_paid,
                balance: remaining.max(0.0),
                status,
            })
        }
    }
}
