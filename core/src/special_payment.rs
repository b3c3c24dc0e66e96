//! Special payment orchestration: records a rent payment against an
//! agreement, with late fee accounting.
//!
//! Sequence:
//!   1. Resolve the target entry (explicit id, then pending hint).
//!   2. Load the agreement and its daily late fee (policy fallback).
//!   3. Compute the late fee for the payment date.
//!   4. Existing entry → apply the payment to it. The late fee is never
//!      re-applied on this path, and the receipt reports none. Settled
//!      entries and amounts above the remaining balance are rejected.
//!      No entry → insert a rent entry carrying days_overdue and
//!      late_fine_amount, plus an optional separate LATE_PAYMENT_FEE entry.
//!
//! RULE: Nothing here retries. A failed write is surfaced as-is so a
//! payment can never be applied twice. Callers re-submitting a correction
//! pass `target_payment_id`; this module does not deduplicate by date.

use crate::{
    config::LateFeePolicy,
    error::{CoreError, CoreResult},
    late_fee::{late_fee_description, LateFee},
    ledger_resolver::{resolve_payment, EntryTerms, IncomingPayment, LedgerUpdate},
    model::{EntryType, LedgerEntry, NewLedgerEntry, PaymentStatus},
    port::ReconPort,
    types::{EntityId, Money, MONEY_EPSILON},
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecialPaymentOptions {
    /// Entry to apply the payment to. Takes precedence over `pending_target_id`.
    #[serde(default)]
    pub target_payment_id: Option<EntityId>,
    /// Target carried over from the UI (e.g. a pending query parameter).
    #[serde(default)]
    pub pending_target_id: Option<EntityId>,
    #[serde(default)]
    pub include_late_payment_fee: bool,
    #[serde(default)]
    pub is_partial_payment: bool,
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Overrides the agreement's rent as the amount due for a new entry.
    #[serde(default)]
    pub contractual_amount: Option<Money>,
    /// Defaults to the 1st of the payment month.
    #[serde(default)]
    pub original_due_date: Option<NaiveDate>,
}

impl SpecialPaymentOptions {
    fn target_id(&self) -> Option<&str> {
        self.target_payment_id
            .as_deref()
            .or(self.pending_target_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentBranch {
    UpdatedExisting,
    CreatedNew,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub lease_id:          EntityId,
    pub entry_id:          EntityId,
    pub branch:            PaymentBranch,
    pub update:            LedgerUpdate,
    pub late_fee:          LateFee,
    pub late_fee_entry_id: Option<EntityId>,
}

/// Record a payment of `amount` on `payment_date` against `agreement_id`.
pub fn record_special_payment<P: ReconPort + ?Sized>(
    port: &P,
    policy: &LateFeePolicy,
    agreement_id: &str,
    amount: Money,
    payment_date: NaiveDate,
    options: &SpecialPaymentOptions,
) -> CoreResult<PaymentReceipt> {
    validate_amount("payment amount", amount)?;
    if let Some(contractual) = options.contractual_amount {
        validate_amount("contractual amount", contractual)?;
    }

    let existing = match options.target_id() {
        Some(target_id) => Some(load_target_entry(port, agreement_id, target_id)?),
        None => None,
    };
    if let Some(entry) = &existing {
        if amount > entry.balance + MONEY_EPSILON {
            return Err(CoreError::validation(format!(
                "payment {amount:.2} exceeds outstanding balance {:.2} of ledger entry {}",
                entry.balance, entry.id
            )));
        }
    }

    let agreement = logged("fetch_lease", port.fetch_lease(agreement_id))?
        .ok_or_else(|| CoreError::not_found("lease", agreement_id))?;

    let daily_rate = agreement.daily_late_fee_or(policy.daily_rate);
    let late_fee = policy.compute(payment_date, daily_rate);

    let incoming = IncomingPayment {
        amount,
        payment_date,
        method: options.payment_method.clone(),
    };
    let terms = EntryTerms {
        contractual_amount: options.contractual_amount.unwrap_or(agreement.rent_amount),
        is_partial_payment: options.is_partial_payment,
    };

    let update = resolve_payment(existing.as_ref(), &incoming, &terms);

    match &update {
        LedgerUpdate::Additional(additional) => {
            logged(
                "update_ledger_entry",
                port.update_ledger_entry(&additional.entry_id, &additional.to_patch(&incoming)),
            )?;
            log::info!(
                "op=record_special_payment lease={agreement_id} entry={} branch=existing paid={:.2} balance={:.2} status={}",
                additional.entry_id,
                additional.total_paid,
                additional.balance,
                additional.status.as_str()
            );
            Ok(PaymentReceipt {
                lease_id: agreement.id,
                entry_id: additional.entry_id.clone(),
                branch: PaymentBranch::UpdatedExisting,
                update,
                late_fee: LateFee::NONE,
                late_fee_entry_id: None,
            })
        }
        LedgerUpdate::NewEntry(plan) => {
            let due_date = options.original_due_date.unwrap_or_else(|| first_of_month(payment_date));
            let rent_entry = NewLedgerEntry {
                lease_id:          agreement.id.clone(),
                entry_type:        EntryType::Rent,
                amount:            plan.amount,
                amount_paid:       plan.amount_paid,
                balance:           plan.balance,
                status:            plan.status,
                payment_date:      Some(payment_date),
                original_due_date: Some(due_date),
                days_overdue:      late_fee.days_late,
                late_fine_amount:  late_fee.fee_amount,
                payment_method:    options.payment_method.clone(),
                description:       Some(format!("Rent payment for {}", payment_date.format("%B %Y"))),
            };
            let entry_id = logged("insert_ledger_entry", port.insert_ledger_entry(&rent_entry))?;

            let late_fee_entry_id = if options.include_late_payment_fee && late_fee.is_charged() {
                let fee_entry = late_fee_entry(&agreement.id, payment_date, due_date, &late_fee, options);
                match port.insert_ledger_entry(&fee_entry) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        // The rent entry is already written; hand it back so a retry can target it.
                        log::error!(
                            "op=record_special_payment lease={agreement_id} rent_entry={entry_id} late fee insert failed: {e}"
                        );
                        return Err(CoreError::LateFeeNotRecorded {
                            receipt: Box::new(PaymentReceipt {
                                lease_id: agreement.id,
                                entry_id,
                                branch: PaymentBranch::CreatedNew,
                                update: update.clone(),
                                late_fee,
                                late_fee_entry_id: None,
                            }),
                            reason: e.to_string(),
                        });
                    }
                }
            } else {
                None
            };

            log::info!(
                "op=record_special_payment lease={agreement_id} entry={entry_id} branch=new paid={:.2} balance={:.2} days_late={} late_fee={:.2} separate_fee={}",
                plan.amount_paid,
                plan.balance,
                late_fee.days_late,
                late_fee.fee_amount,
                late_fee_entry_id.is_some()
            );

            Ok(PaymentReceipt {
                lease_id: agreement.id,
                entry_id,
                branch: PaymentBranch::CreatedNew,
                update,
                late_fee,
                late_fee_entry_id,
            })
        }
    }
}

fn validate_amount(what: &str, amount: Money) -> CoreResult<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(CoreError::validation(format!("{what} must be positive, got {amount}")));
    }
    Ok(())
}

fn load_target_entry<P: ReconPort + ?Sized>(
    port: &P,
    agreement_id: &str,
    target_id: &str,
) -> CoreResult<LedgerEntry> {
    let entry = logged("fetch_ledger_entry", port.fetch_ledger_entry(target_id))?
        .ok_or_else(|| CoreError::not_found("ledger entry", target_id))?;

    if entry.lease_id != agreement_id {
        return Err(CoreError::validation(format!(
            "ledger entry {target_id} belongs to lease {}, not {agreement_id}",
            entry.lease_id
        )));
    }
    if entry.status == PaymentStatus::Cancelled {
        return Err(CoreError::validation(format!("ledger entry {target_id} is cancelled")));
    }
    if entry.status == PaymentStatus::Completed {
        return Err(CoreError::validation(format!("ledger entry {target_id} is already settled")));
    }
    if entry.entry_type == EntryType::LatePaymentFee {
        return Err(CoreError::validation(format!(
            "ledger entry {target_id} is a late payment fee and cannot take payments"
        )));
    }
    Ok(entry)
}

fn late_fee_entry(
    lease_id: &str,
    payment_date: NaiveDate,
    due_date: NaiveDate,
    late_fee: &LateFee,
    options: &SpecialPaymentOptions,
) -> NewLedgerEntry {
    NewLedgerEntry {
        lease_id:          lease_id.to_string(),
        entry_type:        EntryType::LatePaymentFee,
        amount:            late_fee.fee_amount,
        amount_paid:       late_fee.fee_amount,
        balance:           0.0,
        status:            PaymentStatus::Completed,
        payment_date:      Some(payment_date),
        // Same due date as the rent entry: marks that period as charged.
        original_due_date: Some(due_date),
        days_overdue:      late_fee.days_late,
        late_fine_amount:  late_fee.fee_amount,
        payment_method:    options.payment_method.clone(),
        description:       Some(late_fee_description(payment_date, late_fee)),
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Log a failed port call before handing the error back.
fn logged<T>(op: &str, result: CoreResult<T>) -> CoreResult<T> {
    if let Err(e) = &result {
        log::error!("op=record_special_payment step={op} failed: {e}");
    }
    result
}
