//! Overdue refresh: ages open rent entries past their due date.
//!
//! For each open rent entry with a balance and a due date before `as_of`,
//! days_overdue and late_fine_amount are recomputed from the agreement's
//! daily rate. Pending entries become overdue; partially paid entries keep
//! their status. Re-running for the same date writes nothing.
//! Periods whose fee was already charged as a separate LATE_PAYMENT_FEE
//! entry are skipped; their fine does not accrue a second time.

use crate::{
    batch::BatchReport,
    config::LateFeePolicy,
    error::{CoreError, CoreResult},
    model::{separately_charged_periods, EntryType, LedgerEntry, LedgerPatch, PaymentStatus},
    port::ReconPort,
    types::{EntityId, Money, MONEY_EPSILON},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Per-lease inputs, loaded once per run.
struct LeaseTerms {
    daily_rate: Money,
    charged:    BTreeSet<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverdueReport {
    pub report:         BatchReport,
    pub updated:        Vec<EntityId>,
    pub marked_overdue: Vec<EntityId>,
}

pub fn refresh_overdue_entries<P: ReconPort + ?Sized>(
    port: &P,
    policy: &LateFeePolicy,
    as_of: NaiveDate,
) -> CoreResult<OverdueReport> {
    let entries = port.list_open_ledger_entries()?;
    let mut leases: HashMap<EntityId, LeaseTerms> = HashMap::new();
    let mut out = OverdueReport::default();

    for entry in entries.iter().filter(|e| is_candidate(e, as_of)) {
        let terms = match terms_for(port, policy, &mut leases, &entry.lease_id) {
            Ok(terms) => terms,
            Err(e) => {
                log::warn!("op=refresh_overdue entry={} lease={}: {e}", entry.id, entry.lease_id);
                out.report.record_failure(entry.id.clone(), e.kind(), e.to_string());
                continue;
            }
        };

        if entry.fee_charged_separately(&terms.charged) {
            log::debug!("op=refresh_overdue entry={} fee already charged separately", entry.id);
            out.report.record_skipped();
            continue;
        }

        let Some(patch) = overdue_patch(entry, policy, terms.daily_rate, as_of) else {
            out.report.record_skipped();
            continue;
        };

        match port.update_ledger_entry(&entry.id, &patch) {
            Ok(()) => {
                log::debug!(
                    "op=refresh_overdue entry={} days_overdue={:?} late_fine={:?}",
                    entry.id,
                    patch.days_overdue,
                    patch.late_fine_amount
                );
                if patch.status == Some(PaymentStatus::Overdue) {
                    out.marked_overdue.push(entry.id.clone());
                }
                out.updated.push(entry.id.clone());
                out.report.record_success();
            }
            Err(e) => {
                log::error!("op=refresh_overdue entry={} update failed: {e}", entry.id);
                out.report.record_failure(entry.id.clone(), e.kind(), e.to_string());
            }
        }
    }

    log::info!(
        "op=refresh_overdue as_of={as_of} processed={} updated={} overdue={} failed={}",
        out.report.processed,
        out.updated.len(),
        out.marked_overdue.len(),
        out.report.failed
    );
    Ok(out)
}

fn is_candidate(entry: &LedgerEntry, as_of: NaiveDate) -> bool {
    entry.entry_type == EntryType::Rent
        && entry.status.is_open()
        && entry.balance > MONEY_EPSILON
        && entry.original_due_date.map_or(false, |due| due < as_of)
}

/// The patch that brings `entry` up to date, or `None` if it already is.
fn overdue_patch(entry: &LedgerEntry, policy: &LateFeePolicy, rate: Money, as_of: NaiveDate) -> Option<LedgerPatch> {
    let due = entry.original_due_date?;
    let days = (as_of - due).num_days();
    let fine = policy.fee_for_days(days, rate);
    let status = if entry.status == PaymentStatus::Pending {
        PaymentStatus::Overdue
    } else {
        entry.status
    };

    let unchanged = days == entry.days_overdue
        && (fine - entry.late_fine_amount).abs() < MONEY_EPSILON
        && status == entry.status;
    if unchanged {
        return None;
    }

    Some(LedgerPatch {
        days_overdue:     Some(days),
        late_fine_amount: Some(fine),
        status:           (status != entry.status).then_some(status),
        ..LedgerPatch::default()
    })
}

fn terms_for<'a, P: ReconPort + ?Sized>(
    port: &P,
    policy: &LateFeePolicy,
    cache: &'a mut HashMap<EntityId, LeaseTerms>,
    lease_id: &str,
) -> CoreResult<&'a LeaseTerms> {
    if !cache.contains_key(lease_id) {
        let lease = port
            .fetch_lease(lease_id)?
            .ok_or_else(|| CoreError::not_found("lease", lease_id))?;
        let entries = port.list_ledger_entries_for_lease(lease_id)?;
        let terms = LeaseTerms {
            daily_rate: lease.daily_late_fee_or(policy.daily_rate),
            charged:    separately_charged_periods(&entries),
        };
        cache.insert(lease_id.to_string(), terms);
    }
    cache
        .get(lease_id)
        .ok_or_else(|| CoreError::not_found("lease", lease_id))
}
