//! Running balance of an agreement's ledger.

use crate::{
    error::{CoreError, CoreResult},
    model::{separately_charged_periods, EntryType, PaymentStatus},
    port::ReconPort,
    types::{EntityId, Money},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaseBalance {
    pub lease_id:           EntityId,
    pub total_due:          Money,
    pub total_paid:         Money,
    /// Sum of per-entry balances; each is already floored at zero.
    pub outstanding:        Money,
    /// Separate LATE_PAYMENT_FEE line items.
    pub late_fees_recorded: Money,
    /// Late fines accrued on still-open entries whose period has no
    /// separate fee entry.
    pub late_fees_accrued:  Money,
    pub open_entries:       usize,
}

/// Aggregate every non-cancelled ledger entry of a lease.
pub fn lease_balance<P: ReconPort + ?Sized>(port: &P, lease_id: &str) -> CoreResult<LeaseBalance> {
    if port.fetch_lease(lease_id)?.is_none() {
        return Err(CoreError::not_found("lease", lease_id));
    }

    let mut out = LeaseBalance {
        lease_id: lease_id.to_string(),
        ..LeaseBalance::default()
    };

    let entries = port.list_ledger_entries_for_lease(lease_id)?;
    let charged = separately_charged_periods(&entries);

    for entry in &entries {
        if entry.status == PaymentStatus::Cancelled {
            continue;
        }
        out.total_due += entry.amount;
        out.total_paid += entry.amount_paid;
        out.outstanding += entry.balance;
        if entry.entry_type == EntryType::LatePaymentFee {
            out.late_fees_recorded += entry.amount;
        }
        if entry.status.is_open() {
            out.open_entries += 1;
            if !entry.fee_charged_separately(&charged) {
                out.late_fees_accrued += entry.late_fine_amount;
            }
        }
    }

    Ok(out)
}
