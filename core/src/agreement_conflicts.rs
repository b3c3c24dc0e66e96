//! Agreement conflict resolution: keeps a single authoritative agreement
//! per vehicle.
//!
//! The backend has no uniqueness constraint, so the invariant is enforced
//! at read time: among competing agreements for a vehicle the newest
//! survives and the rest are cancelled. Running it again with no new
//! agreements performs no writes.

use crate::{
    batch::BatchReport,
    error::CoreResult,
    model::{Agreement, AgreementStatus},
    port::ReconPort,
    types::EntityId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub vehicles_examined: usize,
    pub conflicted_vehicles: usize,
    pub updated_count: usize,
    pub cancelled: Vec<EntityId>,
    pub report: BatchReport,
}

/// Cancel every competing agreement except the newest, per vehicle.
pub fn reconcile_vehicle_agreements<P: ReconPort + ?Sized>(
    port: &P,
    statuses: &[AgreementStatus],
) -> CoreResult<ConflictReport> {
    let agreements = port.list_agreements_with_status(statuses)?;

    let mut by_vehicle: BTreeMap<&str, Vec<&Agreement>> = BTreeMap::new();
    for agreement in &agreements {
        by_vehicle.entry(agreement.vehicle_id.as_str()).or_default().push(agreement);
    }

    let mut out = ConflictReport {
        vehicles_examined: by_vehicle.len(),
        ..ConflictReport::default()
    };

    for (vehicle_id, mut group) in by_vehicle {
        if group.len() < 2 {
            continue;
        }
        out.conflicted_vehicles += 1;
        order_newest_first(&mut group);

        let keeper = group[0];
        for stale in &group[1..] {
            match port.update_lease_status(&stale.id, AgreementStatus::Cancelled) {
                Ok(()) => {
                    log::info!(
                        "op=reconcile_agreements vehicle={vehicle_id} cancelled={} kept={}",
                        stale.id,
                        keeper.id
                    );
                    out.updated_count += 1;
                    out.cancelled.push(stale.id.clone());
                    out.report.record_success();
                }
                Err(e) => {
                    log::error!(
                        "op=reconcile_agreements vehicle={vehicle_id} agreement={} cancel failed: {e}",
                        stale.id
                    );
                    out.report.record_failure(stale.id.clone(), e.kind(), e.to_string());
                }
            }
        }
    }

    log::info!(
        "op=reconcile_agreements vehicles={} conflicted={} updated={} failed={}",
        out.vehicles_examined,
        out.conflicted_vehicles,
        out.updated_count,
        out.report.failed
    );
    Ok(out)
}

/// Newest `created_at` first; equal timestamps fall back to the larger id.
fn order_newest_first(group: &mut [&Agreement]) {
    group.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn agreement(id: &str, secs: i64) -> Agreement {
        Agreement {
            id: id.into(),
            agreement_number: format!("AG-{id}"),
            vehicle_id: "V1".into(),
            customer_id: "C1".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            status: AgreementStatus::Active,
            rent_amount: 1000.0,
            daily_late_fee: None,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn newest_sorts_first_and_ties_break_on_id() {
        let a = agreement("a", 100);
        let b = agreement("b", 300);
        let c = agreement("c", 300);
        let mut group = vec![&a, &b, &c];
        order_newest_first(&mut group);
        let ids: Vec<_> = group.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
    }
}
