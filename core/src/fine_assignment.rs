//! Fine assignment: attributes a traffic fine to the lease that was
//! active for the vehicle on the violation date.
//!
//! RULE: A fine is never attributed to a customer who was not
//! contractually responsible for the vehicle on that date. Every
//! assignment goes through the interval matcher; nothing assigns by
//! "latest lease" or by customer alone.
//!
//! Batches run sequentially and continue past individual failures.

use crate::{
    batch::BatchReport,
    config::FineValidationConfig,
    error::{AssignmentError, CoreResult, ErrorKind},
    interval::{find_containing_interval, DateInterval},
    model::{Agreement, AssignmentStatus, FineAssignmentPatch, TrafficFine},
    port::ReconPort,
    types::EntityId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineAssignment {
    pub fine_id:     EntityId,
    pub vehicle_id:  EntityId,
    pub lease_id:    EntityId,
    pub customer_id: EntityId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoAssignReport {
    pub report:      BatchReport,
    pub assignments: Vec<FineAssignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FineValidationReport {
    pub report:  BatchReport,
    /// Fines whose assignment failed re-validation and was cleared.
    pub cleared: Vec<EntityId>,
}

/// Assign one fine to the customer of the lease covering its violation date.
pub fn assign_fine_to_customer<P: ReconPort + ?Sized>(
    port: &P,
    fine_id: &str,
) -> Result<FineAssignment, AssignmentError> {
    let fine = port
        .fetch_fine(fine_id)
        .map_err(|e| persistence("fetch_fine", fine_id, e))?
        .ok_or_else(|| AssignmentError::FineNotFound { fine_id: fine_id.to_string() })?;

    let plate = fine
        .license_plate
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AssignmentError::MissingLicensePlate { fine_id: fine_id.to_string() })?;
    let violation_date = fine
        .violation_date
        .ok_or_else(|| AssignmentError::MissingViolationDate { fine_id: fine_id.to_string() })?;

    let vehicle_id = port
        .fetch_vehicle_id_by_plate(plate)
        .map_err(|e| persistence("fetch_vehicle_id_by_plate", fine_id, e))?
        .ok_or_else(|| AssignmentError::VehicleNotFound { plate: plate.to_string() })?;

    let leases = active_leases_newest_first(port, &vehicle_id)
        .map_err(|e| persistence("list_active_leases_for_vehicle", fine_id, e))?;
    let intervals: Vec<DateInterval> = leases.iter().map(Agreement::interval).collect();

    let matched = find_containing_interval(violation_date, &intervals)
        .and_then(|iv| leases.iter().find(|l| l.id == iv.id))
        .ok_or_else(|| AssignmentError::NoMatchingLeasePeriod {
            vehicle_id: vehicle_id.clone(),
            violation_date,
        })?;

    port.update_fine_assignment(&fine.id, &FineAssignmentPatch::assigned(matched.id.clone()))
        .map_err(|e| persistence("update_fine_assignment", fine_id, e))?;

    log::info!(
        "op=assign_fine fine={} vehicle={vehicle_id} date={violation_date} lease={} customer={}",
        fine.id,
        matched.id,
        matched.customer_id
    );

    Ok(FineAssignment {
        fine_id: fine.id,
        vehicle_id,
        lease_id: matched.id.clone(),
        customer_id: matched.customer_id.clone(),
    })
}

/// Assign every unassigned fine, one at a time.
pub fn auto_assign_fines<P: ReconPort + ?Sized>(port: &P) -> CoreResult<AutoAssignReport> {
    let pending = port.list_fines_by_assignment(AssignmentStatus::Pending)?;
    let mut out = AutoAssignReport::default();

    for fine in &pending {
        match assign_fine_to_customer(port, &fine.id) {
            Ok(assignment) => {
                out.report.record_success();
                out.assignments.push(assignment);
            }
            Err(e) => {
                if e.is_expected() {
                    log::debug!("op=auto_assign_fines fine={} skipped: {e}", fine.id);
                } else {
                    log::warn!("op=auto_assign_fines fine={} failed: {e}", fine.id);
                }
                out.report.record_failure(fine.id.clone(), e.kind(), e.to_string());
            }
        }
    }

    log::info!(
        "op=auto_assign_fines processed={} assigned={} failed={}",
        out.report.processed,
        out.report.succeeded,
        out.report.failed
    );
    Ok(out)
}

/// Re-check every assigned fine and clear assignments that no longer hold.
///
/// An assignment is cleared when its lease is gone, belongs to another
/// vehicle, or no longer covers the violation date.
pub fn validate_fine_assignments<P: ReconPort + ?Sized>(
    port: &P,
    config: &FineValidationConfig,
) -> CoreResult<FineValidationReport> {
    let assigned = port.list_fines_by_assignment(AssignmentStatus::Assigned)?;
    let delay = config.inter_item_delay();
    let mut out = FineValidationReport::default();

    for (i, fine) in assigned.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let verdict = match check_assignment(port, fine) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("op=validate_fines fine={} check failed: {e}", fine.id);
                out.report.record_failure(fine.id.clone(), e.kind(), e.to_string());
                continue;
            }
        };

        match verdict {
            None => out.report.record_success(),
            Some(reason) => match port.update_fine_assignment(&fine.id, &FineAssignmentPatch::cleared()) {
                Ok(()) => {
                    log::info!("op=validate_fines fine={} cleared: {reason}", fine.id);
                    out.report.record_success();
                    out.cleared.push(fine.id.clone());
                }
                Err(e) => {
                    log::error!("op=validate_fines fine={} clear failed: {e}", fine.id);
                    out.report.record_failure(fine.id.clone(), ErrorKind::Persistence, e.to_string());
                }
            },
        }
    }

    log::info!(
        "op=validate_fines processed={} cleared={} failed={}",
        out.report.processed,
        out.cleared.len(),
        out.report.failed
    );
    Ok(out)
}

/// `Ok(None)` when the assignment holds, `Ok(Some(reason))` when it must be cleared.
fn check_assignment<P: ReconPort + ?Sized>(port: &P, fine: &TrafficFine) -> CoreResult<Option<String>> {
    let Some(lease_id) = fine.lease_id.as_deref() else {
        return Ok(Some("assigned without a lease".into()));
    };
    let Some(violation_date) = fine.violation_date else {
        return Ok(Some("no violation date".into()));
    };
    let Some(lease) = port.fetch_lease(lease_id)? else {
        return Ok(Some(format!("lease {lease_id} no longer exists")));
    };
    if !lease.interval().contains(violation_date) {
        return Ok(Some(format!("lease {lease_id} does not cover {violation_date}")));
    }

    let plate = fine.license_plate.as_deref().map(str::trim).unwrap_or_default();
    let vehicle_id = if plate.is_empty() {
        None
    } else {
        port.fetch_vehicle_id_by_plate(plate)?
    };
    if vehicle_id.as_deref() != Some(lease.vehicle_id.as_str()) {
        return Ok(Some(format!("lease {lease_id} is for a different vehicle")));
    }
    Ok(None)
}

fn active_leases_newest_first<P: ReconPort + ?Sized>(port: &P, vehicle_id: &str) -> CoreResult<Vec<Agreement>> {
    let mut leases = port.list_active_leases_for_vehicle(vehicle_id)?;
    leases.retain(|l| l.status == crate::model::AgreementStatus::Active);
    // Same order the agreement audit uses to pick its survivor.
    leases.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    Ok(leases)
}

fn persistence(step: &str, fine_id: &str, e: crate::error::CoreError) -> AssignmentError {
    log::error!("op=assign_fine fine={fine_id} step={step} failed: {e}");
    AssignmentError::from(e)
}
