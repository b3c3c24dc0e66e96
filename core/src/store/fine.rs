use super::{SqliteStore, TrafficFineRow};
use crate::{
    error::{CoreError, CoreResult},
    model::{parse_enum, parse_opt_date, AssignmentStatus, FineAssignmentPatch, FinePaymentStatus, TrafficFine},
};
use rusqlite::{params, OptionalExtension};

const FINE_COLUMNS: &str = "fine_id, license_plate, violation_date, fine_amount,
        payment_status, vehicle_id, lease_id, assignment_status";

impl SqliteStore {
    // ── Traffic fines ─────────────────────────────────────────────

    pub fn insert_fine(&self, f: &TrafficFine) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO traffic_fine (
                fine_id, license_plate, violation_date, fine_amount,
                payment_status, vehicle_id, lease_id, assignment_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                f.id,
                f.license_plate,
                f.violation_date.map(|d| d.to_string()),
                f.fine_amount,
                f.payment_status.as_str(),
                f.vehicle_id,
                f.lease_id,
                f.assignment_status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_fine(&self, fine_id: &str) -> CoreResult<Option<TrafficFine>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {FINE_COLUMNS} FROM traffic_fine WHERE fine_id = ?1"),
                params![fine_id],
                Self::map_fine_row,
            )
            .optional()?;
        row.map(TrafficFine::try_from).transpose()
    }

    pub fn fines_by_assignment(&self, status: AssignmentStatus) -> CoreResult<Vec<TrafficFine>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FINE_COLUMNS} FROM traffic_fine
             WHERE assignment_status = ?1
             ORDER BY violation_date ASC, fine_id ASC"
        ))?;
        let rows = stmt
            .query_map(params![status.as_str()], Self::map_fine_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TrafficFine::try_from).collect()
    }

    pub fn set_fine_assignment(&self, fine_id: &str, patch: &FineAssignmentPatch) -> CoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE traffic_fine SET lease_id = ?1, assignment_status = ?2 WHERE fine_id = ?3",
            params![patch.lease_id, patch.assignment_status.as_str(), fine_id],
        )?;
        if changed == 0 {
            return Err(CoreError::not_found("fine", fine_id));
        }
        Ok(())
    }

    pub fn fine_count(&self, status: AssignmentStatus) -> CoreResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM traffic_fine WHERE assignment_status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_fine_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrafficFineRow> {
        Ok(TrafficFineRow {
            fine_id:           row.get(0)?,
            license_plate:     row.get(1)?,
            violation_date:    row.get(2)?,
            fine_amount:       row.get(3)?,
            payment_status:    row.get(4)?,
            vehicle_id:        row.get(5)?,
            lease_id:          row.get(6)?,
            assignment_status: row.get(7)?,
        })
    }
}

impl TryFrom<TrafficFineRow> for TrafficFine {
    type Error = CoreError;

    fn try_from(row: TrafficFineRow) -> CoreResult<Self> {
        const ENTITY: &str = "fine";
        let id = row.fine_id.as_str();

        let violation_date = parse_opt_date(ENTITY, id, "violation_date", row.violation_date.as_deref())?;
        let payment_status =
            parse_enum(ENTITY, id, "payment_status", &row.payment_status, FinePaymentStatus::parse)?;
        let assignment_status =
            parse_enum(ENTITY, id, "assignment_status", &row.assignment_status, AssignmentStatus::parse)?;

        Ok(TrafficFine {
            id: row.fine_id,
            license_plate: row.license_plate,
            violation_date,
            fine_amount: row.fine_amount,
            payment_status,
            vehicle_id: row.vehicle_id,
            lease_id: row.lease_id,
            assignment_status,
        })
    }
}
