use super::SqliteStore;
use crate::{error::CoreResult, model::Vehicle, types::EntityId};
use rusqlite::{params, OptionalExtension};

impl SqliteStore {
    // ── Vehicle ───────────────────────────────────────────────────

    pub fn insert_vehicle(&self, v: &Vehicle) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO vehicle (vehicle_id, license_plate, make, model)
             VALUES (?1, ?2, ?3, ?4)",
            params![v.id, v.license_plate, v.make, v.model],
        )?;
        Ok(())
    }

    /// Exact match on the plate as stored.
    pub fn vehicle_id_by_plate(&self, plate: &str) -> CoreResult<Option<EntityId>> {
        let id = self
            .conn
            .query_row(
                "SELECT vehicle_id FROM vehicle WHERE license_plate = ?1",
                params![plate],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn get_vehicle(&self, vehicle_id: &str) -> CoreResult<Option<Vehicle>> {
        let vehicle = self
            .conn
            .query_row(
                "SELECT vehicle_id, license_plate, make, model FROM vehicle WHERE vehicle_id = ?1",
                params![vehicle_id],
                |row| {
                    Ok(Vehicle {
                        id:            row.get(0)?,
                        license_plate: row.get(1)?,
                        make:          row.get(2)?,
                        model:         row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(vehicle)
    }

    pub fn vehicle_count(&self) -> CoreResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vehicle", [], |row| row.get(0))?;
        Ok(count)
    }
}
