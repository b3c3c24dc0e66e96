use super::{timestamp, AgreementRow, SqliteStore};
use crate::{
    error::{CoreError, CoreResult},
    model::{parse_date, parse_enum, parse_opt_date, parse_timestamp, Agreement, AgreementStatus},
};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, OptionalExtension};

const AGREEMENT_COLUMNS: &str = "agreement_id, agreement_number, vehicle_id, customer_id,
        start_date, end_date, status, rent_amount, daily_late_fee, created_at";

impl SqliteStore {
    // ── Agreement ─────────────────────────────────────────────────

    pub fn insert_agreement(&self, a: &Agreement) -> CoreResult<()> {
        self.conn.execute(
            "INSERT INTO agreement (
                agreement_id, agreement_number, vehicle_id, customer_id,
                start_date, end_date, status, rent_amount, daily_late_fee, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                a.id,
                a.agreement_number,
                a.vehicle_id,
                a.customer_id,
                a.start_date.to_string(),
                a.end_date.map(|d| d.to_string()),
                a.status.as_str(),
                a.rent_amount,
                a.daily_late_fee,
                timestamp(&a.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_agreement(&self, agreement_id: &str) -> CoreResult<Option<Agreement>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {AGREEMENT_COLUMNS} FROM agreement WHERE agreement_id = ?1"),
                params![agreement_id],
                Self::map_agreement_row,
            )
            .optional()?;
        row.map(Agreement::try_from).transpose()
    }

    /// Agreements for one vehicle in one status, newest first.
    pub fn agreements_for_vehicle(
        &self,
        vehicle_id: &str,
        status: AgreementStatus,
    ) -> CoreResult<Vec<Agreement>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {AGREEMENT_COLUMNS} FROM agreement
             WHERE vehicle_id = ?1 AND status = ?2
             ORDER BY created_at DESC, agreement_id DESC"
        ))?;
        let rows = stmt
            .query_map(params![vehicle_id, status.as_str()], Self::map_agreement_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Agreement::try_from).collect()
    }

    pub fn agreements_with_status(&self, statuses: &[AgreementStatus]) -> CoreResult<Vec<Agreement>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=statuses.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {AGREEMENT_COLUMNS} FROM agreement
             WHERE status IN ({placeholders})
             ORDER BY vehicle_id ASC, created_at DESC"
        ))?;
        let rows = stmt
            .query_map(
                params_from_iter(statuses.iter().map(|s| s.as_str())),
                Self::map_agreement_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Agreement::try_from).collect()
    }

    pub fn set_agreement_status(&self, agreement_id: &str, status: AgreementStatus) -> CoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE agreement SET status = ?1 WHERE agreement_id = ?2",
            params![status.as_str(), agreement_id],
        )?;
        if changed == 0 {
            return Err(CoreError::not_found("lease", agreement_id));
        }
        Ok(())
    }

    /// Administrative correction of a lease period.
    pub fn update_agreement_period(
        &self,
        agreement_id: &str,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> CoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE agreement SET start_date = ?1, end_date = ?2 WHERE agreement_id = ?3",
            params![start_date.to_string(), end_date.map(|d| d.to_string()), agreement_id],
        )?;
        if changed == 0 {
            return Err(CoreError::not_found("lease", agreement_id));
        }
        Ok(())
    }

    pub fn agreement_count(&self, status: AgreementStatus) -> CoreResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM agreement WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_agreement_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgreementRow> {
        Ok(AgreementRow {
            agreement_id:     row.get(0)?,
            agreement_number: row.get(1)?,
            vehicle_id:       row.get(2)?,
            customer_id:      row.get(3)?,
            start_date:       row.get(4)?,
            end_date:         row.get(5)?,
            status:           row.get(6)?,
            rent_amount:      row.get(7)?,
            daily_late_fee:   row.get(8)?,
            created_at:       row.get(9)?,
        })
    }
}

impl TryFrom<AgreementRow> for Agreement {
    type Error = CoreError;

    fn try_from(row: AgreementRow) -> CoreResult<Self> {
        const ENTITY: &str = "agreement";
        let id = row.agreement_id.as_str();

        let start_date = parse_date(ENTITY, id, "start_date", &row.start_date)?;
        let end_date = parse_opt_date(ENTITY, id, "end_date", row.end_date.as_deref())?;
        if end_date.is_some_and(|end| end < start_date) {
            return Err(CoreError::InvalidRecord {
                entity: ENTITY,
                id: id.to_string(),
                reason: format!("end_date {end_date:?} precedes start_date {start_date}"),
            });
        }
        let status = parse_enum(ENTITY, id, "status", &row.status, AgreementStatus::parse)?;
        let created_at = parse_timestamp(ENTITY, id, &row.created_at)?;

        Ok(Agreement {
            id: row.agreement_id,
            agreement_number: row.agreement_number,
            vehicle_id: row.vehicle_id,
            customer_id: row.customer_id,
            start_date,
            end_date,
            status,
            rent_amount: row.rent_amount,
            daily_late_fee: row.daily_late_fee,
            created_at,
        })
    }
}
