use super::{new_id, timestamp, LedgerEntryRow, SqliteStore};
use crate::{
    error::{CoreError, CoreResult},
    model::{
        parse_enum, parse_opt_date, parse_timestamp, EntryType, LedgerEntry, LedgerPatch,
        NewLedgerEntry, PaymentStatus,
    },
    types::EntityId,
};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

const LEDGER_COLUMNS: &str = "entry_id, lease_id, entry_type, amount, amount_paid, balance,
        status, payment_date, original_due_date, days_overdue, late_fine_amount,
        payment_method, description, created_at";

impl SqliteStore {
    // ── Ledger entries ────────────────────────────────────────────

    pub fn insert_new_ledger_entry(&self, e: &NewLedgerEntry) -> CoreResult<EntityId> {
        let entry_id = new_id("pay");
        self.conn.execute(
            "INSERT INTO ledger_entry (
                entry_id, lease_id, entry_type, amount, amount_paid, balance,
                status, payment_date, original_due_date, days_overdue, late_fine_amount,
                payment_method, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                entry_id,
                e.lease_id,
                e.entry_type.as_str(),
                e.amount,
                e.amount_paid,
                e.balance.max(0.0),
                e.status.as_str(),
                e.payment_date.map(|d| d.to_string()),
                e.original_due_date.map(|d| d.to_string()),
                e.days_overdue,
                e.late_fine_amount,
                e.payment_method,
                e.description,
                timestamp(&Utc::now()),
            ],
        )?;
        Ok(entry_id)
    }

    pub fn get_ledger_entry(&self, entry_id: &str) -> CoreResult<Option<LedgerEntry>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {LEDGER_COLUMNS} FROM ledger_entry WHERE entry_id = ?1"),
                params![entry_id],
                Self::map_ledger_row,
            )
            .optional()?;
        row.map(LedgerEntry::try_from).transpose()
    }

    pub fn ledger_entries_for_lease(&self, lease_id: &str) -> CoreResult<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_entry
             WHERE lease_id = ?1
             ORDER BY created_at ASC, entry_id ASC"
        ))?;
        let rows = stmt
            .query_map(params![lease_id], Self::map_ledger_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    pub fn open_ledger_entries(&self) -> CoreResult<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_entry
             WHERE status IN ('pending', 'partially_paid', 'overdue')
             ORDER BY original_due_date ASC, entry_id ASC"
        ))?;
        let rows = stmt
            .query_map([], Self::map_ledger_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    /// Apply a patch; `None` fields keep their stored value.
    pub fn apply_ledger_patch(&self, entry_id: &str, p: &LedgerPatch) -> CoreResult<()> {
        if p.is_empty() {
            return Ok(());
        }
        let changed = self.conn.execute(
            "UPDATE ledger_entry SET
                amount_paid      = COALESCE(?1, amount_paid),
                balance          = COALESCE(?2, balance),
                status           = COALESCE(?3, status),
                payment_date     = COALESCE(?4, payment_date),
                payment_method   = COALESCE(?5, payment_method),
                days_overdue     = COALESCE(?6, days_overdue),
                late_fine_amount = COALESCE(?7, late_fine_amount)
             WHERE entry_id = ?8",
            params![
                p.amount_paid,
                p.balance.map(|b| b.max(0.0)),
                p.status.map(|s| s.as_str()),
                p.payment_date.map(|d| d.to_string()),
                p.payment_method,
                p.days_overdue,
                p.late_fine_amount,
                entry_id,
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::not_found("ledger entry", entry_id));
        }
        Ok(())
    }

    pub fn ledger_entry_count(&self, lease_id: &str) -> CoreResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM ledger_entry WHERE lease_id = ?1",
            params![lease_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_ledger_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntryRow> {
        Ok(LedgerEntryRow {
            entry_id:          row.get(0)?,
            lease_id:          row.get(1)?,
            entry_type:        row.get(2)?,
            amount:            row.get(3)?,
            amount_paid:       row.get(4)?,
            balance:           row.get(5)?,
            status:            row.get(6)?,
            payment_date:      row.get(7)?,
            original_due_date: row.get(8)?,
            days_overdue:      row.get(9)?,
            late_fine_amount:  row.get(10)?,
            payment_method:    row.get(11)?,
            description:       row.get(12)?,
            created_at:        row.get(13)?,
        })
    }
}

impl TryFrom<LedgerEntryRow> for LedgerEntry {
    type Error = CoreError;

    fn try_from(row: LedgerEntryRow) -> CoreResult<Self> {
        const ENTITY: &str = "ledger entry";
        let id = row.entry_id.as_str();

        let entry_type = parse_enum(ENTITY, id, "entry_type", &row.entry_type, EntryType::parse)?;
        let status = parse_enum(ENTITY, id, "status", &row.status, PaymentStatus::parse)?;
        let payment_date = parse_opt_date(ENTITY, id, "payment_date", row.payment_date.as_deref())?;
        let original_due_date =
            parse_opt_date(ENTITY, id, "original_due_date", row.original_due_date.as_deref())?;
        let created_at = parse_timestamp(ENTITY, id, &row.created_at)?;

        Ok(LedgerEntry {
            id: row.entry_id,
            lease_id: row.lease_id,
            entry_type,
            amount: row.amount,
            amount_paid: row.amount_paid,
            balance: row.balance.max(0.0),
            status,
            payment_date,
            original_due_date,
            days_overdue: row.days_overdue,
            late_fine_amount: row.late_fine_amount,
            payment_method: row.payment_method,
            description: row.description,
            created_at,
        })
    }
}
