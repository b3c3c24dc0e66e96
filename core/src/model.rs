//! Typed records the reconciliation core operates on.
//!
//! RULE: Nothing outside `store` sees a raw database row.
//! Rows are converted into these types (and validated) on the way out
//! of the store, so reconciliation code never handles loose strings.

use crate::{
    error::{CoreError, CoreResult},
    interval::DateInterval,
    types::{EntityId, Money},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Agreement (lease) ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    Draft,
    PendingPayment,
    PendingDeposit,
    Active,
    Completed,
    Cancelled,
    Terminated,
    Archived,
}

impl AgreementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft          => "draft",
            Self::PendingPayment => "pending_payment",
            Self::PendingDeposit => "pending_deposit",
            Self::Active         => "active",
            Self::Completed      => "completed",
            Self::Cancelled      => "cancelled",
            Self::Terminated     => "terminated",
            Self::Archived       => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "draft"           => Self::Draft,
            "pending_payment" => Self::PendingPayment,
            "pending_deposit" => Self::PendingDeposit,
            "active"          => Self::Active,
            "completed"       => Self::Completed,
            "cancelled"       => Self::Cancelled,
            "terminated"      => Self::Terminated,
            "archived"        => Self::Archived,
            _ => return None,
        })
    }
}

/// A rental contract for one vehicle over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    pub id:               EntityId,
    pub agreement_number: String,
    pub vehicle_id:       EntityId,
    pub customer_id:      EntityId,
    pub start_date:       NaiveDate,
    /// `None` means open-ended (still ongoing).
    pub end_date:         Option<NaiveDate>,
    pub status:           AgreementStatus,
    pub rent_amount:      Money,
    /// Per-day late fee. `None` falls back to the policy default.
    pub daily_late_fee:   Option<Money>,
    pub created_at:       DateTime<Utc>,
}

impl Agreement {
    pub fn interval(&self) -> DateInterval {
        DateInterval {
            id:    self.id.clone(),
            start: self.start_date,
            end:   self.end_date,
        }
    }

    pub fn daily_late_fee_or(&self, default_rate: Money) -> Money {
        self.daily_late_fee.unwrap_or(default_rate)
    }
}

// ── Ledger entry (payment) ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    PartiallyPaid,
    Completed,
    Overdue,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending       => "pending",
            Self::PartiallyPaid => "partially_paid",
            Self::Completed     => "completed",
            Self::Overdue       => "overdue",
            Self::Cancelled     => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending"        => Self::Pending,
            "partially_paid" => Self::PartiallyPaid,
            "completed"      => Self::Completed,
            "overdue"        => Self::Overdue,
            "cancelled"      => Self::Cancelled,
            _ => return None,
        })
    }

    /// Still carries an amount the customer owes.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::PartiallyPaid | Self::Overdue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    #[serde(rename = "rent")]
    Rent,
    #[serde(rename = "deposit")]
    Deposit,
    #[serde(rename = "fee")]
    Fee,
    #[serde(rename = "LATE_PAYMENT_FEE")]
    LatePaymentFee,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rent           => "rent",
            Self::Deposit        => "deposit",
            Self::Fee            => "fee",
            Self::LatePaymentFee => "LATE_PAYMENT_FEE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "rent"             => Self::Rent,
            "deposit"          => Self::Deposit,
            "fee"              => Self::Fee,
            "LATE_PAYMENT_FEE" => Self::LatePaymentFee,
            _ => return None,
        })
    }
}

/// One financial transaction against an agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id:                EntityId,
    pub lease_id:          EntityId,
    pub entry_type:        EntryType,
    /// Contractual amount due for the period.
    pub amount:            Money,
    /// Cumulative amount paid against this entry.
    pub amount_paid:       Money,
    /// Always `max(0, amount - amount_paid)`.
    pub balance:           Money,
    pub status:            PaymentStatus,
    pub payment_date:      Option<NaiveDate>,
    pub original_due_date: Option<NaiveDate>,
    pub days_overdue:      i64,
    pub late_fine_amount:  Money,
    pub payment_method:    Option<String>,
    pub description:       Option<String>,
    pub created_at:        DateTime<Utc>,
}

impl LedgerEntry {
    /// A rent entry whose late fee already has its own LATE_PAYMENT_FEE line.
    pub fn fee_charged_separately(&self, charged: &BTreeSet<NaiveDate>) -> bool {
        self.entry_type == EntryType::Rent
            && self.original_due_date.map_or(false, |due| charged.contains(&due))
    }
}

/// Due dates of a lease's periods that carry a separate late fee entry.
pub fn separately_charged_periods(entries: &[LedgerEntry]) -> BTreeSet<NaiveDate> {
    entries
        .iter()
        .filter(|e| e.entry_type == EntryType::LatePaymentFee && e.status != PaymentStatus::Cancelled)
        .filter_map(|e| e.original_due_date)
        .collect()
}

/// A ledger entry about to be inserted. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub lease_id:          EntityId,
    pub entry_type:        EntryType,
    pub amount:            Money,
    pub amount_paid:       Money,
    pub balance:           Money,
    pub status:            PaymentStatus,
    pub payment_date:      Option<NaiveDate>,
    pub original_due_date: Option<NaiveDate>,
    pub days_overdue:      i64,
    pub late_fine_amount:  Money,
    pub payment_method:    Option<String>,
    pub description:       Option<String>,
}

/// Partial update of a ledger entry. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerPatch {
    pub amount_paid:      Option<Money>,
    pub balance:          Option<Money>,
    pub status:           Option<PaymentStatus>,
    pub payment_date:     Option<NaiveDate>,
    pub payment_method:   Option<String>,
    pub days_overdue:     Option<i64>,
    pub late_fine_amount: Option<Money>,
}

impl LedgerPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ── Traffic fine ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinePaymentStatus {
    Pending,
    Paid,
    Disputed,
}

impl FinePaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending  => "pending",
            Self::Paid     => "paid",
            Self::Disputed => "disputed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending"  => Self::Pending,
            "paid"     => Self::Paid,
            "disputed" => Self::Disputed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Assigned,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending  => "pending",
            Self::Assigned => "assigned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending"  => Self::Pending,
            "assigned" => Self::Assigned,
            _ => return None,
        })
    }
}

/// An externally issued violation, identified by plate and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficFine {
    pub id:                EntityId,
    pub license_plate:     Option<String>,
    pub violation_date:    Option<NaiveDate>,
    pub fine_amount:       Money,
    pub payment_status:    FinePaymentStatus,
    pub vehicle_id:        Option<EntityId>,
    pub lease_id:          Option<EntityId>,
    pub assignment_status: AssignmentStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FineAssignmentPatch {
    pub lease_id:          Option<EntityId>,
    pub assignment_status: AssignmentStatus,
}

impl FineAssignmentPatch {
    pub fn assigned(lease_id: impl Into<EntityId>) -> Self {
        Self {
            lease_id:          Some(lease_id.into()),
            assignment_status: AssignmentStatus::Assigned,
        }
    }

    pub fn cleared() -> Self {
        Self {
            lease_id:          None,
            assignment_status: AssignmentStatus::Pending,
        }
    }
}

// ── Vehicle ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id:            EntityId,
    pub license_plate: String,
    pub make:          String,
    pub model:         String,
}

// ── Parsing helpers shared by row conversions ─────────────────────

pub(crate) fn parse_date(
    entity: &'static str,
    id: &str,
    field: &str,
    raw: &str,
) -> CoreResult<NaiveDate> {
    // Accept both plain dates and full timestamps; keep the calendar day.
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| CoreError::InvalidRecord {
        entity,
        id: id.to_string(),
        reason: format!("{field} '{raw}' is not a date: {e}"),
    })
}

pub(crate) fn parse_opt_date(
    entity: &'static str,
    id: &str,
    field: &str,
    raw: Option<&str>,
) -> CoreResult<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => parse_date(entity, id, field, s).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn parse_timestamp(
    entity: &'static str,
    id: &str,
    raw: &str,
) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CoreError::InvalidRecord {
            entity,
            id: id.to_string(),
            reason: format!("created_at '{raw}' is not RFC 3339: {e}"),
        })
}

pub(crate) fn parse_enum<T>(
    entity: &'static str,
    id: &str,
    field: &str,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> CoreResult<T> {
    parse(raw).ok_or_else(|| CoreError::InvalidRecord {
        entity,
        id: id.to_string(),
        reason: format!("unknown {field} '{raw}'"),
    })
}
