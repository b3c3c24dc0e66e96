//! Shared primitive types used across the reconciliation core.

/// A stable, unique identifier for any persisted record.
pub type EntityId = String;

/// A currency amount. The ledger is single-currency; amounts are
/// expressed in whole currency units with fractional cents.
pub type Money = f64;

/// Amounts closer than this are treated as equal when comparing balances.
pub const MONEY_EPSILON: Money = 0.005;
