//! fleetdesk-core: the financial obligation reconciliation engine of the
//! FleetDesk rental back office.
//!
//! Late fees and running balances for rent, resolution of partial and
//! repeated payments into a consistent ledger, attribution of traffic
//! fines to the lease active on the violation date, and the
//! one-authoritative-agreement-per-vehicle audit.

pub mod agreement_conflicts;
pub mod balance;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod fine_assignment;
pub mod interval;
pub mod late_fee;
pub mod ledger_resolver;
pub mod model;
pub mod overdue;
pub mod port;
pub mod special_payment;
pub mod store;
pub mod types;
