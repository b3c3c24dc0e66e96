//! Late fee calculation for monthly rent.
//!
//! Rent is due on the 1st. Every day after the grace day accrues the
//! daily rate, and the total is capped. Only the month of the payment
//! date is considered; multi-month arrears are not extended here.

use crate::{config::LateFeePolicy, types::Money};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DAILY_LATE_FEE: Money = 120.0;
pub const DEFAULT_LATE_FEE_CAP: Money = 3000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LateFee {
    pub days_late:  i64,
    pub fee_amount: Money,
}

impl LateFee {
    pub const NONE: LateFee = LateFee { days_late: 0, fee_amount: 0.0 };

    pub fn is_charged(&self) -> bool {
        self.fee_amount > 0.0
    }
}

/// Late fee for a rent payment made on `payment_date`, with the grace
/// period running through the 1st of the month.
pub fn compute_late_fee(payment_date: NaiveDate, daily_rate: Money, cap_amount: Money) -> LateFee {
    compute_with_grace(payment_date, 1, daily_rate, cap_amount)
}

fn compute_with_grace(payment_date: NaiveDate, grace_day: u32, daily_rate: Money, cap_amount: Money) -> LateFee {
    let day = payment_date.day();
    if day <= grace_day {
        return LateFee::NONE;
    }
    let days_late = i64::from(day - grace_day);
    // Negative rates or caps are treated as zero; a fee never credits the customer.
    let accrued = days_late as f64 * daily_rate.max(0.0);
    LateFee {
        days_late,
        fee_amount: accrued.min(cap_amount.max(0.0)),
    }
}

impl LateFeePolicy {
    /// Apply this policy with an agreement-specific daily rate.
    pub fn compute(&self, payment_date: NaiveDate, daily_rate: Money) -> LateFee {
        compute_with_grace(payment_date, self.grace_day, daily_rate, self.cap_amount)
    }

    /// Fee for `days` days overdue, independent of the calendar.
    pub fn fee_for_days(&self, days: i64, daily_rate: Money) -> Money {
        if days <= 0 {
            return 0.0;
        }
        (days as f64 * daily_rate.max(0.0)).min(self.cap_amount.max(0.0))
    }
}

/// Human-readable line item text for a separate late payment fee entry.
pub fn late_fee_description(payment_date: NaiveDate, fee: &LateFee) -> String {
    format!(
        "Late payment fee for {} ({} day{} late)",
        payment_date.format("%B %Y"),
        fee.days_late,
        if fee.days_late == 1 { "" } else { "s" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn payment_on_the_first_is_never_late() {
        assert_eq!(compute_late_fee(d(1), 120.0, 3000.0), LateFee::NONE);
    }

    #[test]
    fn fifteenth_of_month_accrues_fourteen_days() {
        let fee = compute_late_fee(d(15), 120.0, 3000.0);
        assert_eq!(fee.days_late, 14);
        assert_eq!(fee.fee_amount, 1680.0);
    }

    #[test]
    fn thirtieth_of_month_hits_the_cap() {
        let fee = compute_late_fee(d(30), 120.0, 3000.0);
        assert_eq!(fee.days_late, 29);
        assert_eq!(fee.fee_amount, 3000.0);
    }

    #[test]
    fn fee_never_exceeds_cap_for_any_day_or_rate() {
        for day in 2..=31 {
            for rate in [0.0, 1.0, 50.0, 120.0, 999.0] {
                for cap in [0.0, 100.0, 3000.0] {
                    let fee = compute_late_fee(d(day), rate, cap);
                    assert_eq!(fee.days_late, i64::from(day) - 1);
                    let expected = (fee.days_late as f64 * rate).min(cap);
                    assert_eq!(fee.fee_amount, expected);
                    assert!(fee.fee_amount <= cap);
                }
            }
        }
    }

    #[test]
    fn description_names_month_and_day_count() {
        let fee = compute_late_fee(d(2), 120.0, 3000.0);
        assert_eq!(late_fee_description(d(2), &fee), "Late payment fee for March 2024 (1 day late)");
    }

    #[test]
    fn policy_fee_for_days_is_capped() {
        let policy = LateFeePolicy::default();
        assert_eq!(policy.fee_for_days(0, 120.0), 0.0);
        assert_eq!(policy.fee_for_days(10, 120.0), 1200.0);
        assert_eq!(policy.fee_for_days(90, 120.0), 3000.0);
    }
}
