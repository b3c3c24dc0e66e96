//! Temporal interval matching for lease periods.

use crate::types::EntityId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A closed date interval `[start, end]`, or `[start, ∞)` when `end` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
    pub id:    EntityId,
    pub start: NaiveDate,
    pub end:   Option<NaiveDate>,
}

impl DateInterval {
    /// Both bounds are inclusive.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && self.end.map_or(true, |end| date <= end)
    }
}

/// Return the first interval (in caller order) that contains `date`.
///
/// Callers order candidates most-recent-first so the current lease wins
/// overlaps. `None` means the date falls in a gap between rentals.
pub fn find_containing_interval(date: NaiveDate, intervals: &[DateInterval]) -> Option<&DateInterval> {
    intervals.iter().find(|iv| iv.contains(date))
}
