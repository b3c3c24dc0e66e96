//! Batch result accumulator.
//!
//! Batch operations run items sequentially and never abort on a single
//! failure. Progress is reported through this struct, not through logs.

use crate::{error::ErrorKind, types::EntityId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: EntityId,
    pub kind:    ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed:    usize,
    pub failures:  Vec<ItemFailure>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    /// An item that was looked at but needed no work.
    pub fn record_skipped(&mut self) {
        self.processed += 1;
    }

    pub fn record_failure(&mut self, item_id: impl Into<EntityId>, kind: ErrorKind, message: impl Into<String>) {
        self.processed += 1;
        self.failed += 1;
        self.failures.push(ItemFailure {
            item_id: item_id.into(),
            kind,
            message: message.into(),
        });
    }

    pub fn failures_of(&self, kind: ErrorKind) -> impl Iterator<Item = &ItemFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_track_each_outcome() {
        let mut report = BatchReport::new();
        report.record_success();
        report.record_skipped();
        report.record_failure("F-9", ErrorKind::NoMatch, "outside lease period");
        report.record_failure("F-10", ErrorKind::Persistence, "disk I/O error");

        assert_eq!(report.processed, 4);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.failures_of(ErrorKind::NoMatch).count(), 1);
        assert!(!report.is_clean());
    }
}
