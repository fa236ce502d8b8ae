//! Per-tick record of every mutation to the simulation.
//!
//! Mutators append a [`ChangeRecord`] in the same step that changes the
//! authoritative state. The tick engine drains the log exactly once per tick
//! and ships the records to clients in emission order.

use log::warn;
use shared::ChangeRecord;

/// Records one tick is expected to produce at most. Passing it means
/// something is generating changes in a loop.
pub const EXPECTED_MAX_RECORDS: usize = 4096;

#[derive(Debug, Default)]
pub struct ChangeLog {
    records: Vec<ChangeRecord>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self {
            records: Vec::with_capacity(64),
        }
    }

    /// Appends a record. Records are never dropped, even past the expected bound.
    pub fn push(&mut self, record: ChangeRecord) {
        if self.records.len() == EXPECTED_MAX_RECORDS {
            warn!(
                "Change log passed {} records in a single tick",
                EXPECTED_MAX_RECORDS
            );
        }
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Hands out everything recorded so far and leaves the log empty.
    pub fn flush(&mut self) -> Vec<ChangeRecord> {
        std::mem::take(&mut self.records)
    }
}
