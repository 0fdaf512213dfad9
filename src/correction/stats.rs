use serde::Serialize;

use super::{status::TableStatus, types::CorrectionFile};

/// Per-status table counts of one correction file or many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorrectionStats {
    pub total: usize,
    pub undefined: usize,
    pub confirmed_without_changes: usize,
    pub confirmed_with_changes: usize,
    pub rejected: usize,
    pub merged: usize,
}

impl CorrectionStats {
    pub fn record(&mut self, status: &TableStatus) {
        self.total += 1;
        match status {
            TableStatus::Undefined => self.undefined += 1,
            TableStatus::ConfirmedWithoutChanges => self.confirmed_without_changes += 1,
            TableStatus::ConfirmedWithChanges => self.confirmed_with_changes += 1,
            TableStatus::Rejected => self.rejected += 1,
            TableStatus::Merged(_) => self.merged += 1,
        }
    }

    pub fn from_file(file: &CorrectionFile) -> Self {
        let mut stats = Self::default();
        for correction in file.tables.values() {
            stats.record(&correction.status);
        }
        stats
    }

    pub fn merge(&mut self, other: &Self) {
        self.total += other.total;
        self.undefined += other.undefined;
        self.confirmed_without_changes += other.confirmed_without_changes;
        self.confirmed_with_changes += other.confirmed_with_changes;
        self.rejected += other.rejected;
        self.merged += other.merged;
    }

    pub fn resolved(&self) -> usize {
        self.total - self.undefined
    }
}

impl std::fmt::Display for CorrectionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} resolved (unchanged {}, changed {}, rejected {}, merged {})",
            self.resolved(),
            self.total,
            self.confirmed_without_changes,
            self.confirmed_with_changes,
            self.rejected,
            self.merged,
        )
    }
}
