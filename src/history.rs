use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use crate::domain::RiskResult;

pub const HISTORY_CAPACITY: usize = 5;

/// A result as it was received, kept by value.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
    pub result: RiskResult,
}

/// Most-recent-first buffer of the session's results, capped at
/// [`HISTORY_CAPACITY`]. It only grows through [`ResultHistory::push`].
#[derive(Debug, Clone, Default)]
pub struct ResultHistory {
    entries: VecDeque<HistoryEntry>,
    pushed: u64,
}

impl ResultHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends `result` and evicts whatever falls past the capacity.
    pub fn push(&mut self, result: RiskResult) -> &HistoryEntry {
        self.pushed += 1;
        self.entries.push_front(HistoryEntry {
            sequence: self.pushed,
            received_at: Utc::now(),
            result,
        });
        self.entries.truncate(HISTORY_CAPACITY);

        &self.entries[0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index 0 is the most recent entry.
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Total results ever pushed, including evicted ones.
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }
}
