//! Bounded execution history owned by one dispatcher.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::domain::ExecutionHistoryEntry;

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

struct HistoryState {
    entries: VecDeque<ExecutionHistoryEntry>,
    total: u64,
}

/// Append-only ring of terminal outcomes.
///
/// Keeps the newest `capacity` entries; `total_recorded` keeps counting past
/// evictions.
pub struct ExecutionHistoryLog {
    capacity: usize,
    state: Mutex<HistoryState>,
}

impl Default for ExecutionHistoryLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ExecutionHistoryLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(HistoryState {
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
                total: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn record(&self, entry: ExecutionHistoryEntry) {
        let mut state = self.state.lock().await;
        if state.entries.len() == self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(entry);
        state.total += 1;
    }

    pub async fn total_recorded(&self) -> u64 {
        self.state.lock().await.total
    }

    /// Newest `limit` entries, oldest first.
    pub async fn recent(&self, limit: usize) -> Vec<ExecutionHistoryEntry> {
        let state = self.state.lock().await;
        let skip = state.entries.len().saturating_sub(limit);
        state.entries.iter().skip(skip).cloned().collect()
    }

    pub async fn entries(&self) -> Vec<ExecutionHistoryEntry> {
        self.state.lock().await.entries.iter().cloned().collect()
    }
}
