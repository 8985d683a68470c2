//! Status views for dispatcher introspection.

use serde::{Deserialize, Serialize};

use crate::domain::ExecutionHistoryEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStatus {
    pub running: bool,
    /// Tasks waiting in the store (executing tasks are not counted).
    pub queue_size: usize,
    /// Terminal outcomes recorded since the dispatcher was built.
    pub completed_count: u64,
    pub recent_history: Vec<ExecutionHistoryEntry>,
}

impl DispatcherStatus {
    pub fn succeeded(&self) -> usize {
        self.recent_history.iter().filter(|e| e.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.recent_history.len() - self.succeeded()
    }
}
