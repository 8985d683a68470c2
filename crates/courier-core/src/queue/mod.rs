//! Task queue: pending-task store, retry backoff and execution history.

mod backoff;
mod history;
mod memory;
mod record;

pub use backoff::BackoffPolicy;
pub use history::{DEFAULT_HISTORY_CAPACITY, ExecutionHistoryLog};
pub use memory::InMemoryTaskStore;
pub use record::TaskRecord;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::TaskSummary;
use crate::error::Result;

/// Store port for pending tasks.
///
/// The dispatcher and producers share one store; implementations must make
/// `extract_due` atomic with respect to `enqueue` and other extracts.
#[async_trait]
pub trait TaskQueueStore: Send + Sync {
    /// Insert a pending record. Names are not required to be unique.
    async fn enqueue(&self, record: TaskRecord) -> Result<()>;

    /// Remove and return every record with `schedule_time <= now`.
    async fn extract_due(&self, now: DateTime<Utc>) -> Result<Vec<TaskRecord>>;

    async fn size(&self) -> Result<usize>;

    /// Read-only view of pending records, earliest due first.
    async fn snapshot(&self) -> Result<Vec<TaskSummary>>;
}
