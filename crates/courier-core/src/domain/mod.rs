//! Domain model: task submissions, history entries, queue metadata and priority.

pub mod history;
pub mod priority;
pub mod queue;
pub mod task;

pub use history::{ExecutionHistoryEntry, ExecutionStatus, truncate_body};
pub use priority::OrchestrationPriority;
pub use queue::{QueueDescriptor, QueueRetryConfig, QueueState, RateLimits, queue_path};
pub use task::{HttpMethod, HttpTarget, SubmitAck, TaskSubmission, TaskSummary};
