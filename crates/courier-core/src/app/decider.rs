//! Decision model: what happens to a task after an execution attempt.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::queue::{BackoffPolicy, TaskRecord};

/// Result of one execution attempt, as observed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    /// HTTP status, or 0 when no response was received.
    pub status_code: u16,
    pub body: String,
    /// Transport failure message, when there was no response.
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl AttemptReport {
    /// Any status below 400 counts as delivered.
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.status_code != 0 && self.status_code < 400
    }
}

/// The next action for a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Delivered; record success and drop the task.
    Complete,

    /// Put the task back with a later due time.
    Retry {
        at: DateTime<Utc>,
        delay: Duration,
        reason: String,
    },

    /// Retries exhausted; record failure and drop the task.
    GiveUp { reason: String },
}

/// Pure policy: given the task (already stamped with the attempt) and the
/// attempt's report, decide the next action. No side effects.
pub trait Decider: Send + Sync {
    fn decide(&self, task: &TaskRecord, report: &AttemptReport, now: DateTime<Utc>) -> Decision;
}

/// Retry-budget decider with exponential backoff.
///
/// A task gets one initial attempt plus up to `max_retries` retries (the
/// task's own override wins). After a failed attempt with `attempt_count = k`:
/// - retry at `now + delay(k)` if `k <= max_retries`
/// - give up otherwise
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    backoff: BackoffPolicy,
    max_retries: u32,
}

impl DefaultDecider {
    pub fn new(backoff: BackoffPolicy, max_retries: u32) -> Self {
        Self {
            backoff,
            max_retries,
        }
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, task: &TaskRecord, report: &AttemptReport, now: DateTime<Utc>) -> Decision {
        if report.succeeded() {
            return Decision::Complete;
        }

        let max_retries = task.max_retries.unwrap_or(self.max_retries);
        let attempts = task.attempt_count;
        if attempts > max_retries {
            return Decision::GiveUp {
                reason: format!(
                    "retries exhausted after {attempts} attempts (max_retries={max_retries})"
                ),
            };
        }

        let delay = self.backoff.delay(attempts);
        Decision::Retry {
            at: after(now, delay),
            delay,
            reason: format!("retry {attempts}/{max_retries} after {delay:?}"),
        }
    }
}

/// `now + delay`, saturating at the largest representable instant.
pub(crate) fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
