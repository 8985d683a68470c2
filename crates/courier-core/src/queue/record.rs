//! Task record: one scheduled unit of HTTP work.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{HttpTarget, TaskSubmission, TaskSummary};
use crate::error::Result;

/// Mutable state of a task while it is pending or executing.
///
/// A record lives in exactly one place at a time: inside the store, inside an
/// executing dispatch, or (once terminal) only as a history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub name: String,
    pub target: HttpTarget,

    /// Earliest time the task may be executed.
    pub schedule_time: DateTime<Utc>,

    /// Stored and reported; not enforced by the dispatcher.
    pub dispatch_deadline: Option<Duration>,

    /// Number of execution attempts started so far.
    pub attempt_count: u32,
    pub first_attempt_time: Option<DateTime<Utc>>,
    pub last_attempt_time: Option<DateTime<Utc>>,

    /// Principal to request an identity token for; `None` means no auth header.
    pub service_account_identity: Option<String>,

    /// Retry budget override; the dispatcher default applies when unset.
    pub max_retries: Option<u32>,

    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(name: impl Into<String>, target: HttpTarget, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            target,
            schedule_time: now,
            dispatch_deadline: None,
            attempt_count: 0,
            first_attempt_time: None,
            last_attempt_time: None,
            service_account_identity: None,
            max_retries: None,
            created_at: now,
        }
    }

    /// Build a pending record from a producer submission.
    pub fn from_submission(
        submission: TaskSubmission,
        name: String,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let body = submission.body_bytes()?;
        let target = HttpTarget {
            method: submission.method,
            url: submission.url,
            headers: submission.headers,
            body,
        };
        Ok(Self {
            schedule_time: submission.schedule_time.unwrap_or(now),
            dispatch_deadline: submission.dispatch_deadline,
            service_account_identity: submission.service_account_identity,
            max_retries: submission.max_retries,
            ..Self::new(name, target, now)
        })
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.schedule_time <= now
    }

    /// Stamp a new execution attempt.
    pub fn start_attempt(&mut self, now: DateTime<Utc>) {
        self.attempt_count += 1;
        self.last_attempt_time = Some(now);
        if self.first_attempt_time.is_none() {
            self.first_attempt_time = Some(now);
        }
    }

    /// Move the record to a later due time after a failed attempt.
    pub fn schedule_retry(&mut self, at: DateTime<Utc>) {
        self.schedule_time = at;
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            name: self.name.clone(),
            url: self.target.url.clone(),
            schedule_time: self.schedule_time,
            attempt_count: self.attempt_count,
            first_attempt_time: self.first_attempt_time,
            last_attempt_time: self.last_attempt_time,
        }
    }
}
