//! Physical queue metadata as seen by the queue-management service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    #[default]
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimits {
    pub max_concurrent_dispatches: u32,
    pub max_dispatches_per_second: f64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            max_concurrent_dispatches: 1000,
            max_dispatches_per_second: 500.0,
        }
    }
}

/// Retry settings the backing service applies to tasks in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRetryConfig {
    pub max_attempts: i32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub max_doublings: i32,
}

impl Default for QueueRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            min_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(3600),
            max_doublings: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDescriptor {
    pub name: String,
    pub location: String,
    pub project: String,
    #[serde(default)]
    pub rate_limits: RateLimits,
    #[serde(default)]
    pub retry_config: QueueRetryConfig,
    #[serde(default)]
    pub state: QueueState,
}

impl QueueDescriptor {
    /// A running queue with default rate limits and retry settings.
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            project: project.into(),
            rate_limits: RateLimits::default(),
            retry_config: QueueRetryConfig::default(),
            state: QueueState::Running,
        }
    }

    pub fn with_rate_limits(mut self, rate_limits: RateLimits) -> Self {
        self.rate_limits = rate_limits;
        self
    }

    pub fn with_retry_config(mut self, retry_config: QueueRetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// `projects/{project}/locations/{location}/queues/{name}`
    pub fn path(&self) -> String {
        queue_path(&self.project, &self.location, &self.name)
    }
}

pub fn queue_path(project: &str, location: &str, name: &str) -> String {
    format!("projects/{project}/locations/{location}/queues/{name}")
}
