//! Execution history entries: the terminal outcome of one task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// Immutable record of how a task ended.
///
/// `status_code` is 0 when the last attempt never produced an HTTP response
/// (DNS failure, refused connection, timeout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHistoryEntry {
    pub task_name: String,
    pub url: String,
    pub status: ExecutionStatus,
    pub status_code: u16,
    pub elapsed_ms: u64,
    pub attempt_count: u32,
    pub recorded_at: DateTime<Utc>,
    pub response_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionHistoryEntry {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Cut `body` to at most `limit` characters on a char boundary.
pub fn truncate_body(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::Success).unwrap(),
            "\"success\""
        );
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::Failed).unwrap(),
            "\"failed\""
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_body("héllo wörld", 4), "héll");
        assert_eq!(truncate_body("short", 500), "short");
        assert_eq!(truncate_body("", 3), "");
    }
}
