use thiserror::Error;

/// Result alias used across courier-core.
pub type Result<T> = std::result::Result<T, CourierError>;

#[derive(Debug, Error)]
pub enum CourierError {
    /// Invalid or missing configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The resolver has no route for this category and no fallback.
    #[error("unknown task category '{category}' and no fallback route configured")]
    UnknownCategory { category: String },

    /// A queue-name or URL template references a token with no value.
    #[error("template '{template}' references unknown token '{token}'")]
    MissingToken { template: String, token: String },

    /// The task store could not be read or written.
    #[error("task store error: {0}")]
    Store(String),

    /// The backing task-queue service rejected or failed a management call.
    #[error("queue admin error ({operation} {queue}): {message}")]
    QueueAdmin {
        operation: &'static str,
        queue: String,
        message: String,
    },

    /// The app configuration service could not be reached or returned garbage.
    #[error("app config fetch failed for '{app_id}': {message}")]
    AppConfig { app_id: String, message: String },

    /// An access or identity token could not be obtained.
    #[error("auth error: {0}")]
    Auth(String),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CourierError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn queue_admin(
        operation: &'static str,
        queue: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueAdmin {
            operation,
            queue: queue.into(),
            message: message.into(),
        }
    }

    /// True for errors raised at setup time that callers must fix, not retry.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::UnknownCategory { .. } | Self::MissingToken { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_names_the_category() {
        let err = CourierError::UnknownCategory {
            category: "medication_extraction".to_string(),
        };
        assert!(err.to_string().contains("medication_extraction"));
        assert!(err.is_configuration());
    }

    #[test]
    fn queue_admin_error_is_not_configuration() {
        let err = CourierError::queue_admin("create", "acme-extract", "503 unavailable");
        let msg = err.to_string();
        assert!(msg.contains("create acme-extract"));
        assert!(msg.contains("503"));
        assert!(!err.is_configuration());
    }
}
