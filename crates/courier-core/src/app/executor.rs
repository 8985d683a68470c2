//! Single-attempt HTTP execution of a task.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::decider::AttemptReport;
use crate::error::Result;
use crate::ports::{DispatchRequest, HttpSink, SinkFactory, TokenProvider};
use crate::queue::TaskRecord;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Builds and sends one attempt's HTTP request.
#[derive(Clone)]
pub struct TaskExecutor {
    sink: Arc<dyn HttpSink>,
    tokens: Arc<dyn TokenProvider>,
    request_timeout: Duration,
    token_timeout: Duration,
}

impl TaskExecutor {
    pub fn new(
        sink: Arc<dyn HttpSink>,
        tokens: Arc<dyn TokenProvider>,
        request_timeout: Duration,
        token_timeout: Duration,
    ) -> Self {
        Self {
            sink,
            tokens,
            request_timeout,
            token_timeout,
        }
    }

    /// Run one attempt. Never fails: transport problems come back as a report
    /// with status 0.
    pub async fn execute(&self, task: &TaskRecord) -> AttemptReport {
        let mut headers = request_headers(task);
        if let Some(token) = self.identity_token(task).await {
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }

        let request = DispatchRequest {
            method: task.target.method,
            url: task.target.url.clone(),
            headers,
            body: task.target.body.clone(),
            timeout: self.request_timeout,
        };

        let started = Instant::now();
        // The sink applies the timeout; this outer bound covers sinks that don't.
        let result = tokio::time::timeout(
            self.request_timeout + Duration::from_secs(1),
            self.sink.send(request),
        )
        .await;
        let elapsed = started.elapsed();

        match result {
            Ok(Ok(response)) => AttemptReport {
                status_code: response.status,
                body: response.body,
                error: None,
                elapsed,
            },
            Ok(Err(e)) => AttemptReport {
                status_code: 0,
                body: String::new(),
                error: Some(e.to_string()),
                elapsed,
            },
            Err(_) => AttemptReport {
                status_code: 0,
                body: String::new(),
                error: Some(format!("request timed out after {:?}", self.request_timeout)),
                elapsed,
            },
        }
    }

    async fn identity_token(&self, task: &TaskRecord) -> Option<String> {
        let principal = task.service_account_identity.as_deref()?;
        let audience = task.target.url.as_str();
        match tokio::time::timeout(
            self.token_timeout,
            self.tokens.identity_token(principal, audience),
        )
        .await
        {
            Ok(Some(token)) if !token.is_empty() => Some(token),
            Ok(_) => {
                warn!(task = %task.name, principal, "no identity token; sending without Authorization");
                None
            }
            Err(_) => {
                warn!(
                    task = %task.name,
                    principal,
                    timeout_ms = self.token_timeout.as_millis() as u64,
                    "identity token timed out; sending without Authorization"
                );
                None
            }
        }
    }
}

/// Everything needed to build a [`TaskExecutor`] except the live sink.
#[derive(Clone)]
pub(crate) struct ExecutorFactory {
    sinks: SinkFactory,
    tokens: Arc<dyn TokenProvider>,
    request_timeout: Duration,
    token_timeout: Duration,
}

impl ExecutorFactory {
    pub(crate) fn new(
        sinks: SinkFactory,
        tokens: Arc<dyn TokenProvider>,
        request_timeout: Duration,
        token_timeout: Duration,
    ) -> Self {
        Self {
            sinks,
            tokens,
            request_timeout,
            token_timeout,
        }
    }

    pub(crate) fn build(&self) -> Result<Arc<TaskExecutor>> {
        Ok(Arc::new(TaskExecutor::new(
            (self.sinks)()?,
            Arc::clone(&self.tokens),
            self.request_timeout,
            self.token_timeout,
        )))
    }
}

/// Caller headers plus `Content-Type: application/json` when a body is present
/// and no content type was given (checked case-insensitively).
pub fn request_headers(task: &TaskRecord) -> BTreeMap<String, String> {
    let mut headers = task.target.headers.clone();
    if task.target.body.is_some() && task.target.header("content-type").is_none() {
        debug!(task = %task.name, "defaulting Content-Type");
        headers.insert("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HttpMethod, HttpTarget};
    use crate::ports::{DispatchResponse, NoTokenProvider, TransportError};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        requests: Mutex<Vec<DispatchRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl HttpSink for CapturingSink {
        async fn send(&self, request: DispatchRequest) -> std::result::Result<DispatchResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            if self.fail {
                Err(TransportError::Connect("dns error".into()))
            } else {
                Ok(DispatchResponse {
                    status: 201,
                    body: "ok".into(),
                })
            }
        }
    }

    struct FixedToken(Option<&'static str>);

    #[async_trait]
    impl TokenProvider for FixedToken {
        async fn identity_token(&self, _principal: &str, _audience: &str) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    struct HangingToken;

    #[async_trait]
    impl TokenProvider for HangingToken {
        async fn identity_token(&self, _principal: &str, _audience: &str) -> Option<String> {
            std::future::pending().await
        }
    }

    fn task(body: Option<&str>, identity: Option<&str>) -> TaskRecord {
        let mut target = HttpTarget::new(HttpMethod::Post, "http://svc/run");
        if let Some(b) = body {
            target = target.with_body(b.as_bytes().to_vec());
        }
        let mut record = TaskRecord::new("t", target, Utc::now());
        record.service_account_identity = identity.map(str::to_string);
        record
    }

    fn executor(sink: Arc<CapturingSink>, tokens: Arc<dyn TokenProvider>) -> TaskExecutor {
        TaskExecutor::new(
            sink,
            tokens,
            Duration::from_secs(2),
            Duration::from_millis(50),
        )
    }

    #[test]
    fn content_type_defaults_only_with_body() {
        assert_eq!(
            request_headers(&task(Some("{}"), None)).get("Content-Type").map(String::as_str),
            Some(DEFAULT_CONTENT_TYPE)
        );
        assert!(request_headers(&task(None, None)).is_empty());

        let mut custom = task(Some("a,b"), None);
        custom
            .target
            .headers
            .insert("content-type".into(), "text/csv".into());
        let headers = request_headers(&custom);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("content-type").map(String::as_str), Some("text/csv"));
    }

    #[tokio::test]
    async fn attaches_bearer_token_when_identity_is_set() {
        let sink = Arc::new(CapturingSink::default());
        let report = executor(Arc::clone(&sink), Arc::new(FixedToken(Some("tok"))))
            .execute(&task(Some("{}"), Some("svc@acme.iam")))
            .await;

        assert!(report.succeeded());
        assert_eq!(report.status_code, 201);
        let sent = sink.requests.lock().unwrap();
        assert_eq!(
            sent[0].headers.get("Authorization").map(String::as_str),
            Some("Bearer tok")
        );
        assert_eq!(sent[0].timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn no_identity_means_no_token_request() {
        let sink = Arc::new(CapturingSink::default());
        executor(Arc::clone(&sink), Arc::new(FixedToken(Some("tok"))))
            .execute(&task(None, None))
            .await;
        assert!(!sink.requests.lock().unwrap()[0]
            .headers
            .contains_key("Authorization"));
    }

    #[tokio::test]
    async fn token_failure_or_timeout_still_sends() {
        let providers: Vec<Arc<dyn TokenProvider>> = vec![
            Arc::new(FixedToken(None)),
            Arc::new(HangingToken),
            Arc::new(NoTokenProvider),
        ];
        for tokens in providers {
            let sink = Arc::new(CapturingSink::default());
            let report = executor(Arc::clone(&sink), tokens)
                .execute(&task(None, Some("svc@acme.iam")))
                .await;
            assert!(report.succeeded());
            let sent = sink.requests.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert!(!sent[0].headers.contains_key("Authorization"));
        }
    }

    #[tokio::test]
    async fn transport_errors_report_status_zero() {
        let sink = Arc::new(CapturingSink {
            fail: true,
            ..Default::default()
        });
        let report = executor(sink, Arc::new(NoTokenProvider))
            .execute(&task(None, None))
            .await;
        assert_eq!(report.status_code, 0);
        assert!(!report.succeeded());
        assert!(report.error.unwrap().contains("dns error"));
    }
}
