//! CloudTasksAdmin - QueueAdmin over the Cloud Tasks v2 REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::metadata::AccessTokenSource;
use crate::domain::{QueueDescriptor, queue_path};
use crate::error::{CourierError, Result};
use crate::ports::QueueAdmin;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueResource {
    name: String,
    rate_limits: RateLimitsPayload,
    retry_config: RetryConfigPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitsPayload {
    max_dispatches_per_second: f64,
    max_concurrent_dispatches: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetryConfigPayload {
    max_attempts: i32,
    min_backoff: String,
    max_backoff: String,
    max_doublings: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQueuesResponse {
    #[serde(default)]
    queues: Vec<QueueName>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CloudTasksErrorResponse {
    error: CloudTasksErrorDetail,
}

#[derive(Debug, Deserialize)]
struct CloudTasksErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

pub struct CloudTasksAdmin {
    client: reqwest::Client,
    api_url: String,
    project: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl std::fmt::Debug for CloudTasksAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudTasksAdmin")
            .field("api_url", &self.api_url)
            .field("project", &self.project)
            .field("tokens", &"<AccessTokenSource>")
            .finish()
    }
}

impl CloudTasksAdmin {
    pub fn new(
        api_url: impl Into<String>,
        project: impl Into<String>,
        tokens: Arc<dyn AccessTokenSource>,
        timeout: Duration,
    ) -> Result<Self> {
        let project = project.into();
        if project.is_empty() {
            return Err(CourierError::configuration("project cannot be empty"));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CourierError::configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            project,
            tokens,
        })
    }

    fn queue_url(&self, name: &str, location: &str) -> String {
        format!(
            "{}/v2/{}",
            self.api_url,
            queue_path(&self.project, location, name)
        )
    }

    fn parent_url(&self, location: &str) -> String {
        format!(
            "{}/v2/projects/{}/locations/{location}/queues",
            self.api_url, self.project
        )
    }

    /// Formats a duration as a Cloud Tasks API duration string.
    pub(crate) fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let nanos = duration.subsec_nanos();
        if nanos == 0 {
            return format!("{secs}s");
        }

        let mut fractional = format!("{nanos:09}");
        while fractional.ends_with('0') {
            fractional.pop();
        }

        format!("{secs}.{fractional}s")
    }

    fn queue_payload(&self, descriptor: &QueueDescriptor) -> QueueResource {
        let retry = &descriptor.retry_config;
        QueueResource {
            name: queue_path(&self.project, &descriptor.location, &descriptor.name),
            rate_limits: RateLimitsPayload {
                max_dispatches_per_second: descriptor.rate_limits.max_dispatches_per_second,
                max_concurrent_dispatches: descriptor.rate_limits.max_concurrent_dispatches,
            },
            retry_config: RetryConfigPayload {
                max_attempts: retry.max_attempts,
                min_backoff: Self::format_duration(retry.min_backoff),
                max_backoff: Self::format_duration(retry.max_backoff),
                max_doublings: retry.max_doublings,
            },
        }
    }

    async fn error_from(
        operation: &'static str,
        queue: &str,
        response: reqwest::Response,
    ) -> CourierError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let message = match serde_json::from_str::<CloudTasksErrorResponse>(&body) {
            Ok(parsed) => format!("{} ({})", parsed.error.message, parsed.error.status),
            Err(_) => format!("{status} - {body}"),
        };
        CourierError::queue_admin(operation, queue, message)
    }

    /// POST/DELETE helper for calls where 404 means "no such queue".
    async fn mutate(
        &self,
        operation: &'static str,
        method: reqwest::Method,
        url: String,
        queue: &str,
    ) -> Result<bool> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .request(method, &url)
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .body("{}")
            .send()
            .await
            .map_err(|e| CourierError::queue_admin(operation, queue, e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_from(operation, queue, response).await),
        }
    }
}

#[async_trait]
impl QueueAdmin for CloudTasksAdmin {
    async fn queue_exists(&self, name: &str, location: &str) -> Result<bool> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .get(self.queue_url(name, location))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| CourierError::queue_admin("get", name, e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::error_from("get", name, response).await),
        }
    }

    async fn create_queue(&self, descriptor: &QueueDescriptor) -> Result<bool> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(self.parent_url(&descriptor.location))
            .bearer_auth(&token)
            .json(&self.queue_payload(descriptor))
            .send()
            .await
            .map_err(|e| CourierError::queue_admin("create", &descriptor.name, e.to_string()))?;

        match response.status() {
            s if s.is_success() => {
                debug!(queue = %descriptor.name, "cloud tasks queue created");
                Ok(true)
            }
            StatusCode::CONFLICT => Ok(false),
            _ => Err(Self::error_from("create", &descriptor.name, response).await),
        }
    }

    async fn list_queues(&self, location: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let token = self.tokens.access_token().await?;
            let mut request = self
                .client
                .get(self.parent_url(location))
                .bearer_auth(&token);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }
            let response = request
                .send()
                .await
                .map_err(|e| CourierError::queue_admin("list", location, e.to_string()))?;
            if !response.status().is_success() {
                return Err(Self::error_from("list", location, response).await);
            }

            let page: ListQueuesResponse = response.json().await?;
            names.extend(page.queues.into_iter().map(|q| {
                q.name
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            }));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(names)
    }

    async fn delete_queue(&self, name: &str, location: &str) -> Result<bool> {
        self.mutate(
            "delete",
            reqwest::Method::DELETE,
            self.queue_url(name, location),
            name,
        )
        .await
    }

    async fn pause_queue(&self, name: &str, location: &str) -> Result<bool> {
        let url = format!("{}:pause", self.queue_url(name, location));
        self.mutate("pause", reqwest::Method::POST, url, name).await
    }

    async fn resume_queue(&self, name: &str, location: &str) -> Result<bool> {
        let url = format!("{}:resume", self.queue_url(name, location));
        self.mutate("resume", reqwest::Method::POST, url, name).await
    }
}
