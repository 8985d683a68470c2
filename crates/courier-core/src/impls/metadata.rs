//! Credentials from the GCP metadata server.
//!
//! Identity tokens for the default service account come straight from the
//! metadata server; other principals go through the IAM Credentials
//! `generateIdToken` call, authorized by the metadata access token.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CourierError, Result};
use crate::ports::TokenProvider;

pub const METADATA_BASE_URL: &str = "http://metadata.google.internal";
pub const IAM_CREDENTIALS_URL: &str = "https://iamcredentials.googleapis.com";

const SERVICE_ACCOUNT_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default";

/// OAuth access tokens for Google APIs (Cloud Tasks, IAM Credentials).
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fixed access token, for emulators and tests.
#[derive(Debug, Clone)]
pub struct StaticAccessToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticAccessToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataAccessToken {
    access_token: String,
}

#[derive(Debug, Clone)]
pub struct MetadataServer {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl MetadataServer {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(METADATA_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Identity token for the default service account, scoped to `audience`.
    pub async fn identity_token(&self, audience: &str) -> Result<String> {
        let mut url = reqwest::Url::parse(&format!(
            "{}{SERVICE_ACCOUNT_PATH}/identity",
            self.base_url
        ))
        .map_err(|e| CourierError::auth(format!("invalid metadata identity URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("audience", audience)
            .append_pair("format", "full");

        let response = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CourierError::auth(format!("metadata identity token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CourierError::auth(format!(
                "metadata identity token request failed (status={status}): {body}"
            )));
        }

        response
            .text()
            .await
            .map(|t| t.trim().to_string())
            .map_err(|e| CourierError::auth(format!("metadata identity token read failed: {e}")))
    }
}

#[async_trait]
impl AccessTokenSource for MetadataServer {
    async fn access_token(&self) -> Result<String> {
        let url = format!("{}{SERVICE_ACCOUNT_PATH}/token", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CourierError::auth(format!("metadata access token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CourierError::auth(format!(
                "metadata access token request failed (status={status}): {body}"
            )));
        }

        let token: MetadataAccessToken = response
            .json()
            .await
            .map_err(|e| CourierError::auth(format!("metadata access token parse failed: {e}")))?;
        Ok(token.access_token)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateIdTokenRequest<'a> {
    audience: &'a str,
    include_email: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateIdTokenResponse {
    token: String,
}

/// TokenProvider backed by the metadata server and IAM Credentials.
pub struct MetadataTokenProvider {
    metadata: MetadataServer,
    iam_url: String,
}

impl MetadataTokenProvider {
    pub fn new(metadata: MetadataServer) -> Self {
        Self::with_iam_url(metadata, IAM_CREDENTIALS_URL)
    }

    pub fn with_iam_url(metadata: MetadataServer, iam_url: impl Into<String>) -> Self {
        Self {
            metadata,
            iam_url: iam_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn impersonated_token(&self, principal: &str, audience: &str) -> Result<String> {
        let access_token = self.metadata.access_token().await?;
        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{principal}:generateIdToken",
            self.iam_url
        );
        let response = self
            .metadata
            .client
            .post(&url)
            .bearer_auth(&access_token)
            .json(&GenerateIdTokenRequest {
                audience,
                include_email: true,
            })
            .send()
            .await
            .map_err(|e| CourierError::auth(format!("generateIdToken request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CourierError::auth(format!(
                "generateIdToken failed for {principal} (status={status}): {body}"
            )));
        }

        let body: GenerateIdTokenResponse = response
            .json()
            .await
            .map_err(|e| CourierError::auth(format!("generateIdToken parse failed: {e}")))?;
        Ok(body.token)
    }
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn identity_token(&self, principal: &str, audience: &str) -> Option<String> {
        let result = if principal.is_empty() || principal == "default" {
            self.metadata.identity_token(audience).await
        } else {
            self.impersonated_token(principal, audience).await
        };
        match result {
            Ok(token) if !token.is_empty() => Some(token),
            Ok(_) => {
                warn!(principal, audience, "identity token was empty");
                None
            }
            Err(e) => {
                warn!(principal, audience, error = %e, "identity token unavailable");
                None
            }
        }
    }
}

/// Hands out the same bearer token for every principal and audience.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn identity_token(&self, _principal: &str, _audience: &str) -> Option<String> {
        Some(self.token.clone()).filter(|t| !t.is_empty())
    }
}
