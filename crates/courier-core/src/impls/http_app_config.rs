//! HttpAppConfigSource - AppConfigSource over `GET {base}/configs/{app_id}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use crate::error::{CourierError, Result};
use crate::ports::{AppConfigDocument, AppConfigSource};

#[derive(Debug, Clone)]
pub struct HttpAppConfigSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpAppConfigSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CourierError::configuration(format!("failed to create HTTP client: {e}")))?;
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                CourierError::configuration(format!("invalid config service url '{base_url}'"))
            })?;
        Ok(Self { client, base_url })
    }

    /// `{base}/configs/{app_id}` with the app id as one encoded segment.
    fn config_url(&self, app_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CourierError::configuration("config service url cannot be a base"))?
            .pop_if_empty()
            .push("configs")
            .push(app_id);
        Ok(url)
    }
}

#[async_trait]
impl AppConfigSource for HttpAppConfigSource {
    async fn fetch(&self, app_id: &str) -> Result<Option<AppConfigDocument>> {
        let url = self.config_url(app_id)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CourierError::AppConfig {
                app_id: app_id.to_string(),
                message: e.to_string(),
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let doc = response
                    .json::<AppConfigDocument>()
                    .await
                    .map_err(|e| CourierError::AppConfig {
                        app_id: app_id.to_string(),
                        message: format!("invalid config document: {e}"),
                    })?;
                Ok(Some(doc))
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(CourierError::AppConfig {
                    app_id: app_id.to_string(),
                    message: format!("status={s}: {body}"),
                })
            }
        }
    }
}
