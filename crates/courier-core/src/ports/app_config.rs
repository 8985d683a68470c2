//! AppConfigSource port: per-application configuration lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Accounting block of an app configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accounting {
    #[serde(default)]
    pub business_unit: Option<String>,
    #[serde(default)]
    pub solution_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfigBody {
    #[serde(default)]
    pub accounting: Option<Accounting>,

    /// Everything else in the document; not interpreted here.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Document served at `GET /configs/{app_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfigDocument {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: AppConfigBody,
}

/// Fetches app configuration.
///
/// `Ok(None)` means the app has no configuration (a legitimate outcome);
/// `Err` means the lookup itself failed.
#[async_trait]
pub trait AppConfigSource: Send + Sync {
    async fn fetch(&self, app_id: &str) -> Result<Option<AppConfigDocument>>;
}
