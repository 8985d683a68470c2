//! Impls - adapters for the ports.
//!
//! - **ReqwestSink**: HTTP delivery of task requests
//! - **EmulatedQueueAdmin** / **CloudTasksAdmin**: queue-management backends
//! - **MetadataTokenProvider** / **StaticTokenProvider**: identity tokens
//! - **HttpAppConfigSource**: app configuration service client

pub mod cloud_tasks_admin;
pub mod http_app_config;
pub mod inmem_admin;
pub mod metadata;
pub mod reqwest_sink;

pub use self::cloud_tasks_admin::CloudTasksAdmin;
pub use self::http_app_config::HttpAppConfigSource;
pub use self::inmem_admin::EmulatedQueueAdmin;
pub use self::metadata::{
    AccessTokenSource, MetadataServer, MetadataTokenProvider, StaticAccessToken,
    StaticTokenProvider,
};
pub use self::reqwest_sink::ReqwestSink;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{QueueBackendConfig, QueueBackendKind, TokenProviderKind};
use crate::error::Result;
use crate::ports::{NoTokenProvider, QueueAdmin, TokenProvider};

/// Pick the queue-management backend named by configuration.
pub fn build_queue_admin(config: &QueueBackendConfig) -> Result<Arc<dyn QueueAdmin>> {
    match config.kind {
        QueueBackendKind::Emulated => Ok(Arc::new(EmulatedQueueAdmin::new())),
        QueueBackendKind::CloudTasks => {
            let metadata = MetadataServer::new(config.request_timeout)?;
            Ok(Arc::new(CloudTasksAdmin::new(
                config.api_url.clone(),
                config.project.clone(),
                Arc::new(metadata),
                config.request_timeout,
            )?))
        }
    }
}

pub fn build_token_provider(
    kind: &TokenProviderKind,
    timeout: Duration,
) -> Result<Arc<dyn TokenProvider>> {
    Ok(match kind {
        TokenProviderKind::None => Arc::new(NoTokenProvider),
        TokenProviderKind::Metadata => {
            Arc::new(MetadataTokenProvider::new(MetadataServer::new(timeout)?))
        }
        TokenProviderKind::Static(token) => Arc::new(StaticTokenProvider::new(token.clone())),
    })
}
