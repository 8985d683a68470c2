//! Queue provisioner: makes sure every queue a pipeline references exists.
//!
//! Templates are filled from the app's token set (cached per app id), each
//! base name is expanded to its priority variants, and the resulting queues
//! are checked/created with bounded concurrency. One queue failing never
//! stops the others; the result reports every queue individually.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::cache::TtlCache;
use super::pipeline::{PipelineDefinition, is_reserved};
use super::template::{FALLBACK_APP_ID, QueueTokenSet, substitute};
use crate::app::middleware::{logged, with_retry};
use crate::config::{MAX_PROVISION_CONCURRENCY, ProvisionerConfig};
use crate::domain::{OrchestrationPriority, QueueDescriptor};
use crate::error::{CourierError, Result};
use crate::ports::{AppConfigSource, Clock, QueueAdmin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOutcome {
    Created,
    Existing,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueProvisionEntry {
    pub queue_name: String,
    pub outcome: ProvisionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-queue outcomes of one provisioning call.
///
/// `total_created + total_existing + total_failed == queues.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningResult {
    pub total_created: usize,
    pub total_existing: usize,
    pub total_failed: usize,
    pub queues: Vec<QueueProvisionEntry>,
}

impl ProvisioningResult {
    fn from_entries(queues: Vec<QueueProvisionEntry>) -> Self {
        let count = |o: ProvisionOutcome| queues.iter().filter(|q| q.outcome == o).count();
        Self {
            total_created: count(ProvisionOutcome::Created),
            total_existing: count(ProvisionOutcome::Existing),
            total_failed: count(ProvisionOutcome::Failed),
            queues,
        }
    }

    /// True when no queue failed (including the empty case).
    pub fn success(&self) -> bool {
        self.total_failed == 0
    }

    pub fn attempted(&self) -> usize {
        self.queues.len()
    }
}

/// Base name plus its `-high` and `-quarantine` variants, deduplicated.
pub fn generate_variants(base: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    OrchestrationPriority::PROVISIONED
        .iter()
        .map(|priority| priority.apply(base))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

pub struct QueueProvisioner {
    admin: Arc<dyn QueueAdmin>,
    app_configs: Option<Arc<dyn AppConfigSource>>,
    cache: TtlCache<String, QueueTokenSet>,
    config: ProvisionerConfig,
    project: String,
    location: String,
}

impl QueueProvisioner {
    pub fn new(
        admin: Arc<dyn QueueAdmin>,
        app_configs: Option<Arc<dyn AppConfigSource>>,
        clock: Arc<dyn Clock>,
        config: ProvisionerConfig,
        project: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            admin,
            app_configs,
            cache: TtlCache::new(config.cache_ttl, clock),
            config,
            project: project.into(),
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Token set for `app_id`.
    ///
    /// Cached per app for the configured TTL. A missing config (404) caches
    /// the fallback values under the real app id; a failed or timed-out fetch
    /// returns the full fallback set (`app_id=unknown`) and is not cached.
    pub async fn token_set(&self, app_id: &str) -> QueueTokenSet {
        let key = app_id.to_string();
        if let Some(tokens) = self.cache.get(&key).await {
            return tokens;
        }
        let Some(source) = &self.app_configs else {
            return QueueTokenSet::fallback(app_id);
        };

        let fetched = tokio::time::timeout(self.config.config_timeout, source.fetch(app_id)).await;
        let tokens = match fetched {
            Ok(Ok(Some(doc))) => QueueTokenSet::from_app_config(app_id, &doc),
            Ok(Ok(None)) => {
                info!(app_id, "no app config found; using default queue tokens");
                QueueTokenSet::fallback(app_id)
            }
            Ok(Err(e)) => {
                warn!(app_id, error = %e, "app config fetch failed; using fallback queue tokens");
                return QueueTokenSet::fallback(FALLBACK_APP_ID);
            }
            Err(_) => {
                warn!(
                    app_id,
                    timeout_ms = self.config.config_timeout.as_millis() as u64,
                    "app config fetch timed out; using fallback queue tokens"
                );
                return QueueTokenSet::fallback(FALLBACK_APP_ID);
            }
        };
        self.cache.insert(key, tokens.clone()).await;
        tokens
    }

    pub async fn provision_pipeline(
        &self,
        pipeline: &PipelineDefinition,
        app_id: &str,
    ) -> Result<ProvisioningResult> {
        let templates = pipeline.queue_templates();
        info!(
            pipeline = %pipeline.name,
            app_id,
            templates = templates.len(),
            "provisioning pipeline queues"
        );
        self.provision_templates(templates.iter().map(String::as_str), app_id)
            .await
    }

    /// Resolve `templates` for `app_id` and ensure every variant exists.
    ///
    /// A template naming an unknown token is a configuration error and fails
    /// the call before any queue is touched; per-queue failures are reported
    /// in the result instead.
    pub async fn provision_templates<'a>(
        &self,
        templates: impl IntoIterator<Item = &'a str>,
        app_id: &str,
    ) -> Result<ProvisioningResult> {
        let templates: BTreeSet<&str> = templates
            .into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !is_reserved(t))
            .collect();
        if templates.is_empty() {
            return Ok(ProvisioningResult::default());
        }

        let tokens = self.token_set(app_id).await;
        let mut names = BTreeSet::new();
        for template in templates {
            let base = substitute(template, &tokens)?;
            if is_reserved(&base) {
                continue;
            }
            names.extend(generate_variants(&base));
        }

        let result = self.ensure_queues(names).await;
        info!(
            app_id,
            created = result.total_created,
            existing = result.total_existing,
            failed = result.total_failed,
            "provisioning finished"
        );
        Ok(result)
    }

    async fn ensure_queues(&self, names: BTreeSet<String>) -> ProvisioningResult {
        let permits = self
            .config
            .max_concurrency
            .clamp(1, MAX_PROVISION_CONCURRENCY);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut handles = Vec::with_capacity(names.len());
        for name in names {
            let semaphore = Arc::clone(&semaphore);
            let admin = Arc::clone(&self.admin);
            let config = self.config.clone();
            let descriptor = QueueDescriptor::new(name.clone(), &self.location, &self.project);
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| CourierError::Store(format!("provisioning cancelled: {e}")))?;
                ensure_queue(admin.as_ref(), &descriptor, &config).await
            });
            handles.push((name, handle));
        }

        let mut entries = Vec::with_capacity(handles.len());
        for (queue_name, handle) in handles {
            let (outcome, error) = match handle.await {
                Ok(Ok(true)) => (ProvisionOutcome::Created, None),
                Ok(Ok(false)) => (ProvisionOutcome::Existing, None),
                Ok(Err(e)) => (ProvisionOutcome::Failed, Some(e.to_string())),
                Err(e) => (ProvisionOutcome::Failed, Some(format!("provisioning task aborted: {e}"))),
            };
            if let Some(error) = &error {
                warn!(queue = %queue_name, error = %error, "queue provisioning failed");
            }
            entries.push(QueueProvisionEntry {
                queue_name,
                outcome,
                error,
            });
        }
        ProvisioningResult::from_entries(entries)
    }
}

/// `Ok(true)` if created, `Ok(false)` if it already existed.
async fn ensure_queue(
    admin: &dyn QueueAdmin,
    descriptor: &QueueDescriptor,
    config: &ProvisionerConfig,
) -> Result<bool> {
    let name = descriptor.name.as_str();
    let location = descriptor.location.as_str();
    let exists = with_retry("queue_exists", config.admin_attempts, &config.admin_backoff, || {
        logged("queue_exists", name, admin.queue_exists(name, location))
    })
    .await?;
    if exists {
        return Ok(false);
    }
    with_retry("create_queue", config.admin_attempts, &config.admin_backoff, || {
        logged("create_queue", name, admin.create_queue(descriptor))
    })
    .await
}
