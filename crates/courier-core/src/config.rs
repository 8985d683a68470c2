//! Runtime configuration read from `COURIER_*` environment variables.
//!
//! Every reader goes through a lookup function so tests can supply a map
//! instead of touching the process environment.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CourierError, Result};
use crate::queue::{BackoffPolicy, DEFAULT_HISTORY_CAPACITY};

pub const ENV_PREFIX: &str = "COURIER_";

/// Dispatcher loop and per-task execution settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Sleep between scans after a clean scan.
    pub poll_interval: Duration,
    /// Sleep after a scan that failed to read the store.
    pub error_interval: Duration,
    /// Retries after the initial attempt, unless a task overrides it.
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    pub request_timeout: Duration,
    pub token_timeout: Duration,
    pub history_capacity: usize,
    /// Number of history entries reported by `status()`.
    pub status_history_limit: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            error_interval: Duration::from_secs(5),
            max_retries: 3,
            backoff: BackoffPolicy::default(),
            request_timeout: Duration::from_secs(30),
            token_timeout: Duration::from_secs(10),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            status_history_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueBackendKind {
    /// In-process map; nothing leaves the process.
    #[default]
    Emulated,
    /// Google Cloud Tasks REST API.
    CloudTasks,
}

impl FromStr for QueueBackendKind {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emulated" | "emulator" | "local" => Ok(Self::Emulated),
            "cloud_tasks" | "cloudtasks" | "cloud-tasks" => Ok(Self::CloudTasks),
            other => Err(CourierError::configuration(format!(
                "unknown queue backend '{other}' (expected emulated or cloud_tasks)"
            ))),
        }
    }
}

/// Which queue-management service to talk to, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBackendConfig {
    pub kind: QueueBackendKind,
    pub project: String,
    pub location: String,
    pub api_url: String,
    pub request_timeout: Duration,
}

impl Default for QueueBackendConfig {
    fn default() -> Self {
        Self {
            kind: QueueBackendKind::Emulated,
            project: "local-project".to_string(),
            location: "us-central1".to_string(),
            api_url: "https://cloudtasks.googleapis.com".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Upper bound on simultaneous admin operations per provisioning call.
pub const MAX_PROVISION_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionerConfig {
    /// Simultaneous admin operations per provisioning call, at most
    /// [`MAX_PROVISION_CONCURRENCY`].
    pub max_concurrency: usize,
    /// Attempts per admin call, including the first.
    pub admin_attempts: u32,
    pub admin_backoff: BackoffPolicy,
    pub cache_ttl: Duration,
    pub config_timeout: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: MAX_PROVISION_CONCURRENCY,
            admin_attempts: 3,
            admin_backoff: BackoffPolicy::new(
                2.0,
                Duration::from_millis(200),
                Duration::from_secs(2),
            )
            .unwrap_or_default(),
            cache_ttl: Duration::from_secs(3600),
            config_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TokenProviderKind {
    #[default]
    None,
    /// GCP metadata server (plus IAM Credentials for non-default principals).
    Metadata,
    /// Fixed bearer token, for local targets.
    Static(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CourierConfig {
    pub dispatcher: DispatcherConfig,
    pub backend: QueueBackendConfig,
    pub provisioner: ProvisionerConfig,
    pub token_provider: TokenProviderKind,
    /// Base URL of the app configuration service; `None` disables lookups.
    pub config_service_url: Option<String>,
}

impl CourierConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary `KEY -> value` lookup. Unset or empty values
    /// keep their defaults; malformed values are configuration errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = CourierConfig::default();

        let backoff_defaults = &defaults.dispatcher.backoff;
        let backoff = BackoffPolicy::new(
            env.parse("BACKOFF_BASE")?.unwrap_or(backoff_defaults.base()),
            env.millis("BACKOFF_UNIT_MS")?
                .unwrap_or(backoff_defaults.unit()),
            env.millis("BACKOFF_MAX_MS")?
                .unwrap_or(backoff_defaults.max_delay()),
        )?;

        let dispatcher = DispatcherConfig {
            poll_interval: env
                .millis("POLL_INTERVAL_MS")?
                .unwrap_or(defaults.dispatcher.poll_interval),
            error_interval: env
                .millis("ERROR_INTERVAL_MS")?
                .unwrap_or(defaults.dispatcher.error_interval),
            max_retries: env
                .parse("MAX_RETRIES")?
                .unwrap_or(defaults.dispatcher.max_retries),
            backoff,
            request_timeout: env
                .millis("REQUEST_TIMEOUT_MS")?
                .unwrap_or(defaults.dispatcher.request_timeout),
            token_timeout: env
                .millis("TOKEN_TIMEOUT_MS")?
                .unwrap_or(defaults.dispatcher.token_timeout),
            history_capacity: env
                .parse("HISTORY_CAPACITY")?
                .unwrap_or(defaults.dispatcher.history_capacity),
            status_history_limit: defaults.dispatcher.status_history_limit,
        };
        if dispatcher.poll_interval.is_zero() {
            return Err(CourierError::configuration(
                "COURIER_POLL_INTERVAL_MS must be greater than zero",
            ));
        }

        let backend = QueueBackendConfig {
            kind: env
                .parse("QUEUE_BACKEND")?
                .unwrap_or(defaults.backend.kind),
            project: env.string("PROJECT").unwrap_or(defaults.backend.project),
            location: env.string("LOCATION").unwrap_or(defaults.backend.location),
            api_url: env
                .string("CLOUD_TASKS_URL")
                .unwrap_or(defaults.backend.api_url),
            request_timeout: dispatcher.request_timeout,
        };

        let provisioner = ProvisionerConfig {
            max_concurrency: env
                .parse("PROVISION_CONCURRENCY")?
                .unwrap_or(defaults.provisioner.max_concurrency),
            admin_attempts: env
                .parse("PROVISION_ATTEMPTS")?
                .unwrap_or(defaults.provisioner.admin_attempts),
            cache_ttl: env
                .parse::<u64>("CONFIG_CACHE_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.provisioner.cache_ttl),
            ..defaults.provisioner
        };
        if provisioner.max_concurrency == 0 || provisioner.admin_attempts == 0 {
            return Err(CourierError::configuration(
                "COURIER_PROVISION_CONCURRENCY and COURIER_PROVISION_ATTEMPTS must be at least 1",
            ));
        }
        if provisioner.max_concurrency > MAX_PROVISION_CONCURRENCY {
            return Err(CourierError::configuration(format!(
                "COURIER_PROVISION_CONCURRENCY must be at most {MAX_PROVISION_CONCURRENCY}"
            )));
        }

        let token_provider = match env.string("TOKEN_PROVIDER").as_deref() {
            None | Some("none") => TokenProviderKind::None,
            Some("metadata") => TokenProviderKind::Metadata,
            Some("static") => match env.string("STATIC_TOKEN") {
                Some(token) => TokenProviderKind::Static(token),
                None => {
                    return Err(CourierError::configuration(
                        "COURIER_TOKEN_PROVIDER=static requires COURIER_STATIC_TOKEN",
                    ));
                }
            },
            Some(other) => {
                return Err(CourierError::configuration(format!(
                    "unknown token provider '{other}' (expected none, metadata or static)"
                )));
            }
        };

        Ok(Self {
            dispatcher,
            backend,
            provisioner,
            token_provider,
            config_service_url: env.string("CONFIG_SERVICE_URL"),
        })
    }

    /// Read from a fixed map of `COURIER_*` keys.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{key}"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|e| {
                CourierError::configuration(format!("{ENV_PREFIX}{key}='{raw}' is invalid: {e}"))
            }),
        }
    }

    fn millis(&self, key: &str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(key)?.map(Duration::from_millis))
    }
}
