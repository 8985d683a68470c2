//! Queue resolver: (category, priority, app) -> physical queue and endpoint.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::template::{QueueTokenSet, substitute};
use crate::domain::OrchestrationPriority;
use crate::error::{CourierError, Result};

/// Queue-name and API-URL templates for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRoute {
    pub queue: String,
    pub api_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRoutes {
    #[serde(default)]
    pub routes: HashMap<String, QueueRoute>,
}

/// Resolver configuration, usually loaded from JSON:
///
/// ```json
/// {
///   "routes":   { "classify": { "queue": "{app_id}-classify", "api_url": "https://svc/{app_id}/classify" } },
///   "fallback": { "queue": "{app_id}-default", "api_url": "https://svc/{app_id}/run" },
///   "apps":     { "acme": { "routes": { "classify": { "queue": "acme-fast", "api_url": "https://acme/classify" } } } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub routes: HashMap<String, QueueRoute>,
    #[serde(default)]
    pub fallback: Option<QueueRoute>,
    #[serde(default)]
    pub apps: HashMap<String, AppRoutes>,
}

impl ResolverConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CourierError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

/// The app a resolution is for, plus the tokens its templates may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    pub app_id: String,
    pub tokens: QueueTokenSet,
}

impl AppContext {
    /// Context whose only token is `app_id`.
    pub fn new(app_id: impl Into<String>) -> Self {
        let app_id = app_id.into();
        let tokens = QueueTokenSet::new().with("app_id", app_id.clone());
        Self { app_id, tokens }
    }

    pub fn with_tokens(app_id: impl Into<String>, tokens: QueueTokenSet) -> Self {
        let app_id = app_id.into();
        let mut tokens = tokens;
        if tokens.get("app_id").is_none() {
            tokens.insert("app_id", app_id.clone());
        }
        Self { app_id, tokens }
    }

    pub fn with_token(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tokens.insert(name, value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueValue {
    pub queue_name: String,
    pub api_url: String,
}

/// Immutable once built; no I/O.
#[derive(Debug, Clone)]
pub struct QueueResolver {
    config: ResolverConfig,
}

impl QueueResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// App route, then global route, then global fallback.
    fn route_for(&self, category: &str, app_id: &str) -> Option<&QueueRoute> {
        self.config
            .apps
            .get(app_id)
            .and_then(|app| app.routes.get(category))
            .or_else(|| self.config.routes.get(category))
            .or(self.config.fallback.as_ref())
    }

    pub fn resolve(
        &self,
        category: &str,
        priority: OrchestrationPriority,
        app: &AppContext,
    ) -> Result<QueueValue> {
        let route = self
            .route_for(category, &app.app_id)
            .ok_or_else(|| CourierError::UnknownCategory {
                category: category.to_string(),
            })?;

        let base = substitute(&route.queue, &app.tokens)?;
        Ok(QueueValue {
            queue_name: priority.apply(&base),
            api_url: substitute(&route.api_url, &app.tokens)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "routes": {
            "classify": { "queue": "{app_id}-classify", "api_url": "https://svc.example/${app_id}/classify" },
            "run_extraction": { "queue": "extraction", "api_url": "https://svc.example/extract" }
        },
        "apps": {
            "vip": { "routes": { "classify": { "queue": "vip-dedicated", "api_url": "https://vip.example/classify" } } }
        }
    }"#;

    fn resolver() -> QueueResolver {
        QueueResolver::new(ResolverConfig::from_json(CONFIG).unwrap())
    }

    #[test]
    fn high_priority_gets_its_own_queue_with_same_endpoint() {
        let app = AppContext::new("acme");
        let default = resolver()
            .resolve("classify", OrchestrationPriority::Default, &app)
            .unwrap();
        let high = resolver()
            .resolve("classify", OrchestrationPriority::High, &app)
            .unwrap();

        assert_eq!(default.queue_name, "acme-classify");
        assert_eq!(high.queue_name, "acme-classify-high");
        assert_ne!(default.queue_name, high.queue_name);
        assert_eq!(default.api_url, "https://svc.example/acme/classify");
        assert_eq!(default.api_url, high.api_url);
    }

    #[test]
    fn quarantine_and_none_priorities() {
        let app = AppContext::new("acme");
        let r = resolver();
        assert_eq!(
            r.resolve("run_extraction", OrchestrationPriority::Quarantine, &app)
                .unwrap()
                .queue_name,
            "extraction-quarantine"
        );
        assert_eq!(
            r.resolve("run_extraction", OrchestrationPriority::None, &app)
                .unwrap()
                .queue_name,
            "extraction"
        );
    }

    #[test]
    fn app_route_overrides_global() {
        let value = resolver()
            .resolve(
                "classify",
                OrchestrationPriority::High,
                &AppContext::new("vip"),
            )
            .unwrap();
        assert_eq!(value.queue_name, "vip-dedicated-high");
        assert_eq!(value.api_url, "https://vip.example/classify");

        // other categories still come from the global table
        let value = resolver()
            .resolve(
                "run_extraction",
                OrchestrationPriority::Default,
                &AppContext::new("vip"),
            )
            .unwrap();
        assert_eq!(value.queue_name, "extraction");
    }

    #[test]
    fn unknown_category_without_fallback_fails() {
        let err = resolver()
            .resolve(
                "medication_extraction",
                OrchestrationPriority::Default,
                &AppContext::new("acme"),
            )
            .unwrap_err();
        assert!(matches!(err, CourierError::UnknownCategory { ref category } if category == "medication_extraction"));
        assert!(err.is_configuration());
    }

    #[test]
    fn unknown_category_uses_fallback_when_configured() {
        let mut config = ResolverConfig::from_json(CONFIG).unwrap();
        config.fallback = Some(QueueRoute {
            queue: "{app_id}-default".into(),
            api_url: "https://svc.example/run".into(),
        });
        let value = QueueResolver::new(config)
            .resolve(
                "medication_extraction",
                OrchestrationPriority::Default,
                &AppContext::new("acme"),
            )
            .unwrap();
        assert_eq!(value.queue_name, "acme-default");
    }

    #[test]
    fn missing_token_is_a_configuration_error() {
        let config = ResolverConfig::from_json(
            r#"{ "routes": { "bill": { "queue": "{business_unit}-bill", "api_url": "https://x" } } }"#,
        )
        .unwrap();
        let err = QueueResolver::new(config)
            .resolve("bill", OrchestrationPriority::Default, &AppContext::new("acme"))
            .unwrap_err();
        assert!(matches!(err, CourierError::MissingToken { ref token, .. } if token == "business_unit"));

        let ok = QueueResolver::new(
            ResolverConfig::from_json(
                r#"{ "routes": { "bill": { "queue": "{business_unit}-bill", "api_url": "https://x" } } }"#,
            )
            .unwrap(),
        )
        .resolve(
            "bill",
            OrchestrationPriority::Default,
            &AppContext::new("acme").with_token("business_unit", "claims"),
        )
        .unwrap();
        assert_eq!(ok.queue_name, "claims-bill");
    }
}
