//! Pipeline definitions as far as queue provisioning is concerned.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CourierError, Result};

/// Pseudo queue names meaning "no dedicated queue".
pub const RESERVED_QUEUE_NAMES: [&str; 2] = ["DEFAULT", "DIRECT"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTask {
    pub name: String,
    #[serde(default)]
    pub queue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub tasks: Vec<PipelineTask>,
}

impl PipelineDefinition {
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

    /// Unique queue-name templates used by the pipeline's tasks, without the
    /// reserved pseudo-names.
    pub fn queue_templates(&self) -> BTreeSet<String> {
        self.tasks
            .iter()
            .filter_map(|task| task.queue.as_deref())
            .map(str::trim)
            .filter(|queue| !queue.is_empty() && !is_reserved(queue))
            .map(str::to_string)
            .collect()
    }
}

/// Exact, case-sensitive match: `default` and `direct` are ordinary queues.
pub fn is_reserved(queue: &str) -> bool {
    RESERVED_QUEUE_NAMES.contains(&queue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_skip_reserved_and_duplicates() {
        let pipeline = PipelineDefinition::from_json(
            r#"{
                "name": "intake",
                "tasks": [
                    { "name": "ocr", "queue": "{app_id}-ocr" },
                    { "name": "split", "queue": "DEFAULT" },
                    { "name": "route", "queue": "DIRECT" },
                    { "name": "ocr-retry", "queue": "{app_id}-ocr" },
                    { "name": "classify", "queue": "myqueue" },
                    { "name": "notify" }
                ]
            }"#,
        )
        .unwrap();

        let templates: Vec<_> = pipeline.queue_templates().into_iter().collect();
        assert_eq!(templates, vec!["myqueue", "{app_id}-ocr"]);
    }

    #[test]
    fn lowercase_reserved_words_are_real_queues() {
        assert!(is_reserved("DEFAULT"));
        assert!(is_reserved("DIRECT"));
        assert!(!is_reserved("default"));
        assert!(!is_reserved("Direct"));

        let pipeline = PipelineDefinition::from_json(
            r#"{ "name": "p", "tasks": [ { "name": "a", "queue": "direct" } ] }"#,
        )
        .unwrap();
        let templates: Vec<_> = pipeline.queue_templates().into_iter().collect();
        assert_eq!(templates, vec!["direct"]);
    }

    #[test]
    fn empty_pipeline_has_no_templates() {
        let pipeline = PipelineDefinition::from_json(r#"{ "name": "noop" }"#).unwrap();
        assert!(pipeline.queue_templates().is_empty());
    }
}
