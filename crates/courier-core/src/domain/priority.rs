use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CourierError;

/// Orchestration priority of a task category.
///
/// `Default` and `None` both route to the bare queue name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationPriority {
    #[default]
    Default,
    High,
    None,
    Quarantine,
}

impl OrchestrationPriority {
    /// Priorities that get their own physical queue when provisioning.
    pub const PROVISIONED: [OrchestrationPriority; 3] = [
        OrchestrationPriority::Default,
        OrchestrationPriority::High,
        OrchestrationPriority::Quarantine,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrchestrationPriority::Default => "default",
            OrchestrationPriority::High => "high",
            OrchestrationPriority::None => "none",
            OrchestrationPriority::Quarantine => "quarantine",
        }
    }

    pub fn queue_suffix(self) -> &'static str {
        match self {
            OrchestrationPriority::Default | OrchestrationPriority::None => "",
            OrchestrationPriority::High => "-high",
            OrchestrationPriority::Quarantine => "-quarantine",
        }
    }

    /// Physical queue name for `base` at this priority.
    pub fn apply(self, base: &str) -> String {
        format!("{base}{}", self.queue_suffix())
    }
}

impl fmt::Display for OrchestrationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrchestrationPriority {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "" => Ok(OrchestrationPriority::Default),
            "high" => Ok(OrchestrationPriority::High),
            "none" => Ok(OrchestrationPriority::None),
            "quarantine" => Ok(OrchestrationPriority::Quarantine),
            other => Err(CourierError::configuration(format!(
                "unknown orchestration priority '{other}'"
            ))),
        }
    }
}
