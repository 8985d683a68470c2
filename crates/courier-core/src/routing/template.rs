//! Queue-name templates and the token set that fills them.
//!
//! Both `{token}` and `${token}` placeholders are recognised. Token names are
//! ASCII letters, digits and underscores; braces around anything else are
//! kept literally.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CourierError, Result};
use crate::ports::AppConfigDocument;

pub const FALLBACK_APP_ID: &str = "unknown";
pub const FALLBACK_BUSINESS_UNIT: &str = "default";
pub const FALLBACK_SOLUTION_CODE: &str = "generic";

/// Token name -> value map used for placeholder substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueTokenSet(BTreeMap<String, String>);

impl QueueTokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Best-effort values used when an app has no usable configuration.
    pub fn fallback(app_id: &str) -> Self {
        Self::new()
            .with("app_id", app_id)
            .with("app_name", app_id)
            .with("business_unit", FALLBACK_BUSINESS_UNIT)
            .with("solution_code", FALLBACK_SOLUTION_CODE)
    }

    /// Tokens for an app whose configuration document was found. Fields the
    /// document leaves out keep their fallback values.
    pub fn from_app_config(app_id: &str, doc: &AppConfigDocument) -> Self {
        let mut tokens = Self::fallback(app_id);
        if let Some(name) = doc.name.as_deref().filter(|n| !n.is_empty()) {
            tokens.insert("app_name", name);
        }
        if let Some(accounting) = &doc.config.accounting {
            if let Some(bu) = accounting.business_unit.as_deref().filter(|v| !v.is_empty()) {
                tokens.insert("business_unit", bu);
            }
            if let Some(sc) = accounting.solution_code.as_deref().filter(|v| !v.is_empty()) {
                tokens.insert("solution_code", sc);
            }
        }
        tokens
    }
}

fn is_token_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

enum Segment<'a> {
    Literal(&'a str),
    Token(&'a str),
}

fn segments(template: &str) -> Vec<Segment<'_>> {
    let bytes = template.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    let mut literal_start = 0;
    while i < bytes.len() {
        let open = match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => 2,
            b'{' => 1,
            _ => 0,
        };
        if open > 0 {
            let name_start = i + open;
            if let Some(len) = template[name_start..].find('}') {
                let name = &template[name_start..name_start + len];
                if is_token_name(name) {
                    if literal_start < i {
                        out.push(Segment::Literal(&template[literal_start..i]));
                    }
                    out.push(Segment::Token(name));
                    i = name_start + len + 1;
                    literal_start = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    if literal_start < template.len() {
        out.push(Segment::Literal(&template[literal_start..]));
    }
    out
}

/// Replace every placeholder in `template` with its token value.
pub fn substitute(template: &str, tokens: &QueueTokenSet) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    for segment in segments(template) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Token(name) => match tokens.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(CourierError::MissingToken {
                        template: template.to_string(),
                        token: name.to_string(),
                    });
                }
            },
        }
    }
    Ok(out)
}

/// Token names referenced by `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    segments(template)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Token(name) => Some(name.to_string()),
            Segment::Literal(_) => None,
        })
        .collect()
}
