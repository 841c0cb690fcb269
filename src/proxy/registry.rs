//! Ordered list of CORS relays the resolver walks through.
//!
//! The order is a fixed priority list: the first entry is always tried first
//! and success history never reorders it. A registry is immutable once built
//! and cheap to clone (entries sit behind an `Arc`).

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AttemptError;
use crate::proxy::normalize::normalize;

/// How a relay wraps the origin response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Extractor {
    /// The relay forwards the origin bytes unchanged.
    #[default]
    PassThrough,
    /// The relay answers `{"contents": "<origin body as a string>"}`.
    Contents,
}

impl Extractor {
    /// Recover the origin payload from a relay's parsed body.
    pub fn extract(self, parsed: Value) -> Result<Value, AttemptError> {
        let payload = match self {
            Extractor::PassThrough => parsed,
            Extractor::Contents => match parsed {
                Value::Object(mut map) => match map.remove("contents") {
                    Some(Value::String(inner)) => normalize(&inner)?,
                    Some(_) => {
                        return Err(AttemptError::MalformedPayload(
                            "`contents` is not a string".into(),
                        ))
                    }
                    None => {
                        return Err(AttemptError::MalformedPayload(
                            "missing `contents` field".into(),
                        ))
                    }
                },
                _ => {
                    return Err(AttemptError::MalformedPayload(
                        "relay wrapper is not a JSON object".into(),
                    ))
                }
            },
        };

        if payload.is_null() {
            return Err(AttemptError::MalformedPayload("empty payload".into()));
        }
        Ok(payload)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyDescriptor {
    pub name: String,
    /// Prefix the URL-encoded target is appended to.
    pub url_prefix_template: String,
    #[serde(default)]
    pub extract: Extractor,
}

impl ProxyDescriptor {
    pub fn new(name: impl Into<String>, url_prefix_template: impl Into<String>, extract: Extractor) -> Self {
        Self {
            name: name.into(),
            url_prefix_template: url_prefix_template.into(),
            extract,
        }
    }

    pub fn relay_url(&self, target_url: &str) -> String {
        format!("{}{}", self.url_prefix_template, urlencoding::encode(target_url))
    }
}

static DEFAULT_PROXIES: Lazy<Vec<ProxyDescriptor>> = Lazy::new(|| {
    vec![
        ProxyDescriptor::new("corsproxy.io", "https://corsproxy.io/?", Extractor::PassThrough),
        ProxyDescriptor::new(
            "allorigins-raw",
            "https://api.allorigins.win/raw?url=",
            Extractor::PassThrough,
        ),
        ProxyDescriptor::new(
            "allorigins-get",
            "https://api.allorigins.win/get?url=",
            Extractor::Contents,
        ),
        ProxyDescriptor::new(
            "codetabs",
            "https://api.codetabs.com/v1/proxy?quest=",
            Extractor::PassThrough,
        ),
    ]
});

#[derive(Debug, Clone)]
pub struct ProxyRegistry {
    entries: Arc<[ProxyDescriptor]>,
}

impl ProxyRegistry {
    pub fn new(entries: Vec<ProxyDescriptor>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Load a registry from a YAML list of descriptors.
    pub fn from_yaml(source: &str) -> anyhow::Result<Self> {
        let entries: Vec<ProxyDescriptor> =
            serde_yaml::from_str(source).context("invalid proxy registry YAML")?;
        if entries.is_empty() {
            anyhow::bail!("proxy registry must list at least one relay");
        }
        Ok(Self::new(entries))
    }

    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read proxy registry {}", path.display()))?;
        Self::from_yaml(&source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyDescriptor> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ProxyDescriptor> {
        self.entries.get(index)
    }
}

impl Default for ProxyRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PROXIES.clone())
    }
}
