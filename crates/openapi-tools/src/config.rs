use crate::error::{OpenApiToolsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Configuration for an OpenAPI-based tool source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerConfig {
    /// `OpenAPI` document location (URL or file path).
    pub spec: String,

    /// Override base URL from the document.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Extra headers sent with every upstream request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Per-request timeout in milliseconds (defaults to 30s).
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Fail calls whose required credentials are missing instead of sending them without.
    #[serde(default = "default_strict_security")]
    pub strict_security: bool,
}

fn default_strict_security() -> bool {
    true
}

impl ApiServerConfig {
    #[must_use]
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            base_url: None,
            headers: BTreeMap::new(),
            timeout_ms: None,
            strict_security: true,
        }
    }

    /// Read a config file (YAML, which also accepts JSON).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&raw).map_err(|e| {
            OpenApiToolsError::Config(format!("failed to parse '{}': {e}", path.display()))
        })
    }

    /// Per-request timeout; `0` means the default.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
