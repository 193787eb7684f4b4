//! Credential lookup for security schemes.
//!
//! The dispatcher never reads the process environment directly; it asks a
//! [`CredentialProvider`] injected at construction time.

use std::collections::HashMap;
use std::fmt;

/// Source of credential values keyed by environment variable name.
pub trait CredentialProvider: Send + Sync + fmt::Debug {
    /// Look up a credential. Empty values count as missing.
    fn credential(&self, env_var: &str) -> Option<String>;
}

/// Reads credentials from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn credential(&self, env_var: &str) -> Option<String> {
        std::env::var(env_var).ok().filter(|v| !v.is_empty())
    }
}

/// Fixed in-memory credentials.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, env_var: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(env_var.into(), value.into());
        self
    }
}

impl FromIterator<(String, String)> for StaticCredentials {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn credential(&self, env_var: &str) -> Option<String> {
        self.values.get(env_var).filter(|v| !v.is_empty()).cloned()
    }
}
