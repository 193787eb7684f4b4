//! Error types for `openapi-mcp-http-tools`.

use serde_json::{Value, json};
use thiserror::Error;

/// Errors produced while dispatching a tool call to the upstream HTTP API.
#[derive(Debug, Error)]
pub enum HttpToolsError {
    /// Client configuration errors (invalid default header, client build failure).
    #[error("config error: {0}")]
    Config(String),

    /// A security scheme required by the operation has no credential and strict mode is on.
    #[error("Required security token '{header}' (environment variable: {env_var}) is missing")]
    MissingCredential { header: String, env_var: String },

    /// The upstream API answered with a non-2xx status.
    #[error("API Error: {status} {status_text}")]
    Upstream {
        status: u16,
        status_text: String,
        data: Value,
    },

    /// No response was received (connect failure, timeout, invalid URL, body read failure).
    #[error("Request Error: {0}")]
    Request(String),
}

impl HttpToolsError {
    /// Structured details attached to the error when it is rendered for a caller.
    ///
    /// Upstream errors carry the response body; everything else renders as `{}`.
    #[must_use]
    pub fn details(&self) -> Value {
        match self {
            HttpToolsError::Upstream { data, .. } => data.clone(),
            _ => json!({}),
        }
    }
}

impl From<reqwest::Error> for HttpToolsError {
    fn from(value: reqwest::Error) -> Self {
        Self::Request(crate::client::sanitize_reqwest_error(&value))
    }
}

pub type Result<T> = std::result::Result<T, HttpToolsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_details_carry_the_body() {
        let err = HttpToolsError::Upstream {
            status: 404,
            status_text: "Not Found".to_string(),
            data: json!({"message": "no such person"}),
        };
        assert_eq!(err.to_string(), "API Error: 404 Not Found");
        assert_eq!(err.details(), json!({"message": "no such person"}));
    }

    #[test]
    fn other_errors_have_empty_details() {
        let err = HttpToolsError::MissingCredential {
            header: "X-API-Key".to_string(),
            env_var: "X_API_KEY".to_string(),
        };
        assert_eq!(err.details(), json!({}));
        assert!(err.to_string().contains("X_API_KEY"));
    }
}
