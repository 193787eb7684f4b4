//! Error types for `openapi-mcp-tools`.

use openapi_mcp_http_tools::HttpToolsError;
use serde_json::{Value, json};
use thiserror::Error;

/// Main error type for `OpenAPI` tooling.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (invalid config, missing fields, conflicts).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any failure while fetching, parsing, validating or dereferencing a document.
    #[error("Failed to load OpenAPI schema: {0}")]
    Load(String),

    /// The document declares no version this crate understands.
    #[error("Unsupported or undetected OpenAPI version: {0}")]
    UnsupportedVersion(String),

    #[error("OpenAPI error: failed to fetch spec from '{url}': {message}")]
    OpenApiSpecFetch { url: String, message: String },

    #[error("OpenAPI error: failed to read spec file '{path}': {source}")]
    OpenApiSpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A `$ref` could not be resolved.
    #[error("Unresolved reference: {0}")]
    Reference(String),

    /// A schema definition could not be compiled into a validation schema.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Tool arguments failed validation against the tool's parameter schema.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Errors raised by the HTTP dispatcher.
    #[error(transparent)]
    Http(#[from] HttpToolsError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl OpenApiToolsError {
    /// Wrap any error raised during a load call into the single load error.
    #[must_use]
    pub fn into_load(self) -> Self {
        match self {
            OpenApiToolsError::Load(_) => self,
            other => OpenApiToolsError::Load(other.to_string()),
        }
    }

    /// Structured details rendered after the message in a failed tool result.
    #[must_use]
    pub fn details(&self) -> Value {
        match self {
            OpenApiToolsError::Http(e) => e.details(),
            _ => json!({}),
        }
    }
}

/// Result type alias for `OpenAPI` tooling operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
