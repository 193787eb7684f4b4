//! Error types for the adapter.

use openapi_mcp_tools::OpenApiToolsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    /// Invalid flag combinations or config file contents.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document loading or conversion failures.
    #[error(transparent)]
    OpenApi(#[from] OpenApiToolsError),

    /// The catalog has no tool with this name.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

pub type Result<T> = std::result::Result<T, AdapterError>;
