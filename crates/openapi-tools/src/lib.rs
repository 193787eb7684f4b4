//! `OpenAPI` → MCP tooling.
//!
//! Loads Swagger 2.0 and `OpenAPI` 3.0 / 3.1 documents (file, URL, directory or in-memory),
//! resolves their references, and turns every operation into a tool with a validated argument
//! schema. [`OpenApiToolSource`] executes calls through `openapi-mcp-http-tools`.

pub mod base_url;
pub mod config;
pub mod converter;
pub mod document;
pub mod error;
pub mod loader;
pub mod naming;
pub mod resolver;
pub mod schema;
pub mod security;
pub mod source;
pub mod tool;
pub mod version;

pub use base_url::{extract_base_url, resolve_base_url};
pub use config::ApiServerConfig;
pub use converter::{ParameterLocation, ParameterSpec, VersionConverter, create_converter};
pub use document::{Document, Operation, OperationSecurity, PathItem};
pub use error::{OpenApiToolsError, Result};
pub use loader::{DocumentLoader, LoadedDocument};
pub use naming::{generate_tool_description, generate_tool_name};
pub use resolver::DocId;
pub use schema::{SchemaArena, SchemaDialect, SchemaKind, ValidationError, ValidationSchema};
pub use security::SecurityPolicy;
pub use source::{OpenApiToolSource, SourceOptions, ToolHandler, ToolRegistry};
pub use tool::ToolDefinition;
pub use version::SpecVersion;
