//! HTTP dispatch for tools generated from `OpenAPI` documents.
//!
//! This crate knows nothing about `OpenAPI` parsing: it receives a method, a path template, the
//! caller's arguments and the operation's security requirements, and turns them into one
//! upstream request. It is used by `openapi-mcp-tools` and, through it, by the adapter binary.

pub mod client;
pub mod credentials;
pub mod error;
pub mod method;
pub mod security;
pub mod semantics;

pub use client::{
    ApiClient, ApiClientOptions, ApiResponse, ClassifiedParams, DEFAULT_TIMEOUT, JsonObject,
    RequestConfig, classify_parameters,
};
pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
pub use error::{HttpToolsError, Result};
pub use method::HttpMethod;
pub use security::{SecurityRequirement, SecurityScheme, SecuritySchemeKind, to_env_var_name};
