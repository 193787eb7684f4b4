//! Command-line adapter over `openapi-mcp-tools`.
//!
//! Loads one document (or a directory of them), lists the generated tools and invokes them.

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{ToolCatalog, ToolListing, result_text};
pub use config::{Overrides, SourcePlan, plan};
pub use error::{AdapterError, Result};
