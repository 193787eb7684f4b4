//! Generated tool definitions.

use crate::error::{OpenApiToolsError, Result};
use crate::schema::{SchemaArena, ValidationSchema};
use openapi_mcp_http_tools::semantics::annotations_for_method;
use openapi_mcp_http_tools::{HttpMethod, SecurityRequirement};
use rmcp::model::{JsonObject, Tool};
use serde_json::Value;
use std::sync::Arc;

/// One callable tool derived from an `OpenAPI` operation.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// Object schema with one field per parameter.
    pub parameter_schema: ValidationSchema,
    pub method: HttpMethod,
    pub path_template: String,
    /// Effective security requirements (`[]` when none apply).
    pub security: Vec<SecurityRequirement>,
    /// Component schemas of the source document, for lazy references.
    pub arena: Arc<SchemaArena>,
}

impl ToolDefinition {
    /// JSON Schema of the tool's arguments.
    #[must_use]
    pub fn input_schema(&self) -> JsonObject {
        match self.arena.to_json_schema(&self.parameter_schema) {
            Value::Object(obj) => obj,
            _ => JsonObject::new(),
        }
    }

    /// The MCP view of this tool.
    #[must_use]
    pub fn to_mcp_tool(&self) -> Tool {
        let mut tool = Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::new(self.input_schema()),
        );
        tool.annotations = Some(annotations_for_method(self.method));
        tool
    }

    /// Fill declared defaults (nested objects included), then validate.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::InvalidArguments`] naming the first failing location.
    pub fn prepare_arguments(&self, arguments: Value) -> Result<Value> {
        let mut arguments = match arguments {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        };
        self.arena
            .apply_defaults(&self.parameter_schema, &mut arguments);
        self.arena
            .validate(&self.parameter_schema, &arguments)
            .map_err(|e| OpenApiToolsError::InvalidArguments(e.to_string()))?;
        Ok(arguments)
    }
}
