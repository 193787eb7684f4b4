//! `OpenAPI` operations → tool definitions.
//!
//! [`create_converter`] picks the [`VersionConverter`] for a document. Both variants share
//! naming, security and schema compilation; they differ in where parameter schemas live.

use crate::document::{Document, Operation};
use crate::error::Result;
use crate::naming::{generate_tool_description, generate_tool_name};
use crate::schema::{SchemaArena, SchemaDialect, SchemaKind, ValidationSchema};
use crate::security;
use crate::tool::ToolDefinition;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Body,
}

/// One argument of a generated tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub description: Option<String>,
    pub raw_schema: Value,
}

/// Converter for one document. Swagger 2.0 documents use `Legacy`, 3.0 and 3.1 use `V3`.
#[derive(Debug)]
pub enum VersionConverter<'a> {
    Legacy {
        document: &'a Document,
        arena: Arc<SchemaArena>,
    },
    V3 {
        document: &'a Document,
        arena: Arc<SchemaArena>,
    },
}

/// Select the converter for a document's version.
#[must_use]
pub fn create_converter(document: &Document) -> VersionConverter<'_> {
    let dialect = SchemaDialect::for_version(document.version);
    let arena = Arc::new(SchemaArena::new(dialect, document.components.clone()));
    match dialect {
        SchemaDialect::Legacy => VersionConverter::Legacy { document, arena },
        SchemaDialect::V3 => VersionConverter::V3 { document, arena },
    }
}

impl<'a> VersionConverter<'a> {
    #[must_use]
    pub fn document(&self) -> &'a Document {
        match self {
            VersionConverter::Legacy { document, .. } | VersionConverter::V3 { document, .. } => {
                document
            }
        }
    }

    #[must_use]
    pub fn arena(&self) -> &Arc<SchemaArena> {
        match self {
            VersionConverter::Legacy { arena, .. } | VersionConverter::V3 { arena, .. } => arena,
        }
    }

    /// Compile a raw schema in this document's dialect.
    ///
    /// # Errors
    ///
    /// See [`crate::schema::compile`].
    pub fn compile(&self, raw: &Value) -> Result<ValidationSchema> {
        self.arena().compile(raw)
    }

    /// Compile every component schema, skipping the ones that fail.
    #[must_use]
    pub fn convert_components(&self) -> Vec<(String, Arc<ValidationSchema>)> {
        self.arena().convert_components()
    }

    /// Parameters of an operation: path and query first, then the body.
    #[must_use]
    pub fn extract_parameters(&self, operation: &Operation) -> Vec<ParameterSpec> {
        match self {
            VersionConverter::V3 { .. } => extract_v3_parameters(operation),
            VersionConverter::Legacy { .. } => extract_legacy_parameters(operation),
        }
    }

    /// Object schema with one field per parameter; `required` collects required parameters.
    ///
    /// # Errors
    ///
    /// Returns the first parameter schema that fails to compile.
    pub fn parameter_schema(&self, parameters: &[ParameterSpec]) -> Result<ValidationSchema> {
        let mut fields: Vec<(String, ValidationSchema)> = Vec::new();
        let mut required: Vec<String> = Vec::new();

        for param in parameters {
            let mut schema = self.compile(&param.raw_schema)?;
            if schema.description.is_none() {
                schema.description.clone_from(&param.description);
            }
            fields.retain(|(name, _)| name != &param.name);
            required.retain(|name| name != &param.name);
            if param.required {
                required.push(param.name.clone());
            }
            fields.push((param.name.clone(), schema));
        }

        Ok(ValidationSchema::new(SchemaKind::Object {
            fields,
            required,
            open: false,
        }))
    }

    /// One tool per operation, in document order.
    #[must_use]
    pub fn generate_tools(&self) -> Vec<ToolDefinition> {
        let document = self.document();
        let policy = security::extract(Some(document)).unwrap_or_default();
        let mut tools = Vec::with_capacity(document.operation_count());

        for item in &document.paths {
            for operation in &item.operations {
                let name = generate_tool_name(
                    &item.path,
                    operation.method,
                    operation.operation_id.as_deref(),
                );
                let parameters = self.extract_parameters(operation);
                let parameter_schema = match self.parameter_schema(&parameters) {
                    Ok(schema) => schema,
                    Err(e) => {
                        warn!(
                            tool = %name,
                            error = %e,
                            "parameter schema failed to compile; accepting any arguments"
                        );
                        ValidationSchema::open_object()
                    }
                };

                tools.push(ToolDefinition {
                    name,
                    description: generate_tool_description(operation),
                    parameter_schema,
                    method: operation.method,
                    path_template: item.path.clone(),
                    security: operation.security.effective(&policy.global_security),
                    arena: Arc::clone(self.arena()),
                });
            }
        }

        tools
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn declared_location(param: &Value) -> Option<ParameterLocation> {
    let location = param.get("in").and_then(Value::as_str).unwrap_or_default();
    match location {
        "path" => Some(ParameterLocation::Path),
        "query" => Some(ParameterLocation::Query),
        "body" | "formData" => Some(ParameterLocation::Body),
        other => {
            debug!(
                parameter = string_field(param, "name").unwrap_or_default(),
                location = other,
                "skipping parameter with unsupported location"
            );
            None
        }
    }
}

fn extract_v3_parameters(operation: &Operation) -> Vec<ParameterSpec> {
    let mut out: Vec<ParameterSpec> = Vec::new();
    let mut query: Vec<ParameterSpec> = Vec::new();

    for param in &operation.parameters {
        let location = match declared_location(param) {
            Some(ParameterLocation::Body) => {
                debug!(
                    parameter = string_field(param, "name").unwrap_or_default(),
                    "skipping body-located parameter in a 3.x document"
                );
                continue;
            }
            Some(location) => location,
            None => continue,
        };
        let spec = ParameterSpec {
            name: string_field(param, "name").unwrap_or_default(),
            location,
            required: location == ParameterLocation::Path
                || param.get("required").and_then(Value::as_bool).unwrap_or(false),
            description: string_field(param, "description"),
            raw_schema: param
                .get("schema")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
        };
        if location == ParameterLocation::Path {
            out.push(spec);
        } else {
            query.push(spec);
        }
    }
    out.append(&mut query);

    if let Some(body) = &operation.request_body {
        let content = body.get("content").and_then(Value::as_object);
        let media = content.and_then(|c| c.get("application/json").or_else(|| c.values().next()));
        if let Some(schema) = media.and_then(|m| m.get("schema")) {
            out.push(ParameterSpec {
                name: "body".to_string(),
                location: ParameterLocation::Body,
                required: body.get("required").and_then(Value::as_bool).unwrap_or(false),
                description: Some(
                    string_field(body, "description").unwrap_or_else(|| "Request body".to_string()),
                ),
                raw_schema: schema.clone(),
            });
        }
    }

    out
}

fn extract_legacy_parameters(operation: &Operation) -> Vec<ParameterSpec> {
    operation
        .parameters
        .iter()
        .filter_map(|param| {
            let location = declared_location(param)?;
            let in_body = param.get("in").and_then(Value::as_str) == Some("body");
            let raw_schema = if in_body {
                param.get("schema").cloned().unwrap_or_else(|| Value::Object(Map::new()))
            } else {
                // Non-body parameters carry their type inline.
                let mut inline = param.as_object().cloned().unwrap_or_default();
                for key in ["name", "in", "required", "description"] {
                    inline.remove(key);
                }
                Value::Object(inline)
            };
            Some(ParameterSpec {
                name: string_field(param, "name").unwrap_or_default(),
                location,
                required: location == ParameterLocation::Path
                    || param.get("required").and_then(Value::as_bool).unwrap_or(false),
                description: string_field(param, "description"),
                raw_schema,
            })
        })
        .collect()
}
