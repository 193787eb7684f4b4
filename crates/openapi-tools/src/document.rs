//! Loaded, validated `OpenAPI` document.

use crate::error::{OpenApiToolsError, Result};
use crate::resolver::DocId;
use crate::security::{parse_requirements, parse_schemes};
use crate::version::{SpecVersion, detect};
use openapi_mcp_http_tools::{HttpMethod, SecurityRequirement, SecurityScheme};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Security declared on one operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OperationSecurity {
    /// No `security` key: the document's global requirements apply.
    #[default]
    Inherited,
    /// `security: []`: the operation needs no credentials.
    None,
    /// The operation's own requirements, replacing (never merged with) the global ones.
    Override(Vec<SecurityRequirement>),
}

impl OperationSecurity {
    fn from_raw(raw: Option<&Value>) -> Result<Self> {
        match raw {
            None => Ok(OperationSecurity::Inherited),
            Some(value) => {
                let requirements = parse_requirements(value)?;
                if requirements.is_empty() {
                    Ok(OperationSecurity::None)
                } else {
                    Ok(OperationSecurity::Override(requirements))
                }
            }
        }
    }

    /// Requirements that apply to the operation.
    #[must_use]
    pub fn effective(&self, global: &[SecurityRequirement]) -> Vec<SecurityRequirement> {
        match self {
            OperationSecurity::Inherited => global.to_vec(),
            OperationSecurity::None => Vec::new(),
            OperationSecurity::Override(requirements) => requirements.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub method: HttpMethod,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Dereferenced parameter objects (path-level ones merged in).
    pub parameters: Vec<Value>,
    pub request_body: Option<Value>,
    pub security: OperationSecurity,
}

#[derive(Debug, Clone)]
pub struct PathItem {
    pub path: String,
    /// Operations in document order.
    pub operations: Vec<Operation>,
}

/// An immutable, validated document.
#[derive(Debug, Clone)]
pub struct Document {
    pub version: SpecVersion,
    /// Where the document was loaded from.
    pub source: DocId,
    pub title: Option<String>,
    pub paths: Vec<PathItem>,
    /// Raw component schemas (`definitions` for 2.0, `components.schemas` for 3.x).
    pub components: Map<String, Value>,
    pub servers: Vec<String>,
    pub host: Option<String>,
    pub base_path: Option<String>,
    pub schemes: Vec<String>,
    /// Global security requirements (`[]` when absent).
    pub security: Vec<SecurityRequirement>,
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

impl Document {
    /// Build a document from a dereferenced raw value.
    ///
    /// # Errors
    ///
    /// Returns an error if the version is not detectable or the structure is malformed
    /// (non-object paths / operations, parameters without `name` or `in`).
    pub fn from_value(source: DocId, raw: &Value) -> Result<Self> {
        let root = raw
            .as_object()
            .ok_or_else(|| OpenApiToolsError::Load("document root must be an object".to_string()))?;
        let version = detect(raw)?;

        let paths = match root.get("paths") {
            None => Vec::new(),
            Some(Value::Object(paths)) => paths
                .iter()
                .map(|(path, item)| parse_path_item(path, item))
                .collect::<Result<_>>()?,
            Some(_) => {
                return Err(OpenApiToolsError::Load("'paths' must be an object".to_string()));
            }
        };

        let components = if version.is_legacy() {
            raw.get("definitions")
        } else {
            raw.pointer("/components/schemas")
        }
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

        let servers = raw
            .get("servers")
            .and_then(Value::as_array)
            .map(|servers| {
                servers
                    .iter()
                    .filter_map(|s| s.get("url").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let security = match raw.get("security") {
            Some(value) => parse_requirements(value)?,
            None => Vec::new(),
        };

        Ok(Self {
            version,
            source,
            title: raw
                .pointer("/info/title")
                .and_then(Value::as_str)
                .map(str::to_string),
            paths,
            components,
            servers,
            host: string_field(root, "host"),
            base_path: string_field(root, "basePath"),
            schemes: root
                .get("schemes")
                .and_then(Value::as_array)
                .map(|s| s.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
            security,
            security_schemes: parse_schemes(raw, version),
        })
    }

    /// Number of operations across all paths.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.paths.iter().map(|p| p.operations.len()).sum()
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_path_item(path: &str, item: &Value) -> Result<PathItem> {
    let item = item.as_object().ok_or_else(|| {
        OpenApiToolsError::Load(format!("path item '{path}' must be an object"))
    })?;

    let shared = parse_parameters(path, "parameters", item.get("parameters"))?;

    let mut operations = Vec::new();
    for (key, raw_op) in item {
        // Method keys are lowercase only; anything else is an extension or a typo.
        let Some(method) = HttpMethod::ALL.into_iter().find(|m| m.as_str() == key.as_str()) else {
            continue;
        };
        let op = raw_op.as_object().ok_or_else(|| {
            OpenApiToolsError::Load(format!("operation '{key} {path}' must be an object"))
        })?;
        let own = parse_parameters(path, key, op.get("parameters"))?;

        operations.push(Operation {
            method,
            operation_id: string_field(op, "operationId"),
            summary: string_field(op, "summary"),
            description: string_field(op, "description"),
            parameters: merge_parameters(&shared, own),
            request_body: op.get("requestBody").cloned(),
            security: OperationSecurity::from_raw(op.get("security")).map_err(|e| match e {
                OpenApiToolsError::Load(message) => {
                    OpenApiToolsError::Load(format!("operation '{key} {path}': {message}"))
                }
                other => other,
            })?,
        });
    }

    Ok(PathItem {
        path: path.to_string(),
        operations,
    })
}

fn parse_parameters(path: &str, owner: &str, raw: Option<&Value>) -> Result<Vec<Value>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let params = raw.as_array().ok_or_else(|| {
        OpenApiToolsError::Load(format!("'{owner} {path}': parameters must be an array"))
    })?;
    for (i, param) in params.iter().enumerate() {
        let has = |key: &str| param.get(key).and_then(Value::as_str).is_some();
        if !param.is_object() || !has("name") || !has("in") {
            return Err(OpenApiToolsError::Load(format!(
                "'{owner} {path}': parameter #{i} must be an object with 'name' and 'in'"
            )));
        }
    }
    Ok(params.clone())
}

/// Operation parameters override path-level ones with the same `name` + `in`.
fn merge_parameters(shared: &[Value], own: Vec<Value>) -> Vec<Value> {
    let key = |p: &Value| (p.get("name").cloned(), p.get("in").cloned());
    let mut merged: Vec<Value> = shared
        .iter()
        .filter(|s| !own.iter().any(|o| key(o) == key(s)))
        .cloned()
        .collect();
    merged.extend(own);
    merged
}
