//! Validation schemas compiled from `OpenAPI` / JSON-Schema-like definitions.
//!
//! A [`ValidationSchema`] is a closed tree of checks. `$ref`s to the document's own components
//! compile to [`SchemaKind::Reference`] and are only looked up, through the document's
//! [`SchemaArena`], when a value is validated or the schema is rendered. Recursive component
//! graphs therefore compile in finite time.

use crate::error::{OpenApiToolsError, Result};
use crate::version::SpecVersion;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Which flavour of schema keywords a document uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaDialect {
    /// Swagger 2.0: `#/definitions/`, `x-nullable`.
    Legacy,
    /// `OpenAPI` 3.0 / 3.1: `#/components/schemas/`, `nullable`, 3.1 type arrays.
    V3,
}

impl SchemaDialect {
    #[must_use]
    pub fn for_version(version: SpecVersion) -> Self {
        if version.is_legacy() {
            SchemaDialect::Legacy
        } else {
            SchemaDialect::V3
        }
    }

    #[must_use]
    pub fn component_prefix(self) -> &'static str {
        match self {
            SchemaDialect::Legacy => "#/definitions/",
            SchemaDialect::V3 => "#/components/schemas/",
        }
    }

    fn nullable_keyword(self) -> &'static str {
        match self {
            SchemaDialect::Legacy => "x-nullable",
            SchemaDialect::V3 => "nullable",
        }
    }
}

/// A compiled `pattern` keyword. Compared by source text.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn is_match(&self, s: &str) -> bool {
        self.0.is_match(s)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    DateTime,
    Date,
    Email,
    Uri,
}

impl StringFormat {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "date-time" => Some(StringFormat::DateTime),
            "date" => Some(StringFormat::Date),
            "email" => Some(StringFormat::Email),
            "uri" | "url" => Some(StringFormat::Uri),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            StringFormat::DateTime => "date-time",
            StringFormat::Date => "date",
            StringFormat::Email => "email",
            StringFormat::Uri => "uri",
        }
    }

    fn accepts(self, s: &str) -> bool {
        match self {
            StringFormat::DateTime => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
            StringFormat::Date => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
            StringFormat::Email => is_email(s),
            StringFormat::Uri => url::Url::parse(s).is_ok(),
        }
    }
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !s.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    String {
        pattern: Option<Pattern>,
        min_length: Option<u64>,
        max_length: Option<u64>,
        enumeration: Option<Vec<Value>>,
        format: Option<StringFormat>,
    },
    Number {
        integer: bool,
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean,
    Array {
        items: Box<ValidationSchema>,
        min_items: Option<u64>,
        max_items: Option<u64>,
    },
    Object {
        fields: Vec<(String, ValidationSchema)>,
        required: Vec<String>,
        /// No declared properties: any object is accepted.
        open: bool,
    },
    Union(Vec<ValidationSchema>),
    Intersection(Vec<ValidationSchema>),
    /// Component name, looked up in the owning [`SchemaArena`].
    Reference(String),
    Any,
}

/// One node of a compiled schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSchema {
    pub kind: SchemaKind,
    pub nullable: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl ValidationSchema {
    #[must_use]
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            nullable: false,
            default: None,
            description: None,
        }
    }

    #[must_use]
    pub fn any() -> Self {
        Self::new(SchemaKind::Any)
    }

    /// An object accepting any properties.
    #[must_use]
    pub fn open_object() -> Self {
        Self::new(SchemaKind::Object {
            fields: Vec::new(),
            required: Vec::new(),
            open: true,
        })
    }

    /// Field schema by name, for object schemas.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&ValidationSchema> {
        match &self.kind {
            SchemaKind::Object { fields, .. } => {
                fields.iter().find(|(n, _)| n == name).map(|(_, s)| s)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        matches!(&self.kind, SchemaKind::Object { required, .. } if required.iter().any(|r| r == name))
    }
}

/// Compile a raw schema definition.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::Schema`] for malformed definitions (non-object schemas,
/// non-string `$ref`, patterns the regex engine rejects).
pub fn compile(raw: &Value, dialect: SchemaDialect) -> Result<ValidationSchema> {
    let obj = match raw {
        Value::Object(obj) => obj,
        Value::Bool(true) => return Ok(ValidationSchema::any()),
        other => {
            return Err(OpenApiToolsError::Schema(format!(
                "expected a schema object, found {other}"
            )));
        }
    };

    if let Some(reference) = obj.get("$ref") {
        let reference = reference.as_str().ok_or_else(|| {
            OpenApiToolsError::Schema(format!("'$ref' must be a string, found {reference}"))
        })?;
        let name = reference
            .strip_prefix(dialect.component_prefix())
            .unwrap_or_else(|| reference.rsplit('/').next().unwrap_or(reference));
        let mut schema = ValidationSchema::new(SchemaKind::Reference(name.to_string()));
        apply_modifiers(&mut schema, obj, dialect);
        return Ok(schema);
    }

    let kind = if let Some(members) = obj.get("allOf") {
        SchemaKind::Intersection(compile_all(members, dialect)?)
    } else if let Some(members) = obj.get("oneOf").or_else(|| obj.get("anyOf")) {
        SchemaKind::Union(compile_all(members, dialect)?)
    } else {
        let (ty, null_in_type) = declared_type(obj.get("type"));
        let kind = compile_type(ty, obj, dialect)?;
        let mut schema = ValidationSchema::new(kind);
        apply_modifiers(&mut schema, obj, dialect);
        schema.nullable |= null_in_type;
        return Ok(schema);
    };

    let mut schema = ValidationSchema::new(kind);
    apply_modifiers(&mut schema, obj, dialect);
    Ok(schema)
}

fn compile_all(members: &Value, dialect: SchemaDialect) -> Result<Vec<ValidationSchema>> {
    let members = members.as_array().ok_or_else(|| {
        OpenApiToolsError::Schema("composition keyword must hold an array".to_string())
    })?;
    members.iter().map(|m| compile(m, dialect)).collect()
}

/// The effective type name and whether `null` was listed in a type array.
fn declared_type(ty: Option<&Value>) -> (Option<&str>, bool) {
    match ty {
        Some(Value::String(s)) if s == "null" => (None, true),
        Some(Value::String(s)) => (Some(s.as_str()), false),
        Some(Value::Array(items)) => {
            let mut non_null = items.iter().filter_map(Value::as_str).filter(|t| *t != "null");
            let has_null = items.iter().any(|t| t.as_str() == Some("null"));
            let first = non_null.next();
            // More than one non-null type cannot be expressed as a single node.
            if non_null.next().is_some() {
                (None, has_null)
            } else {
                (first, has_null)
            }
        }
        _ => (None, false),
    }
}

fn compile_type(
    ty: Option<&str>,
    obj: &Map<String, Value>,
    dialect: SchemaDialect,
) -> Result<SchemaKind> {
    let kind = match ty {
        Some("string") => {
            let pattern = obj
                .get("pattern")
                .and_then(Value::as_str)
                .map(|p| {
                    Regex::new(p).map(Pattern).map_err(|e| {
                        OpenApiToolsError::Schema(format!("invalid pattern '{p}': {e}"))
                    })
                })
                .transpose()?;
            SchemaKind::String {
                pattern,
                min_length: obj.get("minLength").and_then(Value::as_u64),
                max_length: obj.get("maxLength").and_then(Value::as_u64),
                enumeration: obj.get("enum").and_then(Value::as_array).cloned(),
                format: obj
                    .get("format")
                    .and_then(Value::as_str)
                    .and_then(StringFormat::parse),
            }
        }
        Some(t @ ("number" | "integer")) => SchemaKind::Number {
            integer: t == "integer",
            minimum: obj.get("minimum").and_then(Value::as_f64),
            maximum: obj.get("maximum").and_then(Value::as_f64),
        },
        Some("boolean") => SchemaKind::Boolean,
        Some("array") => SchemaKind::Array {
            items: Box::new(match obj.get("items") {
                Some(items) => compile(items, dialect)?,
                None => ValidationSchema::any(),
            }),
            min_items: obj.get("minItems").and_then(Value::as_u64),
            max_items: obj.get("maxItems").and_then(Value::as_u64),
        },
        Some("object") => match obj.get("properties").and_then(Value::as_object) {
            Some(properties) => {
                let fields = properties
                    .iter()
                    .map(|(name, prop)| Ok((name.clone(), compile(prop, dialect)?)))
                    .collect::<Result<Vec<_>>>()?;
                let required = obj
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .filter(|n| properties.contains_key(*n))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                SchemaKind::Object {
                    fields,
                    required,
                    open: false,
                }
            }
            None => SchemaKind::Object {
                fields: Vec::new(),
                required: Vec::new(),
                open: true,
            },
        },
        _ => SchemaKind::Any,
    };
    Ok(kind)
}

fn apply_modifiers(schema: &mut ValidationSchema, obj: &Map<String, Value>, dialect: SchemaDialect) {
    schema.nullable = obj
        .get(dialect.nullable_keyword())
        .and_then(Value::as_bool)
        .unwrap_or(false);
    schema.default = obj.get("default").cloned();
    schema.description = obj
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
}

/// A value failed validation at `path` (`$` is the root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

type Validation = std::result::Result<(), ValidationError>;

fn fail(path: &str, message: impl Into<String>) -> Validation {
    Err(ValidationError {
        path: path.to_string(),
        message: message.into(),
    })
}

/// Per-document component schemas with a memoized compile cache.
///
/// Shared (behind `Arc`) by every tool generated from the document.
#[derive(Debug)]
pub struct SchemaArena {
    dialect: SchemaDialect,
    components: Map<String, Value>,
    compiled: RwLock<HashMap<String, Arc<ValidationSchema>>>,
    failed: RwLock<HashSet<String>>,
}

impl SchemaArena {
    #[must_use]
    pub fn new(dialect: SchemaDialect, components: Map<String, Value>) -> Self {
        Self {
            dialect,
            components,
            compiled: RwLock::new(HashMap::new()),
            failed: RwLock::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn dialect(&self) -> SchemaDialect {
        self.dialect
    }

    /// Compile a raw definition in this arena's dialect.
    ///
    /// # Errors
    ///
    /// See [`compile`].
    pub fn compile(&self, raw: &Value) -> Result<ValidationSchema> {
        compile(raw, self.dialect)
    }

    /// Compiled schema for a component, compiling it on first access.
    ///
    /// Unknown names and components that fail to compile yield `None`; failures are logged once.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Arc<ValidationSchema>> {
        if let Some(schema) = self.compiled.read().get(name) {
            return Some(Arc::clone(schema));
        }
        if self.failed.read().contains(name) {
            return None;
        }

        let outcome = match self.components.get(name) {
            Some(raw) => compile(raw, self.dialect),
            None => Err(OpenApiToolsError::Reference(format!(
                "component schema '{name}' is not declared"
            ))),
        };

        match outcome {
            Ok(schema) => {
                let schema = Arc::new(schema);
                let mut compiled = self.compiled.write();
                Some(Arc::clone(
                    compiled.entry(name.to_string()).or_insert(schema),
                ))
            }
            Err(e) => {
                warn!(schema = name, error = %e, "failed to compile component schema");
                self.failed.write().insert(name.to_string());
                None
            }
        }
    }

    /// Compile every component, omitting (and logging) the ones that fail.
    #[must_use]
    pub fn convert_components(&self) -> Vec<(String, Arc<ValidationSchema>)> {
        self.components
            .keys()
            .filter_map(|name| self.resolve(name).map(|s| (name.clone(), s)))
            .collect()
    }

    /// Check `value` against `schema`.
    ///
    /// Unknown object keys are accepted. Missing optional fields are fine; missing required
    /// fields fail unless the field declares a default.
    ///
    /// # Errors
    ///
    /// Returns the first failure, with a JSON path such as `$.body.tags[2]`.
    pub fn validate(
        &self,
        schema: &ValidationSchema,
        value: &Value,
    ) -> std::result::Result<(), ValidationError> {
        let mut in_progress = Vec::new();
        self.check(schema, value, "$", &mut in_progress)
    }

    fn check(
        &self,
        schema: &ValidationSchema,
        value: &Value,
        path: &str,
        in_progress: &mut Vec<(String, usize)>,
    ) -> Validation {
        if value.is_null() && (schema.nullable || matches!(schema.kind, SchemaKind::Any)) {
            return Ok(());
        }

        match &schema.kind {
            SchemaKind::Any => Ok(()),
            SchemaKind::Reference(name) => {
                // Re-entering a reference on the same value matches nothing.
                let key = (name.clone(), std::ptr::from_ref(value) as usize);
                if in_progress.contains(&key) {
                    return fail(path, format!("recursive schema reference '{name}'"));
                }
                let Some(target) = self.resolve(name) else {
                    return fail(path, format!("unresolved schema reference '{name}'"));
                };
                in_progress.push(key);
                let result = self.check(&target, value, path, in_progress);
                in_progress.pop();
                result
            }
            SchemaKind::Union(members) => {
                if members.is_empty()
                    || members
                        .iter()
                        .any(|m| self.check(m, value, path, in_progress).is_ok())
                {
                    Ok(())
                } else {
                    fail(path, "value does not match any allowed schema")
                }
            }
            SchemaKind::Intersection(members) => members
                .iter()
                .try_for_each(|m| self.check(m, value, path, in_progress)),
            SchemaKind::String {
                pattern,
                min_length,
                max_length,
                enumeration,
                format,
            } => {
                let Some(s) = value.as_str() else {
                    return fail(path, format!("expected string, received {}", type_name(value)));
                };
                if let Some(options) = enumeration
                    && !options.contains(value)
                {
                    return fail(path, format!("expected one of {}", Value::Array(options.clone())));
                }
                let len = s.chars().count() as u64;
                if let Some(min) = min_length
                    && len < *min
                {
                    return fail(path, format!("must contain at least {min} character(s)"));
                }
                if let Some(max) = max_length
                    && len > *max
                {
                    return fail(path, format!("must contain at most {max} character(s)"));
                }
                if let Some(p) = pattern
                    && !p.is_match(s)
                {
                    return fail(path, format!("does not match pattern '{}'", p.as_str()));
                }
                if let Some(f) = format
                    && !f.accepts(s)
                {
                    return fail(path, format!("invalid {} string", f.as_str()));
                }
                Ok(())
            }
            SchemaKind::Number {
                integer,
                minimum,
                maximum,
            } => {
                let Some(n) = value.as_f64() else {
                    return fail(path, format!("expected number, received {}", type_name(value)));
                };
                if *integer && !(value.is_i64() || value.is_u64() || n.fract() == 0.0) {
                    return fail(path, "expected integer, received float");
                }
                if let Some(min) = minimum
                    && n < *min
                {
                    return fail(path, format!("must be greater than or equal to {min}"));
                }
                if let Some(max) = maximum
                    && n > *max
                {
                    return fail(path, format!("must be less than or equal to {max}"));
                }
                Ok(())
            }
            SchemaKind::Boolean => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    fail(path, format!("expected boolean, received {}", type_name(value)))
                }
            }
            SchemaKind::Array {
                items,
                min_items,
                max_items,
            } => {
                let Some(elements) = value.as_array() else {
                    return fail(path, format!("expected array, received {}", type_name(value)));
                };
                let len = elements.len() as u64;
                if let Some(min) = min_items
                    && len < *min
                {
                    return fail(path, format!("must contain at least {min} item(s)"));
                }
                if let Some(max) = max_items
                    && len > *max
                {
                    return fail(path, format!("must contain at most {max} item(s)"));
                }
                elements.iter().enumerate().try_for_each(|(i, element)| {
                    self.check(items, element, &format!("{path}[{i}]"), in_progress)
                })
            }
            SchemaKind::Object {
                fields, required, ..
            } => {
                let Some(map) = value.as_object() else {
                    return fail(path, format!("expected object, received {}", type_name(value)));
                };
                for (name, field) in fields {
                    let field_path = format!("{path}.{name}");
                    match map.get(name) {
                        Some(v) => self.check(field, v, &field_path, in_progress)?,
                        None if required.contains(name) && field.default.is_none() => {
                            return fail(&field_path, "required");
                        }
                        None => {}
                    }
                }
                Ok(())
            }
        }
    }

    /// Insert declared defaults for missing fields of an object schema.
    ///
    /// Present fields holding objects are filled the same way, through references too.
    pub fn apply_defaults(&self, schema: &ValidationSchema, value: &mut Value) {
        let target;
        let schema = match &schema.kind {
            SchemaKind::Reference(name) => match self.follow(name) {
                Some(resolved) => {
                    target = resolved;
                    &*target
                }
                None => return,
            },
            _ => schema,
        };
        let (SchemaKind::Object { fields, .. }, Value::Object(map)) = (&schema.kind, value) else {
            return;
        };
        for (name, field) in fields {
            if let Some(present) = map.get_mut(name) {
                self.apply_defaults(field, present);
                continue;
            }
            let default = field.default.clone().or_else(|| match &field.kind {
                SchemaKind::Reference(target) => {
                    self.resolve(target).and_then(|s| s.default.clone())
                }
                _ => None,
            });
            if let Some(default) = default {
                map.insert(name.clone(), default);
            }
        }
    }

    /// First non-reference schema along a chain of references; `None` for cycles and unknown names.
    fn follow(&self, name: &str) -> Option<Arc<ValidationSchema>> {
        let mut current = self.resolve(name)?;
        for _ in 0..=self.components.len() {
            let SchemaKind::Reference(next) = &current.kind else {
                return Some(current);
            };
            let next = self.resolve(next)?;
            current = next;
        }
        None
    }

    /// Render as JSON Schema. Referenced components are emitted under `$defs`.
    #[must_use]
    pub fn to_json_schema(&self, schema: &ValidationSchema) -> Value {
        let mut pending = BTreeSet::new();
        let mut root = render(schema, &mut pending);

        let mut defs: BTreeMap<String, Value> = BTreeMap::new();
        while let Some(name) = pending.pop_first() {
            if defs.contains_key(&name) {
                continue;
            }
            let rendered = match self.resolve(&name) {
                Some(target) => render(&target, &mut pending),
                None => json!({}),
            };
            defs.insert(name, rendered);
        }

        if !defs.is_empty()
            && let Value::Object(obj) = &mut root
        {
            obj.insert(
                "$defs".to_string(),
                Value::Object(defs.into_iter().collect()),
            );
        }
        root
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn render(schema: &ValidationSchema, refs: &mut BTreeSet<String>) -> Value {
    let mut out = Map::new();
    let mut ty: Option<&str> = None;

    match &schema.kind {
        SchemaKind::String {
            pattern,
            min_length,
            max_length,
            enumeration,
            format,
        } => {
            ty = Some("string");
            if let Some(values) = enumeration {
                out.insert("enum".into(), Value::Array(values.clone()));
            }
            if let Some(p) = pattern {
                out.insert("pattern".into(), json!(p.as_str()));
            }
            if let Some(n) = min_length {
                out.insert("minLength".into(), json!(n));
            }
            if let Some(n) = max_length {
                out.insert("maxLength".into(), json!(n));
            }
            if let Some(f) = format {
                out.insert("format".into(), json!(f.as_str()));
            }
        }
        SchemaKind::Number {
            integer,
            minimum,
            maximum,
        } => {
            ty = Some(if *integer { "integer" } else { "number" });
            if let Some(n) = minimum {
                out.insert("minimum".into(), json!(n));
            }
            if let Some(n) = maximum {
                out.insert("maximum".into(), json!(n));
            }
        }
        SchemaKind::Boolean => ty = Some("boolean"),
        SchemaKind::Array {
            items,
            min_items,
            max_items,
        } => {
            ty = Some("array");
            out.insert("items".into(), render(items, refs));
            if let Some(n) = min_items {
                out.insert("minItems".into(), json!(n));
            }
            if let Some(n) = max_items {
                out.insert("maxItems".into(), json!(n));
            }
        }
        SchemaKind::Object {
            fields,
            required,
            open,
        } => {
            ty = Some("object");
            let properties: Map<String, Value> = fields
                .iter()
                .map(|(name, field)| (name.clone(), render(field, refs)))
                .collect();
            out.insert("properties".into(), Value::Object(properties));
            let required: Vec<&String> = required
                .iter()
                .filter(|name| {
                    fields
                        .iter()
                        .any(|(n, field)| n == *name && field.default.is_none())
                })
                .collect();
            if !required.is_empty() {
                out.insert("required".into(), json!(required));
            }
            if *open {
                out.insert("additionalProperties".into(), Value::Bool(true));
            }
        }
        SchemaKind::Union(members) => {
            let members: Vec<Value> = members.iter().map(|m| render(m, refs)).collect();
            out.insert("anyOf".into(), Value::Array(members));
        }
        SchemaKind::Intersection(members) => {
            let members: Vec<Value> = members.iter().map(|m| render(m, refs)).collect();
            out.insert("allOf".into(), Value::Array(members));
        }
        SchemaKind::Reference(name) => {
            refs.insert(name.clone());
            out.insert("$ref".into(), json!(format!("#/$defs/{name}")));
        }
        SchemaKind::Any => {}
    }

    match (ty, schema.nullable) {
        (Some(t), true) => {
            out.insert("type".into(), json!([t, "null"]));
        }
        (Some(t), false) => {
            out.insert("type".into(), json!(t));
        }
        (None, true) if !matches!(schema.kind, SchemaKind::Any) => {
            let inner = Value::Object(std::mem::take(&mut out));
            out.insert("anyOf".into(), json!([inner, {"type": "null"}]));
        }
        (None, _) => {}
    }

    if let Some(description) = &schema.description {
        out.insert("description".into(), json!(description));
    }
    if let Some(default) = &schema.default {
        out.insert("default".into(), default.clone());
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v3(raw: Value) -> ValidationSchema {
        compile(&raw, SchemaDialect::V3).expect("compiles")
    }

    fn arena(components: Value) -> SchemaArena {
        let Value::Object(components) = components else {
            panic!("components must be an object");
        };
        SchemaArena::new(SchemaDialect::V3, components)
    }

    #[test]
    fn refs_compile_to_lazy_references() {
        let schema = v3(json!({"$ref": "#/components/schemas/Pet"}));
        assert_eq!(schema.kind, SchemaKind::Reference("Pet".to_string()));

        let legacy = compile(&json!({"$ref": "#/definitions/Pet"}), SchemaDialect::Legacy)
            .expect("compiles");
        assert_eq!(legacy.kind, SchemaKind::Reference("Pet".to_string()));
    }

    #[test]
    fn composition_keywords() {
        let all = v3(json!({"allOf": [{"type": "string"}, {"type": "string", "minLength": 2}]}));
        assert!(matches!(all.kind, SchemaKind::Intersection(ref m) if m.len() == 2));

        let one = v3(json!({"oneOf": [{"type": "string"}, {"type": "integer"}]}));
        let any = v3(json!({"anyOf": [{"type": "string"}, {"type": "integer"}]}));
        assert!(matches!(one.kind, SchemaKind::Union(_)));
        assert_eq!(one.kind, any.kind);
    }

    #[test]
    fn unknown_or_missing_type_is_any() {
        assert_eq!(v3(json!({})).kind, SchemaKind::Any);
        assert_eq!(v3(json!({"type": "file"})).kind, SchemaKind::Any);
    }

    #[test]
    fn object_without_properties_is_open() {
        let schema = v3(json!({"type": "object"}));
        let a = arena(json!({}));
        assert!(a.validate(&schema, &json!({"anything": [1, 2]})).is_ok());
        assert!(a.validate(&schema, &json!("nope")).is_err());
    }

    #[test]
    fn nullable_keywords_follow_the_dialect() {
        assert!(v3(json!({"type": "string", "nullable": true})).nullable);
        assert!(!v3(json!({"type": "string", "x-nullable": true})).nullable);

        let legacy =
            compile(&json!({"type": "string", "x-nullable": true}), SchemaDialect::Legacy)
                .expect("compiles");
        assert!(legacy.nullable);
    }

    #[test]
    fn type_arrays_become_nullable() {
        let schema = v3(json!({"type": ["integer", "null"]}));
        assert!(schema.nullable);
        assert!(matches!(schema.kind, SchemaKind::Number { integer: true, .. }));
    }

    #[test]
    fn invalid_pattern_is_a_compile_error() {
        assert!(compile(&json!({"type": "string", "pattern": "("}), SchemaDialect::V3).is_err());
        assert!(compile(&json!("string"), SchemaDialect::V3).is_err());
    }

    #[test]
    fn string_constraints() {
        let a = arena(json!({}));
        let schema = v3(json!({
            "type": "string", "minLength": 2, "maxLength": 4, "pattern": "^[a-z]+$"
        }));
        assert!(a.validate(&schema, &json!("abc")).is_ok());
        assert!(a.validate(&schema, &json!("a")).is_err());
        assert!(a.validate(&schema, &json!("abcde")).is_err());
        assert!(a.validate(&schema, &json!("ABC")).is_err());
        assert!(a.validate(&schema, &json!(3)).is_err());

        let status = v3(json!({"type": "string", "enum": ["available", "sold"]}));
        assert!(a.validate(&status, &json!("sold")).is_ok());
        assert!(a.validate(&status, &json!("lost")).is_err());
    }

    #[test]
    fn string_formats() {
        let a = arena(json!({}));
        let date_time = v3(json!({"type": "string", "format": "date-time"}));
        assert!(a.validate(&date_time, &json!("2024-03-01T10:00:00Z")).is_ok());
        assert!(a.validate(&date_time, &json!("yesterday")).is_err());

        let date = v3(json!({"type": "string", "format": "date"}));
        assert!(a.validate(&date, &json!("2024-03-01")).is_ok());
        assert!(a.validate(&date, &json!("2024-13-01")).is_err());

        let email = v3(json!({"type": "string", "format": "email"}));
        assert!(a.validate(&email, &json!("dev@example.com")).is_ok());
        assert!(a.validate(&email, &json!("dev@localhost")).is_err());

        let uri = v3(json!({"type": "string", "format": "uri"}));
        assert!(a.validate(&uri, &json!("https://example.com/x")).is_ok());
        assert!(a.validate(&uri, &json!("not a uri")).is_err());
    }

    #[test]
    fn numbers_and_integers() {
        let a = arena(json!({}));
        let int = v3(json!({"type": "integer", "minimum": 1, "maximum": 10}));
        assert!(a.validate(&int, &json!(5)).is_ok());
        assert!(a.validate(&int, &json!(5.5)).is_err());
        assert!(a.validate(&int, &json!(0)).is_err());
        assert!(a.validate(&int, &json!(11)).is_err());
        assert!(a.validate(&int, &json!("5")).is_err());

        let num = v3(json!({"type": "number"}));
        assert!(a.validate(&num, &json!(5.5)).is_ok());
    }

    #[test]
    fn null_only_when_nullable() {
        let a = arena(json!({}));
        assert!(a.validate(&v3(json!({"type": "string"})), &Value::Null).is_err());
        assert!(
            a.validate(&v3(json!({"type": "string", "nullable": true})), &Value::Null)
                .is_ok()
        );
        assert!(a.validate(&v3(json!({})), &Value::Null).is_ok());
    }

    #[test]
    fn arrays_report_item_paths() {
        let a = arena(json!({}));
        let schema = v3(json!({
            "type": "array", "items": {"type": "string"}, "minItems": 1, "maxItems": 3
        }));
        assert!(a.validate(&schema, &json!(["a", "b"])).is_ok());
        assert!(a.validate(&schema, &json!([])).is_err());
        assert!(a.validate(&schema, &json!(["a", "b", "c", "d"])).is_err());

        let err = a.validate(&schema, &json!(["a", 2])).unwrap_err();
        assert_eq!(err.path, "$[1]");
    }

    #[test]
    fn objects_check_required_fields_and_ignore_unknown_keys() {
        let a = arena(json!({}));
        let schema = v3(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "tag": {"type": "string"},
                "kind": {"type": "string", "default": "dog"}
            },
            "required": ["name", "kind", "ghost"]
        }));
        assert!(schema.is_required("name"));
        assert!(!schema.is_required("ghost"));

        assert!(a.validate(&schema, &json!({"name": "rex", "extra": 1})).is_ok());

        let err = a.validate(&schema, &json!({"tag": "x"})).unwrap_err();
        assert_eq!(err.path, "$.name");
        assert_eq!(err.to_string(), "$.name: required");
    }

    #[test]
    fn unions_and_intersections() {
        let a = arena(json!({}));
        let union = v3(json!({"oneOf": [{"type": "string"}, {"type": "integer"}]}));
        assert!(a.validate(&union, &json!("x")).is_ok());
        assert!(a.validate(&union, &json!(1)).is_ok());
        assert!(a.validate(&union, &json!(true)).is_err());

        let both = v3(json!({"allOf": [
            {"type": "object", "properties": {"a": {"type": "string"}}, "required": ["a"]},
            {"type": "object", "properties": {"b": {"type": "integer"}}, "required": ["b"]}
        ]}));
        assert!(a.validate(&both, &json!({"a": "x", "b": 1})).is_ok());
        assert!(a.validate(&both, &json!({"a": "x"})).is_err());
    }

    #[test]
    fn references_resolve_lazily_and_are_memoized() {
        let a = arena(json!({
            "Pet": {"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}
        }));
        let schema = v3(json!({"$ref": "#/components/schemas/Pet"}));
        assert!(a.validate(&schema, &json!({"name": "rex"})).is_ok());
        assert!(a.validate(&schema, &json!({})).is_err());

        let first = a.resolve("Pet").expect("resolves");
        let second = a.resolve("Pet").expect("resolves");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn recursive_components_validate_finite_values() {
        let a = arena(json!({
            "Node": {
                "type": "object",
                "properties": {
                    "value": {"type": "integer"},
                    "children": {"type": "array", "items": {"$ref": "#/components/schemas/Node"}}
                },
                "required": ["value"]
            },
            "Loop": {"allOf": [{"$ref": "#/components/schemas/Loop"}]}
        }));
        let node = v3(json!({"$ref": "#/components/schemas/Node"}));
        let tree = json!({"value": 1, "children": [{"value": 2, "children": []}]});
        assert!(a.validate(&node, &tree).is_ok());

        let err = a
            .validate(&node, &json!({"value": 1, "children": [{"value": "x"}]}))
            .unwrap_err();
        assert_eq!(err.path, "$.children[0].value");

        let looped = v3(json!({"$ref": "#/components/schemas/Loop"}));
        let err = a.validate(&looped, &json!(42)).unwrap_err();
        assert_eq!(err.message, "recursive schema reference 'Loop'");
    }

    #[test]
    fn self_referencing_union_branch_does_not_match() {
        let a = arena(json!({
            "A": {"anyOf": [{"$ref": "#/components/schemas/A"}, {"type": "string"}]}
        }));
        let schema = v3(json!({"$ref": "#/components/schemas/A"}));
        assert!(a.validate(&schema, &json!("ok")).is_ok());

        let err = a.validate(&schema, &json!(42)).unwrap_err();
        assert_eq!(err.path, "$");
        assert_eq!(err.message, "value does not match any allowed schema");
    }

    #[test]
    fn unresolved_reference_fails_validation() {
        let a = arena(json!({}));
        let schema = v3(json!({"$ref": "#/components/schemas/Missing"}));
        assert!(a.validate(&schema, &json!({})).is_err());
        assert!(a.resolve("Missing").is_none());
    }

    #[test]
    fn convert_components_skips_failures() {
        let a = arena(json!({
            "Good": {"type": "string"},
            "Bad": {"type": "string", "pattern": "(?<=x)y"},
            "AlsoGood": {"type": "integer"}
        }));
        let names: Vec<String> = a.convert_components().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Good".to_string(), "AlsoGood".to_string()]);
    }

    #[test]
    fn defaults_fill_missing_top_level_fields() {
        let a = arena(json!({}));
        let schema = v3(json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "default": 20},
                "q": {"type": "string"}
            }
        }));
        let mut args = json!({"q": "x"});
        a.apply_defaults(&schema, &mut args);
        assert_eq!(args, json!({"q": "x", "limit": 20}));

        let mut explicit = json!({"limit": 5});
        a.apply_defaults(&schema, &mut explicit);
        assert_eq!(explicit["limit"], json!(5));
    }

    #[test]
    fn defaults_fill_nested_objects() {
        let a = arena(json!({
            "Paging": {
                "type": "object",
                "properties": {"size": {"type": "integer", "default": 50}}
            },
            "Alias": {"$ref": "#/components/schemas/Paging"}
        }));
        let schema = v3(json!({
            "type": "object",
            "properties": {
                "filter": {
                    "type": "object",
                    "properties": {
                        "limit": {"type": "integer", "default": 5},
                        "tag": {"type": "string"}
                    }
                },
                "paging": {"$ref": "#/components/schemas/Alias"}
            }
        }));

        let mut args = json!({"filter": {"tag": "a"}, "paging": {}});
        a.apply_defaults(&schema, &mut args);
        assert_eq!(
            args,
            json!({"filter": {"tag": "a", "limit": 5}, "paging": {"size": 50}})
        );

        let mut absent = json!({});
        a.apply_defaults(&schema, &mut absent);
        assert_eq!(absent, json!({}));

        let mut wrong_type = json!({"filter": "x"});
        a.apply_defaults(&schema, &mut wrong_type);
        assert_eq!(wrong_type, json!({"filter": "x"}));
    }

    #[test]
    fn defaults_stop_at_reference_cycles() {
        let a = arena(json!({
            "A": {"$ref": "#/components/schemas/B"},
            "B": {"$ref": "#/components/schemas/A"}
        }));
        let schema = v3(json!({
            "type": "object",
            "properties": {"x": {"$ref": "#/components/schemas/A"}}
        }));
        let mut args = json!({"x": {"y": 1}});
        a.apply_defaults(&schema, &mut args);
        assert_eq!(args, json!({"x": {"y": 1}}));
    }

    #[test]
    fn json_schema_collects_reachable_defs() {
        let a = arena(json!({
            "Node": {
                "type": "object",
                "properties": {
                    "next": {"$ref": "#/components/schemas/Node"},
                    "owner": {"$ref": "#/components/schemas/Owner"}
                }
            },
            "Owner": {"type": "string", "nullable": true},
            "Unused": {"type": "boolean"}
        }));
        let rendered = a.to_json_schema(&v3(json!({"$ref": "#/components/schemas/Node"})));
        assert_eq!(rendered["$ref"], json!("#/$defs/Node"));
        let defs = rendered["$defs"].as_object().expect("defs");
        assert!(defs.contains_key("Node"));
        assert_eq!(defs["Owner"]["type"], json!(["string", "null"]));
        assert!(!defs.contains_key("Unused"));
    }

    #[test]
    fn json_schema_omits_required_fields_with_defaults() {
        let a = arena(json!({}));
        let schema = v3(json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "page": {"type": "integer", "default": 1}
            },
            "required": ["id", "page"]
        }));
        let rendered = a.to_json_schema(&schema);
        assert_eq!(rendered["type"], json!("object"));
        assert_eq!(rendered["required"], json!(["id"]));
        assert_eq!(rendered["properties"]["page"]["default"], json!(1));
    }
}
