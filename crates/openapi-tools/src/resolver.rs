//! `OpenAPI` `$ref` resolver.
//!
//! Real-world documents split path items, parameters and schemas across files (or URLs). This
//! resolver rewrites a raw document so the converter only ever sees inline values:
//!
//! - path item, parameter and request body `$ref`s are replaced by their targets
//! - schema `$ref`s into the root document's own component map stay as (lazy) references
//! - every other schema `$ref` (other files, URLs, non-component pointers) is inlined
//!
//! Supported forms:
//! - Local refs (`#/...`)
//! - File refs (`./common.yaml#/...`, `/abs/path/spec.yaml#/...`, `file:///...#/...`)
//! - URL refs (`https://example.com/common.yaml#/...`)
//!
//! Key detail: `$ref` resolution is **relative to the document that contains the `$ref`**, so
//! every step carries the current document id ([`DocId`]).

use crate::error::{OpenApiToolsError, Result};
use crate::schema::SchemaDialect;
use futures::future::BoxFuture;
use openapi_mcp_http_tools::HttpMethod;
use parking_lot::RwLock;
use reqwest::Client;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocId {
    Url(Url),
    File(PathBuf),
    /// A document handed over in memory; relative refs resolve against the working directory.
    Inline,
}

impl DocId {
    /// Parse a root document location into a document identifier (URL or file path).
    ///
    /// # Errors
    ///
    /// Returns an error if the location is an invalid URL or invalid file URL.
    pub fn parse(spec_location: &str) -> Result<Self> {
        if spec_location.starts_with("http://") || spec_location.starts_with("https://") {
            let url = Url::parse(spec_location).map_err(|e| {
                OpenApiToolsError::Load(format!("Invalid OpenAPI spec URL '{spec_location}': {e}"))
            })?;
            Ok(DocId::Url(strip_fragment(url)))
        } else if spec_location.starts_with("file://") {
            Ok(DocId::File(file_url_to_path(spec_location)?))
        } else {
            Ok(DocId::File(canonicalize_best_effort(PathBuf::from(
                spec_location,
            ))))
        }
    }

    #[must_use]
    pub fn display(&self) -> String {
        match self {
            DocId::Url(u) => u.to_string(),
            DocId::File(p) => p.display().to_string(),
            DocId::Inline => "<inline>".to_string(),
        }
    }
}

fn strip_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

fn canonicalize_best_effort(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}

fn file_url_to_path(location: &str) -> Result<PathBuf> {
    let url = Url::parse(location)
        .map_err(|e| OpenApiToolsError::Reference(format!("Bad file URL '{location}': {e}")))?;
    let path = url.to_file_path().map_err(|()| {
        OpenApiToolsError::Reference(format!("Bad file URL (not a path): {location}"))
    })?;
    Ok(canonicalize_best_effort(path))
}

/// Parse document text as JSON, falling back to YAML.
pub(crate) fn parse_document_text(content: &str) -> std::result::Result<Value, String> {
    serde_json::from_str(content)
        .or_else(|_| serde_yaml::from_str(content))
        .map_err(|e| e.to_string())
}

#[derive(Debug)]
pub struct RefResolver {
    root_doc: DocId,
    component_pointer: &'static str,
    client: Client,
    docs: RwLock<HashMap<DocId, Arc<Value>>>,
}

impl RefResolver {
    /// Create a resolver whose root document is already parsed.
    #[must_use]
    pub fn new(root_doc: DocId, root: &Value, dialect: SchemaDialect, client: Client) -> Self {
        let mut docs = HashMap::new();
        docs.insert(root_doc.clone(), Arc::new(root.clone()));
        Self {
            root_doc,
            // Prefix without the leading '#'.
            component_pointer: &dialect.component_prefix()[1..],
            client,
            docs: RwLock::new(docs),
        }
    }

    /// Rewrite `root` in place: dereference path items, parameters and request bodies, inline
    /// non-component schema refs.
    ///
    /// # Errors
    ///
    /// Returns an error for unresolvable or cyclic references and for referenced documents that
    /// cannot be loaded or parsed.
    pub async fn dereference(&self, root: &mut Value) -> Result<()> {
        let root_doc = self.root_doc.clone();

        if let Some(paths) = root.get_mut("paths").and_then(Value::as_object_mut) {
            for (path, item) in paths.iter_mut() {
                let (item_doc, resolved) = self.resolve_chain(&root_doc, item).await?;
                *item = resolved;
                self.dereference_path_item(&item_doc, item)
                    .await
                    .map_err(|e| OpenApiToolsError::Reference(format!("path '{path}': {e}")))?;
            }
        }

        let schemas = if self.component_pointer.starts_with("/definitions/") {
            root.get_mut("definitions")
        } else {
            root.get_mut("components").and_then(|c| c.get_mut("schemas"))
        };
        if let Some(schemas) = schemas.and_then(Value::as_object_mut) {
            for (name, schema) in schemas.iter_mut() {
                self.inline_schema(&root_doc, schema, &mut Vec::new())
                    .await
                    .map_err(|e| OpenApiToolsError::Reference(format!("schema '{name}': {e}")))?;
            }
        }

        Ok(())
    }

    async fn dereference_path_item(&self, doc: &DocId, item: &mut Value) -> Result<()> {
        if let Some(params) = item.get_mut("parameters").and_then(Value::as_array_mut) {
            for param in params {
                self.dereference_parameter(doc, param).await?;
            }
        }

        for method in HttpMethod::ALL {
            let Some(operation) = item.get_mut(method.as_str()) else {
                continue;
            };
            if let Some(params) = operation.get_mut("parameters").and_then(Value::as_array_mut) {
                for param in params {
                    self.dereference_parameter(doc, param).await?;
                }
            }
            if let Some(body) = operation.get_mut("requestBody") {
                let (body_doc, resolved) = self.resolve_chain(doc, body).await?;
                *body = resolved;
                if let Some(content) = body.get_mut("content").and_then(Value::as_object_mut) {
                    for media in content.values_mut() {
                        if let Some(schema) = media.get_mut("schema") {
                            self.inline_schema(&body_doc, schema, &mut Vec::new()).await?;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn dereference_parameter(&self, doc: &DocId, param: &mut Value) -> Result<()> {
        let (param_doc, resolved) = self.resolve_chain(doc, param).await?;
        *param = resolved;
        if let Some(schema) = param.get_mut("schema") {
            self.inline_schema(&param_doc, schema, &mut Vec::new()).await?;
        }
        Ok(())
    }

    /// Follow a chain of `$ref`s until a non-reference value is reached.
    async fn resolve_chain(&self, current_doc: &DocId, value: &Value) -> Result<(DocId, Value)> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut doc = current_doc.clone();
        let mut cur = value.clone();

        loop {
            let Some(reference) = cur.get("$ref").and_then(Value::as_str).map(str::to_string)
            else {
                return Ok((doc, cur));
            };
            let key = Self::canonical_ref_key(&doc, &reference)?;
            if !seen.insert(key) {
                return Err(OpenApiToolsError::Reference(format!(
                    "Cyclic $ref detected while resolving: {reference}",
                )));
            }
            let (target_doc, target) = self.resolve_ref_value(&doc, &reference).await?;
            doc = target_doc;
            cur = target;
        }
    }

    fn inline_schema<'a>(
        &'a self,
        doc: &'a DocId,
        value: &'a mut Value,
        stack: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let reference = value
                .get("$ref")
                .and_then(Value::as_str)
                .map(str::to_string);

            if let Some(reference) = reference {
                let (target_doc, pointer) = Self::parse_ref(doc, &reference)?;
                if target_doc == self.root_doc
                    && let Some(ptr) = pointer
                        .as_deref()
                        .filter(|p| p.starts_with(self.component_pointer))
                {
                    // Stays lazy; normalize to the local form.
                    value["$ref"] = json!(format!("#{ptr}"));
                    return Ok(());
                }

                let key = Self::canonical_ref_key(doc, &reference)?;
                if stack.contains(&key) {
                    return Err(OpenApiToolsError::Reference(format!(
                        "Cyclic $ref detected while inlining: {reference}",
                    )));
                }
                let (target_doc, mut target) = self.resolve_ref_value(doc, &reference).await?;
                stack.push(key);
                self.inline_schema(&target_doc, &mut target, stack).await?;
                stack.pop();
                *value = target;
                return Ok(());
            }

            match value {
                Value::Object(map) => {
                    for (key, child) in map.iter_mut() {
                        if matches!(
                            key.as_str(),
                            "example" | "examples" | "default" | "enum" | "const"
                        ) {
                            continue;
                        }
                        self.inline_schema(doc, child, stack).await?;
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        self.inline_schema(doc, item, stack).await?;
                    }
                }
                _ => {}
            }
            Ok(())
        })
    }

    async fn resolve_ref_value(
        &self,
        current_doc: &DocId,
        reference: &str,
    ) -> Result<(DocId, Value)> {
        let (target_doc, pointer) = Self::parse_ref(current_doc, reference)?;
        let doc_value = self.load_doc(&target_doc).await?;

        let selected = if let Some(ptr) = pointer {
            doc_value.pointer(&ptr).cloned().ok_or_else(|| {
                OpenApiToolsError::Reference(format!(
                    "Unresolved $ref '{}' (doc {}, missing pointer '{}')",
                    reference,
                    target_doc.display(),
                    ptr
                ))
            })?
        } else {
            (*doc_value).clone()
        };

        Ok((target_doc, selected))
    }

    fn parse_ref(current_doc: &DocId, reference: &str) -> Result<(DocId, Option<String>)> {
        let (doc_part, frag_part) = match reference.split_once('#') {
            Some((d, f)) => (d, Some(f)),
            None => (reference, None),
        };

        let target_doc = Self::resolve_doc(current_doc, doc_part)?;

        let ptr = match frag_part {
            Some("") | None => None,
            Some(frag) if frag.starts_with('/') => Some(frag.to_string()),
            Some(_) => {
                return Err(OpenApiToolsError::Reference(format!(
                    "Unsupported $ref fragment (expected JSON pointer starting with '/'): {reference}",
                )));
            }
        };

        Ok((target_doc, ptr))
    }

    fn resolve_doc(current_doc: &DocId, doc_part: &str) -> Result<DocId> {
        if doc_part.is_empty() {
            return Ok(current_doc.clone());
        }

        if doc_part.starts_with("http://") || doc_part.starts_with("https://") {
            let url = Url::parse(doc_part).map_err(|e| {
                OpenApiToolsError::Reference(format!("Bad $ref URL '{doc_part}': {e}"))
            })?;
            return Ok(DocId::Url(strip_fragment(url)));
        }

        if doc_part.starts_with("file://") {
            return Ok(DocId::File(file_url_to_path(doc_part)?));
        }

        match current_doc {
            DocId::Url(base) => {
                let joined = base.join(doc_part).map_err(|e| {
                    OpenApiToolsError::Reference(format!(
                        "Failed to resolve relative $ref '{doc_part}' against base {base}: {e}",
                    ))
                })?;
                Ok(DocId::Url(strip_fragment(joined)))
            }
            DocId::File(base) => {
                // Absolute paths should remain absolute.
                let resolved = if Path::new(doc_part).is_absolute() {
                    PathBuf::from(doc_part)
                } else {
                    base.parent()
                        .unwrap_or_else(|| Path::new("."))
                        .join(doc_part)
                };
                Ok(DocId::File(canonicalize_best_effort(resolved)))
            }
            DocId::Inline => Ok(DocId::File(canonicalize_best_effort(PathBuf::from(
                doc_part,
            )))),
        }
    }

    fn canonical_ref_key(current_doc: &DocId, reference: &str) -> Result<String> {
        let (target_doc, pointer) = Self::parse_ref(current_doc, reference)?;
        let mut key = match &target_doc {
            DocId::Url(u) => format!("url:{u}"),
            DocId::File(p) => format!("file:{}", p.display()),
            DocId::Inline => "inline:".to_string(),
        };
        if let Some(ptr) = pointer {
            key.push('#');
            key.push_str(&ptr);
        }
        Ok(key)
    }

    async fn load_doc(&self, doc: &DocId) -> Result<Arc<Value>> {
        // Fast path: cache hit.
        if let Some(v) = self.docs.read().get(doc).cloned() {
            return Ok(v);
        }

        let content = match doc {
            DocId::File(path) => std::fs::read_to_string(path).map_err(|e| {
                OpenApiToolsError::Reference(format!(
                    "Failed to read referenced file {}: {e}",
                    path.display(),
                ))
            })?,
            DocId::Url(url) => self
                .client
                .get(url.clone())
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| {
                    OpenApiToolsError::Reference(format!(
                        "Failed to fetch referenced URL {url}: {e}"
                    ))
                })?
                .text()
                .await
                .map_err(|e| {
                    OpenApiToolsError::Reference(format!(
                        "Failed to read referenced URL body: {e}"
                    ))
                })?,
            DocId::Inline => {
                return Err(OpenApiToolsError::Reference(
                    "in-memory document is not available".to_string(),
                ));
            }
        };

        let parsed = parse_document_text(&content).map_err(|e| {
            OpenApiToolsError::Reference(format!(
                "Failed to parse referenced document {}: {e}",
                doc.display(),
            ))
        })?;

        let parsed = Arc::new(parsed);
        self.docs.write().insert(doc.clone(), Arc::clone(&parsed));
        Ok(parsed)
    }
}
