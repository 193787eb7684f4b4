//! Tool catalog: every tool of every loaded source, keyed by name.

use crate::config::SourcePlan;
use crate::error::{AdapterError, Result};
use openapi_mcp_tools::{DocumentLoader, LoadedDocument, OpenApiToolSource, ToolHandler, ToolRegistry};
use rmcp::model::{CallToolResult, Tool, ToolAnnotations};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// One listed tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolListing {
    /// Source that owns this tool
    pub source: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

#[derive(Default)]
pub struct ToolCatalog {
    listings: Vec<ToolListing>,
    /// name -> (index into `listings`, handler)
    handlers: HashMap<String, (usize, ToolHandler)>,
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("listings", &self.listings)
            .finish_non_exhaustive()
    }
}

/// Registers one source's tools under its name.
struct SourceRegistrar<'a> {
    catalog: &'a mut ToolCatalog,
    source: &'a str,
}

impl ToolRegistry for SourceRegistrar<'_> {
    fn register_tool(&mut self, tool: Tool, handler: ToolHandler) {
        let listing = ToolListing {
            source: self.source.to_string(),
            name: tool.name.to_string(),
            description: tool.description.as_ref().map(ToString::to_string),
            input_schema: Value::Object((*tool.input_schema).clone()),
            annotations: tool.annotations.clone(),
        };

        let catalog = &mut *self.catalog;
        match catalog.handlers.get(&listing.name).map(|(index, _)| *index) {
            Some(index) => {
                if catalog.listings[index].source != listing.source {
                    warn!(
                        tool = %listing.name,
                        previous = %catalog.listings[index].source,
                        source = %listing.source,
                        "tool name registered twice; the later registration wins"
                    );
                }
                catalog.handlers.insert(listing.name.clone(), (index, handler));
                catalog.listings[index] = listing;
            }
            None => {
                let index = catalog.listings.len();
                catalog.handlers.insert(listing.name.clone(), (index, handler));
                catalog.listings.push(listing);
            }
        }
    }
}

impl ToolCatalog {
    /// Load every source named by `plan` and register its tools.
    ///
    /// # Errors
    ///
    /// Returns an error if a document fails to load (in directory mode: if none loads).
    pub async fn load(plan: &SourcePlan) -> Result<Self> {
        let mut catalog = Self::default();
        match plan {
            SourcePlan::Single(config) => {
                let source = OpenApiToolSource::build(source_name(&config.spec), config).await?;
                catalog.add_source(&source);
            }
            SourcePlan::Directory { dir, options } => {
                let loaded = DocumentLoader::new()?.load_from_directory(dir).await?;
                for LoadedDocument { path, document } in loaded {
                    let name = source_name(&path.display().to_string());
                    let source = OpenApiToolSource::from_document(name, &document, options.clone())?;
                    catalog.add_source(&source);
                }
            }
        }
        info!(tools = catalog.len(), "tool catalog ready");
        Ok(catalog)
    }

    pub fn add_source(&mut self, source: &OpenApiToolSource) {
        let mut registrar = SourceRegistrar {
            catalog: self,
            source: source.name(),
        };
        source.register_tools(&mut registrar);
    }

    #[must_use]
    pub fn listings(&self) -> &[ToolListing] {
        &self.listings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Invoke a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::ToolNotFound`] for unknown names. Failures of the call itself are
    /// reported inside the returned result.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let (_, handler) = self
            .handlers
            .get(name)
            .ok_or_else(|| AdapterError::ToolNotFound(name.to_string()))?;
        Ok(handler(arguments).await)
    }
}

/// The text payload of a tool result (text parts joined by newlines).
#[must_use]
pub fn result_text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|content| content.as_text())
        .map(|text| text.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Source name: the document's file stem, or the last URL segment without its extension.
fn source_name(location: &str) -> String {
    let trimmed = location.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    Path::new(last)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("openapi")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use openapi_mcp_test_support::EchoServer;
    use openapi_mcp_tools::SourceOptions;
    use rmcp::model::Content;
    use serde_json::json;
    use std::path::PathBuf;

    const PEOPLE: &str = r"
openapi: 3.0.0
info: {title: People, version: '1'}
paths:
  /api/person/{id}:
    get:
      summary: Get person
      parameters:
        - {name: id, in: path, required: true, schema: {type: integer}}
";

    const ORDERS: &str = r"
swagger: '2.0'
info: {title: Orders, version: '1'}
paths:
  /orders:
    get:
      operationId: listOrders
      parameters:
        - {name: limit, in: query, type: integer, default: 10}
  /people/{id}:
    get:
      operationId: get_person_Byid
      summary: Shadowing person lookup
      parameters:
        - {name: id, in: path, required: true, type: integer}
";

    fn directory_plan(dir: &Path, base_url: &str) -> SourcePlan {
        SourcePlan::Directory {
            dir: dir.to_path_buf(),
            options: SourceOptions {
                base_url: Some(base_url.to_string()),
                ..SourceOptions::default()
            },
        }
    }

    #[test]
    fn source_names_come_from_locations() {
        assert_eq!(source_name("/srv/openapi/people.yaml"), "people");
        assert_eq!(source_name("https://h/specs/orders.json"), "orders");
        assert_eq!(source_name("https://h/"), "h");
        assert_eq!(source_name(""), "openapi");
    }

    #[test]
    fn result_text_joins_text_parts() {
        let result = CallToolResult::success(vec![
            Content::text("first"),
            Content::image("aGk=", "image/png"),
            Content::text("second"),
        ]);
        assert_eq!(result_text(&result), "first\nsecond");
        assert_eq!(result_text(&CallToolResult::success(Vec::new())), "");
    }

    #[tokio::test]
    async fn directory_sources_share_one_catalog() {
        let server = EchoServer::spawn().await.expect("echo server");
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a_people.yaml"), PEOPLE).expect("write people");
        std::fs::write(dir.path().join("b_orders.yml"), ORDERS).expect("write orders");

        let catalog = ToolCatalog::load(&directory_plan(dir.path(), &server.base_url))
            .await
            .expect("catalog");

        let names: Vec<(&str, &str)> = catalog
            .listings()
            .iter()
            .map(|l| (l.source.as_str(), l.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("b_orders", "get_person_Byid"), ("b_orders", "listOrders")]
        );
        assert_eq!(
            catalog.listings()[0].description.as_deref(),
            Some("Shadowing person lookup")
        );

        let result = catalog
            .call("get_person_Byid", json!({"id": 3}))
            .await
            .expect("call");
        let echoed: Value = serde_json::from_str(&result_text(&result)).expect("echo json");
        assert_eq!(echoed["path"], json!("/people/3"));

        let result = catalog.call("listOrders", json!({})).await.expect("call");
        let echoed: Value = serde_json::from_str(&result_text(&result)).expect("echo json");
        assert_eq!(echoed["query"], json!("limit=10"));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_tools_are_errors() {
        let server = EchoServer::spawn().await.expect("echo server");
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("people.yaml"), PEOPLE).expect("write");

        let catalog = ToolCatalog::load(&directory_plan(dir.path(), &server.base_url))
            .await
            .expect("catalog");
        assert_eq!(catalog.len(), 1);
        let err = catalog.call("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, AdapterError::ToolNotFound(_)));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn missing_directory_fails_to_load() {
        let plan = directory_plan(&PathBuf::from("/no/such/openapi"), "http://h");
        let err = ToolCatalog::load(&plan).await.unwrap_err();
        assert!(matches!(err, AdapterError::OpenApi(_)), "{err}");
    }
}
