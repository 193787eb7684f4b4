//! `OpenAPI` tool source.
//!
//! Converts a loaded document into MCP tools and executes `tools/call` by dispatching outbound
//! HTTP requests through a shared [`ApiClient`].

use crate::base_url::resolve_base_url;
use crate::config::ApiServerConfig;
use crate::converter::create_converter;
use crate::document::Document;
use crate::error::{OpenApiToolsError, Result};
use crate::loader::DocumentLoader;
use crate::security;
use crate::tool::ToolDefinition;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use openapi_mcp_http_tools::{
    ApiClient, ApiClientOptions, CredentialProvider, DEFAULT_TIMEOUT, EnvCredentials,
    RequestConfig,
};
use rmcp::model::{CallToolResult, Content, Tool};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Handler bound to one registered tool. Never fails: errors are rendered into the result.
pub type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, CallToolResult> + Send + Sync>;

/// A host that accepts tool registrations. Registering a name twice replaces the first entry.
pub trait ToolRegistry {
    fn register_tool(&mut self, tool: Tool, handler: ToolHandler);
}

/// How a source talks to the upstream API.
#[derive(Clone)]
pub struct SourceOptions {
    /// Overrides the document's base URL.
    pub base_url: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub strict_security: bool,
    pub credentials: Arc<dyn CredentialProvider>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: BTreeMap::new(),
            timeout: None,
            strict_security: true,
            credentials: Arc::new(EnvCredentials),
        }
    }
}

impl fmt::Debug for SourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceOptions")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("strict_security", &self.strict_security)
            .finish_non_exhaustive()
    }
}

impl From<&ApiServerConfig> for SourceOptions {
    fn from(config: &ApiServerConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            headers: config.headers.clone(),
            timeout: config.timeout(),
            strict_security: config.strict_security,
            ..Self::default()
        }
    }
}

/// Tools generated from one document, bound to one API client.
#[derive(Clone, Debug)]
pub struct OpenApiToolSource {
    /// Source name (used for logs).
    name: String,
    tools: Arc<Vec<ToolDefinition>>,
    client: ApiClient,
    title: Option<String>,
}

impl OpenApiToolSource {
    /// Convert a loaded document into tools.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built (e.g. invalid default headers).
    pub fn from_document(
        name: impl Into<String>,
        document: &Document,
        options: SourceOptions,
    ) -> Result<Self> {
        let name = name.into();
        let tools = create_converter(document).generate_tools();
        let policy = security::extract(Some(document)).unwrap_or_default();

        let base_url = resolve_base_url(options.base_url.as_deref(), document).unwrap_or_else(|| {
            warn!(
                source = %name,
                "no base URL provided and none found in the document; calls will likely fail"
            );
            String::new()
        });

        let client = ApiClient::with_credentials(
            ApiClientOptions {
                base_url,
                headers: options.headers,
                timeout: options
                    .timeout
                    .filter(|t| !t.is_zero())
                    .unwrap_or(DEFAULT_TIMEOUT),
                security_schemes: policy.security_schemes,
                strict_security: options.strict_security,
            },
            options.credentials,
        )?;

        info!(
            source = %name,
            tools = tools.len(),
            base_url = client.base_url(),
            "generated tools from OpenAPI document"
        );

        Ok(Self {
            name,
            tools: Arc::new(tools),
            client,
            title: document.title.clone(),
        })
    }

    /// Load `config.spec` and convert it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document fails to load or the client cannot be built.
    pub async fn build(name: impl Into<String>, config: &ApiServerConfig) -> Result<Self> {
        let document = DocumentLoader::new()?.load(&config.spec).await?;
        Self::from_document(name, &document, SourceOptions::from(config))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `info.title` of the source document.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Every generated definition, duplicates included, in document order.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// The MCP `Tool`s exposed by this source. A repeated name shows the last definition.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = Vec::with_capacity(self.tools.len());
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for def in self.tools.iter() {
            let tool = def.to_mcp_tool();
            match positions.get(def.name.as_str()) {
                Some(&i) => tools[i] = tool,
                None => {
                    positions.insert(def.name.as_str(), tools.len());
                    tools.push(tool);
                }
            }
        }
        tools
    }

    /// Execute a tool call. Failures are reported in the result, never as `Err`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> CallToolResult {
        match self.tools.iter().rev().find(|t| t.name == name) {
            Some(tool) => self.call_definition(tool, arguments).await,
            None => error_result(&OpenApiToolsError::ToolNotFound(name.to_string())),
        }
    }

    /// Register every tool, in document order, with a host registry.
    pub fn register_tools<R: ToolRegistry + ?Sized>(&self, registry: &mut R) {
        for index in 0..self.tools.len() {
            let tool = self.tools[index].to_mcp_tool();
            let source = self.clone();
            let handler: ToolHandler = Arc::new(move |arguments| {
                let source = source.clone();
                async move {
                    let tool = &source.tools[index];
                    source.call_definition(tool, arguments).await
                }
                .boxed()
            });
            registry.register_tool(tool, handler);
        }
    }

    async fn call_definition(&self, tool: &ToolDefinition, arguments: Value) -> CallToolResult {
        match self.dispatch(tool, arguments).await {
            Ok(data) => {
                let text = serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());
                CallToolResult::success(vec![Content::text(text)])
            }
            Err(e) => {
                warn!(source = %self.name, tool = %tool.name, error = %e, "tool call failed");
                error_result(&e)
            }
        }
    }

    async fn dispatch(&self, tool: &ToolDefinition, arguments: Value) -> Result<Value> {
        let arguments = tool.prepare_arguments(arguments)?;
        let params = self
            .client
            .classify_parameters(&arguments, &tool.path_template, tool.method);
        let response = self
            .client
            .request(RequestConfig::new(
                tool.method,
                tool.path_template.clone(),
                params,
                tool.security.clone(),
            ))
            .await?;
        Ok(response.data)
    }
}

fn error_result(error: &OpenApiToolsError) -> CallToolResult {
    let details = error.details();
    let details = serde_json::to_string_pretty(&details).unwrap_or_else(|_| details.to_string());
    CallToolResult::error(vec![Content::text(format!("Error: {error}\n{details}"))])
}
