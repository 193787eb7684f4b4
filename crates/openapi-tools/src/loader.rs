//! Document loading: file, URL, directory or in-memory value.
//!
//! Every entry point funnels into the same pipeline: parse → detect version → dereference →
//! validate structure. Any failure becomes one [`OpenApiToolsError::Load`].

use crate::document::Document;
use crate::error::{OpenApiToolsError, Result};
use crate::resolver::{DocId, RefResolver};
use crate::schema::SchemaDialect;
use crate::version::detect;
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A document loaded from a directory, with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub document: Document,
}

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    client: Client,
}

enum Format {
    Json,
    Yaml,
}

impl DocumentLoader {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| OpenApiToolsError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Load from an `http(s)://` URL, a `file://` URL or a filesystem path.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Load`] on any failure.
    pub async fn load(&self, location: &str) -> Result<Document> {
        if location.starts_with("http://") || location.starts_with("https://") {
            self.load_from_url(location).await
        } else {
            match DocId::parse(location).map_err(OpenApiToolsError::into_load)? {
                DocId::File(path) => self.load_from_file(&path).await,
                _ => Err(OpenApiToolsError::Load(format!(
                    "unsupported document location '{location}'"
                ))),
            }
        }
    }

    /// Load a `.json`, `.yaml` or `.yml` file.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Load`] for unsupported extensions, unreadable files and
    /// invalid documents.
    pub async fn load_from_file(&self, path: &Path) -> Result<Document> {
        self.load_file_inner(path)
            .await
            .map_err(OpenApiToolsError::into_load)
    }

    async fn load_file_inner(&self, path: &Path) -> Result<Document> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let format = match ext.as_str() {
            "json" => Format::Json,
            "yaml" | "yml" => Format::Yaml,
            other => {
                return Err(OpenApiToolsError::Load(format!(
                    "Unsupported file extension: .{other}. Only .json, .yaml, and .yml are supported."
                )));
            }
        };

        let content =
            std::fs::read_to_string(path).map_err(|source| OpenApiToolsError::OpenApiSpecReadFile {
                path: path.display().to_string(),
                source,
            })?;
        let raw = parse(&content, &format)?;
        let source = DocId::File(std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()));
        self.finish(source, raw, &path.display().to_string()).await
    }

    /// Fetch and load a document over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Load`] for transport failures, non-2xx statuses and invalid
    /// documents.
    pub async fn load_from_url(&self, url: &str) -> Result<Document> {
        self.load_url_inner(url)
            .await
            .map_err(OpenApiToolsError::into_load)
    }

    async fn load_url_inner(&self, url: &str) -> Result<Document> {
        let source = DocId::parse(url)?;
        let DocId::Url(parsed) = &source else {
            return Err(OpenApiToolsError::Load(format!("not an http(s) URL: {url}")));
        };

        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| OpenApiToolsError::OpenApiSpecFetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(OpenApiToolsError::OpenApiSpecFetch {
                url: url.to_string(),
                message: format!("HTTP status code {}", status.as_u16()),
            });
        }
        let content = response
            .text()
            .await
            .map_err(|e| OpenApiToolsError::OpenApiSpecFetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let format = if url.to_ascii_lowercase().ends_with(".json")
            || content.trim_start().starts_with('{')
        {
            Format::Json
        } else {
            Format::Yaml
        };
        let raw = parse(&content, &format)?;
        self.finish(source, raw, url).await
    }

    /// Load an already-parsed document.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Load`] for invalid documents or unresolvable references.
    pub async fn load_from_value(&self, value: Value) -> Result<Document> {
        self.finish(DocId::Inline, value, "<inline>")
            .await
            .map_err(OpenApiToolsError::into_load)
    }

    /// Load every `.yaml` / `.yml` file of a directory, in file-name order.
    ///
    /// Files that fail to load are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Load`] if the directory does not exist, holds no YAML files,
    /// or none of them loads.
    pub async fn load_from_directory(&self, dir: &Path) -> Result<Vec<LoadedDocument>> {
        if !dir.is_dir() {
            return Err(OpenApiToolsError::Load(format!(
                "Directory does not exist or is not a directory: {}",
                dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| OpenApiToolsError::Load(format!("{}: {e}", dir.display())))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(OpenApiToolsError::Load(format!(
                "No YAML files found in directory: {}",
                dir.display()
            )));
        }

        let mut loaded = Vec::new();
        for path in files {
            match self.load_from_file(&path).await {
                Ok(document) => loaded.push(LoadedDocument { path, document }),
                Err(e) => warn!(file = %path.display(), error = %e, "skipping OpenAPI document"),
            }
        }

        if loaded.is_empty() {
            return Err(OpenApiToolsError::Load(format!(
                "No valid OpenAPI schemas found in directory: {}",
                dir.display()
            )));
        }
        Ok(loaded)
    }

    async fn finish(&self, source: DocId, mut raw: Value, location: &str) -> Result<Document> {
        let version = detect(&raw)?;
        let resolver = RefResolver::new(
            source.clone(),
            &raw,
            SchemaDialect::for_version(version),
            self.client.clone(),
        );
        resolver.dereference(&mut raw).await?;
        let document = Document::from_value(source, &raw)?;

        info!(
            location,
            version = %document.version,
            title = document.title.as_deref().unwrap_or_default(),
            operations = document.operation_count(),
            "loaded OpenAPI document"
        );
        Ok(document)
    }
}

fn parse(content: &str, format: &Format) -> Result<Value> {
    match format {
        Format::Json => Ok(serde_json::from_str(content)?),
        Format::Yaml => Ok(serde_yaml::from_str(content)?),
    }
}
