//! Base URL selection for generated tools.

use crate::document::Document;
use crate::resolver::DocId;
use tracing::warn;

/// Base URL declared by the document: `servers[0].url`, else `scheme://host+basePath`
/// (first scheme, `https` by default), else `None`.
///
/// Relative server URLs are joined against the document URL when it was fetched over HTTP.
#[must_use]
pub fn extract_base_url(document: &Document) -> Option<String> {
    if let Some(server) = document.servers.first() {
        return Some(absolutize(server, &document.source));
    }

    let host = document.host.as_deref()?;
    let scheme = document.schemes.first().map_or("https", String::as_str);
    let base_path = document.base_path.as_deref().unwrap_or_default();
    Some(format!("{scheme}://{host}{base_path}"))
}

/// An explicit override wins over anything the document declares.
#[must_use]
pub fn resolve_base_url(override_url: Option<&str>, document: &Document) -> Option<String> {
    match override_url.filter(|u| !u.is_empty()) {
        Some(url) => Some(url.to_string()),
        None => extract_base_url(document),
    }
}

fn absolutize(server: &str, source: &DocId) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        return server.to_string();
    }
    match source {
        DocId::Url(doc_url) => match doc_url.join(server) {
            Ok(joined) => joined.to_string().trim_end_matches('/').to_string(),
            Err(e) => {
                warn!(server, error = %e, "cannot resolve relative server URL");
                server.to_string()
            }
        },
        _ => server.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn doc(source: DocId, raw: &Value) -> Document {
        Document::from_value(source, raw).expect("document")
    }

    #[test]
    fn servers_win_over_legacy_host() {
        let d = doc(
            DocId::Inline,
            &json!({
                "openapi": "3.0.0",
                "servers": [{"url": "https://a.example/v1"}, {"url": "https://b.example"}],
                "host": "ignored.example"
            }),
        );
        assert_eq!(extract_base_url(&d).as_deref(), Some("https://a.example/v1"));
    }

    #[test]
    fn legacy_host_base_path_and_scheme() {
        let d = doc(
            DocId::Inline,
            &json!({"swagger": "2.0", "host": "petstore.example", "basePath": "/v2", "schemes": ["http", "https"]}),
        );
        assert_eq!(extract_base_url(&d).as_deref(), Some("http://petstore.example/v2"));

        let d = doc(DocId::Inline, &json!({"swagger": "2.0", "host": "petstore.example"}));
        assert_eq!(extract_base_url(&d).as_deref(), Some("https://petstore.example"));
    }

    #[test]
    fn nothing_declared() {
        let d = doc(DocId::Inline, &json!({"openapi": "3.1.0"}));
        assert_eq!(extract_base_url(&d), None);
        assert_eq!(
            resolve_base_url(Some("http://override"), &d).as_deref(),
            Some("http://override")
        );
    }

    #[test]
    fn override_wins() {
        let d = doc(
            DocId::Inline,
            &json!({"openapi": "3.0.0", "servers": [{"url": "https://a.example"}]}),
        );
        assert_eq!(resolve_base_url(Some("http://h"), &d).as_deref(), Some("http://h"));
        assert_eq!(resolve_base_url(None, &d).as_deref(), Some("https://a.example"));
    }

    #[test]
    fn relative_servers_join_the_document_url() {
        let source = DocId::parse("https://api.example/docs/openapi.json").expect("doc id");
        let d = doc(source, &json!({"openapi": "3.0.0", "servers": [{"url": "/api/v3"}]}));
        assert_eq!(extract_base_url(&d).as_deref(), Some("https://api.example/api/v3"));

        let local = doc(DocId::Inline, &json!({"openapi": "3.0.0", "servers": [{"url": "/api/v3"}]}));
        assert_eq!(extract_base_url(&local).as_deref(), Some("/api/v3"));
    }
}
