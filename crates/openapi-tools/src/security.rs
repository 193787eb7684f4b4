//! Security requirements and schemes declared by a document.

use crate::document::Document;
use crate::error::{OpenApiToolsError, Result};
use crate::version::SpecVersion;
use openapi_mcp_http_tools::{SecurityRequirement, SecurityScheme};
use serde_json::Value;
use std::collections::BTreeMap;

pub use openapi_mcp_http_tools::to_env_var_name;

/// Global security of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub global_security: Vec<SecurityRequirement>,
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

/// Security policy of a loaded document, `None` when there is no document.
#[must_use]
pub fn extract(document: Option<&Document>) -> Option<SecurityPolicy> {
    document.map(|doc| SecurityPolicy {
        global_security: doc.security.clone(),
        security_schemes: doc.security_schemes.clone(),
    })
}

/// Parse a `security` list: an array of `{ schemeName: [scopes] }` maps.
///
/// # Errors
///
/// Returns an error if the value is not an array of objects.
pub fn parse_requirements(raw: &Value) -> Result<Vec<SecurityRequirement>> {
    let entries = raw.as_array().ok_or_else(|| {
        OpenApiToolsError::Load("'security' must be an array of requirement objects".to_string())
    })?;

    entries
        .iter()
        .map(|entry| {
            let map = entry.as_object().ok_or_else(|| {
                OpenApiToolsError::Load(format!("security requirement must be an object: {entry}"))
            })?;
            Ok(map
                .iter()
                .map(|(name, scopes)| {
                    let scopes = scopes
                        .as_array()
                        .map(|s| s.iter().filter_map(Value::as_str).map(str::to_string).collect())
                        .unwrap_or_default();
                    (name.clone(), scopes)
                })
                .collect())
        })
        .collect()
}

/// Declared security schemes: `components.securitySchemes` (3.x) or `securityDefinitions` (2.0).
#[must_use]
pub fn parse_schemes(raw: &Value, version: SpecVersion) -> BTreeMap<String, SecurityScheme> {
    let declared = if version.is_legacy() {
        raw.get("securityDefinitions")
    } else {
        raw.pointer("/components/securitySchemes")
    };

    declared
        .and_then(Value::as_object)
        .map(|schemes| {
            schemes
                .iter()
                .map(|(name, scheme)| (name.clone(), SecurityScheme::from_raw(name, scheme)))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DocId;
    use openapi_mcp_http_tools::SecuritySchemeKind;
    use serde_json::json;

    #[test]
    fn no_document_means_no_policy() {
        assert_eq!(extract(None), None);
    }

    #[test]
    fn global_security_defaults_to_empty() {
        let doc = Document::from_value(DocId::Inline, &json!({"openapi": "3.0.0", "paths": {}}))
            .expect("document");
        let policy = extract(Some(&doc)).expect("policy");
        assert!(policy.global_security.is_empty());
        assert!(policy.security_schemes.is_empty());
    }

    #[test]
    fn schemes_come_from_the_version_specific_location() {
        let v3 = json!({
            "openapi": "3.0.0",
            "security": [{"apiKeyAuth": []}],
            "components": {"securitySchemes": {
                "apiKeyAuth": {"type": "apiKey", "in": "header", "name": "X-API-Key"}
            }},
            "securityDefinitions": {"ignored": {"type": "basic"}}
        });
        let schemes = parse_schemes(&v3, SpecVersion::OpenApi30);
        assert_eq!(schemes.len(), 1);
        assert_eq!(schemes["apiKeyAuth"].header_name(), Some("X-API-Key"));

        let v2 = json!({
            "swagger": "2.0",
            "securityDefinitions": {"basicAuth": {"type": "basic"}}
        });
        let schemes = parse_schemes(&v2, SpecVersion::Swagger2);
        assert_eq!(schemes["basicAuth"].kind, SecuritySchemeKind::Basic);

        let requirements = parse_requirements(&v3["security"]).expect("requirements");
        assert_eq!(requirements.len(), 1);
        assert!(requirements[0].contains_key("apiKeyAuth"));
    }

    #[test]
    fn malformed_requirements_are_rejected() {
        assert!(parse_requirements(&json!({"apiKeyAuth": []})).is_err());
        assert!(parse_requirements(&json!(["apiKeyAuth"])).is_err());
    }
}
