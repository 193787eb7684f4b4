//! Security scheme model shared by the converter and the dispatcher.
//!
//! Only `apiKey` schemes located in a header are actionable; every other kind is recognized so
//! documents load cleanly, but produces no header.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One entry of an `OpenAPI` `security` list: scheme name → scopes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// Where an `apiKey` credential travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecuritySchemeKind {
    ApiKey {
        location: ApiKeyLocation,
        name: String,
    },
    Http {
        scheme: String,
    },
    /// Swagger 2.0 `basic`.
    Basic,
    #[serde(rename = "oauth2")]
    OAuth2,
    OpenIdConnect,
    Other {
        declared: String,
    },
}

/// A named authentication mechanism declared by a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityScheme {
    pub name: String,
    pub kind: SecuritySchemeKind,
}

impl SecurityScheme {
    /// Build a scheme from its raw `OpenAPI` / Swagger declaration.
    ///
    /// Unrecognized or malformed declarations become [`SecuritySchemeKind::Other`].
    #[must_use]
    pub fn from_raw(name: &str, raw: &Value) -> Self {
        let declared = raw.get("type").and_then(Value::as_str).unwrap_or_default();
        let kind = match declared {
            "apiKey" => {
                let location = match raw.get("in").and_then(Value::as_str) {
                    Some("header") => Some(ApiKeyLocation::Header),
                    Some("query") => Some(ApiKeyLocation::Query),
                    Some("cookie") => Some(ApiKeyLocation::Cookie),
                    _ => None,
                };
                let param = raw.get("name").and_then(Value::as_str);
                match (location, param) {
                    (Some(location), Some(param)) => SecuritySchemeKind::ApiKey {
                        location,
                        name: param.to_string(),
                    },
                    _ => SecuritySchemeKind::Other {
                        declared: declared.to_string(),
                    },
                }
            }
            "http" => SecuritySchemeKind::Http {
                scheme: raw
                    .get("scheme")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_ascii_lowercase(),
            },
            "basic" => SecuritySchemeKind::Basic,
            "oauth2" => SecuritySchemeKind::OAuth2,
            "openIdConnect" => SecuritySchemeKind::OpenIdConnect,
            other => SecuritySchemeKind::Other {
                declared: other.to_string(),
            },
        };

        Self {
            name: name.to_string(),
            kind,
        }
    }

    /// Header carrying the credential, for header-located `apiKey` schemes only.
    #[must_use]
    pub fn header_name(&self) -> Option<&str> {
        match &self.kind {
            SecuritySchemeKind::ApiKey {
                location: ApiKeyLocation::Header,
                name,
            } => Some(name),
            _ => None,
        }
    }
}

/// Environment variable holding the credential for a header, e.g. `X-API-Key` → `X_API_KEY`.
#[must_use]
pub fn to_env_var_name(header_name: &str) -> String {
    header_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn env_var_names() {
        assert_eq!(to_env_var_name("X-API-Key"), "X_API_KEY");
        assert_eq!(to_env_var_name("Authorization"), "AUTHORIZATION");
        assert_eq!(to_env_var_name("x.custom token"), "X_CUSTOM_TOKEN");
    }

    #[test]
    fn only_header_api_keys_have_a_header_name() {
        let header = SecurityScheme::from_raw(
            "apiKeyAuth",
            &json!({"type": "apiKey", "in": "header", "name": "X-API-Key"}),
        );
        assert_eq!(header.header_name(), Some("X-API-Key"));

        let query = SecurityScheme::from_raw(
            "queryKey",
            &json!({"type": "apiKey", "in": "query", "name": "api_key"}),
        );
        assert_eq!(query.header_name(), None);

        let bearer =
            SecurityScheme::from_raw("bearerAuth", &json!({"type": "http", "scheme": "Bearer"}));
        assert_eq!(
            bearer.kind,
            SecuritySchemeKind::Http {
                scheme: "bearer".to_string()
            }
        );
        assert_eq!(bearer.header_name(), None);
    }

    #[test]
    fn malformed_api_key_is_inert() {
        let scheme = SecurityScheme::from_raw("broken", &json!({"type": "apiKey"}));
        assert!(matches!(scheme.kind, SecuritySchemeKind::Other { .. }));
    }
}
