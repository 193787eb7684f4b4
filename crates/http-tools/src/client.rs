//! HTTP dispatcher for `OpenAPI`-derived tools.
//!
//! A tool call arrives as a flat JSON object of arguments. The client sorts those arguments into
//! path / query / body buckets, injects credentials for the operation's security requirements,
//! issues the request, and normalizes the outcome into [`ApiResponse`] or [`HttpToolsError`].

use crate::credentials::{CredentialProvider, EnvCredentials};
use crate::error::{HttpToolsError, Result};
use crate::method::HttpMethod;
use crate::security::{SecurityRequirement, SecurityScheme, to_env_var_name};
use base64::Engine as _;
use mime::Mime;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub type JsonObject = Map<String, Value>;

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Construction options for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientOptions {
    /// Origin + prefix path every operation path is appended to.
    pub base_url: String,
    /// Extra headers sent with every request (merged over the JSON defaults).
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
    /// Security schemes declared by the document, keyed by scheme name.
    pub security_schemes: BTreeMap<String, SecurityScheme>,
    /// Fail a request when a required credential is missing instead of omitting the header.
    pub strict_security: bool,
}

impl Default for ApiClientOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            headers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            security_schemes: BTreeMap::new(),
            strict_security: true,
        }
    }
}

/// Arguments of one call, split by where they travel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedParams {
    pub path_params: JsonObject,
    pub query_params: JsonObject,
    pub body_params: JsonObject,
}

/// Everything needed to issue one upstream request.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: HttpMethod,
    /// Path template, e.g. `/api/person/{id}`.
    pub path: String,
    pub path_params: JsonObject,
    pub query_params: JsonObject,
    pub body_params: JsonObject,
    /// Effective security requirements of the operation (`[]` = no auth).
    pub security: Vec<SecurityRequirement>,
}

impl RequestConfig {
    #[must_use]
    pub fn new(
        method: HttpMethod,
        path: impl Into<String>,
        params: ClassifiedParams,
        security: Vec<SecurityRequirement>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: params.path_params,
            query_params: params.query_params,
            body_params: params.body_params,
            security,
        }
    }
}

/// A 2xx upstream response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub data: Value,
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
}

/// Shared, immutable HTTP client. Cloning is cheap; concurrent calls need no locking.
#[derive(Clone, Debug)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

#[derive(Debug)]
struct ApiClientInner {
    base_url: String,
    headers: HeaderMap,
    timeout: Duration,
    security_schemes: BTreeMap<String, SecurityScheme>,
    strict_security: bool,
    credentials: Arc<dyn CredentialProvider>,
    client: Client,
}

impl ApiClient {
    /// Build a client that reads credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured default header is not a valid HTTP header.
    pub fn new(options: ApiClientOptions) -> Result<Self> {
        Self::with_credentials(options, Arc::new(EnvCredentials))
    }

    /// Build a client with an explicit credential provider.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured default header is not a valid HTTP header, or if the
    /// underlying HTTP client cannot be built.
    pub fn with_credentials(
        options: ApiClientOptions,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &options.headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .build()
            .map_err(|e| HttpToolsError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                base_url: options.base_url,
                headers,
                timeout: options.timeout,
                security_schemes: options.security_schemes,
                strict_security: options.strict_security,
                credentials,
                client,
            }),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Sort call arguments into path / query / body buckets.
    ///
    /// See [`classify_parameters`].
    #[must_use]
    pub fn classify_parameters(
        &self,
        params: &Value,
        path_template: &str,
        method: HttpMethod,
    ) -> ClassifiedParams {
        classify_parameters(params, path_template, method)
    }

    /// Headers carrying credentials for every scheme named in `security`.
    ///
    /// Requirement entries are not evaluated as alternatives: every scheme named in any entry
    /// is treated as required.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::MissingCredential`] when strict security is enabled and a
    /// header `apiKey` scheme has no credential.
    pub fn build_security_headers(
        &self,
        security: &[SecurityRequirement],
    ) -> Result<BTreeMap<String, String>> {
        let mut headers = BTreeMap::new();
        if security.is_empty() || self.inner.security_schemes.is_empty() {
            return Ok(headers);
        }

        let required: BTreeSet<&str> = security
            .iter()
            .flat_map(|requirement| requirement.keys().map(String::as_str))
            .collect();

        for scheme_name in required {
            let Some(scheme) = self.inner.security_schemes.get(scheme_name) else {
                debug!(scheme = scheme_name, "security requirement names an undeclared scheme");
                continue;
            };
            let Some(header) = scheme.header_name() else {
                continue;
            };

            let env_var = to_env_var_name(header);
            match self.inner.credentials.credential(&env_var) {
                Some(token) => {
                    headers.insert(header.to_string(), token);
                }
                None if self.inner.strict_security => {
                    return Err(HttpToolsError::MissingCredential {
                        header: header.to_string(),
                        env_var,
                    });
                }
                None => {
                    debug!(header, env_var, "credential missing, header omitted");
                }
            }
        }

        Ok(headers)
    }

    /// Issue one request.
    ///
    /// # Errors
    ///
    /// - [`HttpToolsError::MissingCredential`] before any network activity (strict mode)
    /// - [`HttpToolsError::Upstream`] when the API answers with a non-2xx status
    /// - [`HttpToolsError::Request`] when no response is received
    pub async fn request(&self, config: RequestConfig) -> Result<ApiResponse> {
        let security_headers = self.build_security_headers(&config.security)?;

        let mut path = config.path;
        for (key, value) in &config.path_params {
            let encoded = encode_uri_component(&value_to_string(value));
            path = path.replacen(&format!("{{{key}}}"), &encoded, 1);
        }

        let url = build_url(&self.inner.base_url, &path, &config.query_params)?;

        let mut headers = self.inner.headers.clone();
        for (name, value) in &security_headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        let mut request = self
            .inner
            .client
            .request(config.method.to_reqwest(), url)
            .headers(headers)
            .timeout(self.inner.timeout);

        if !config.method.sends_query_params() && !config.body_params.is_empty() {
            request = request.json(&config.body_params);
        }

        let response = request.send().await?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let content_type = headers.get(CONTENT_TYPE.as_str()).cloned();
        let bytes = response.bytes().await?;
        let data = decode_body(&bytes, content_type.as_deref());

        if status.is_success() {
            Ok(ApiResponse {
                data,
                status: status.as_u16(),
                status_text,
                headers,
            })
        } else {
            Err(HttpToolsError::Upstream {
                status: status.as_u16(),
                status_text,
                data,
            })
        }
    }
}

/// Sort call arguments into path / query / body buckets.
///
/// For `post`/`put`/`patch`, a bag consisting of exactly one `body` key holding an object is
/// replaced by that object first. Array and scalar `body` values stay wrapped: the request body
/// is always a JSON object keyed by argument name. Then each key whose `{key}` placeholder appears in the path
/// template is a path parameter; the rest go to the query for `get`/`delete` and to the body
/// otherwise.
#[must_use]
pub fn classify_parameters(
    params: &Value,
    path_template: &str,
    method: HttpMethod,
) -> ClassifiedParams {
    let mut out = ClassifiedParams::default();
    let Some(mut bag) = params.as_object() else {
        return out;
    };

    if method.unwraps_body()
        && bag.len() == 1
        && let Some(Value::Object(inner)) = bag.get("body")
    {
        debug!("unwrapping single `body` argument");
        bag = inner;
    }

    for (key, value) in bag {
        let target = if path_template.contains(&format!("{{{key}}}")) {
            &mut out.path_params
        } else if method.sends_query_params() {
            &mut out.query_params
        } else {
            &mut out.body_params
        };
        target.insert(key.clone(), value.clone());
    }

    out
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| HttpToolsError::Config(format!("invalid header name '{name}': {e}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| HttpToolsError::Config(format!("invalid value for header '{name}': {e}")))?;
    Ok((header_name, header_value))
}

fn build_url(base_url: &str, path: &str, query_params: &JsonObject) -> Result<Url> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), path);
    let mut url =
        Url::parse(&raw).map_err(|e| HttpToolsError::Request(format!("Invalid URL '{raw}': {e}")))?;

    let pairs = query_pairs(query_params);
    if !pairs.is_empty() {
        let query = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", encode_query_component(k), encode_query_component(v)))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    Ok(url)
}

/// Flatten query arguments: arrays repeat the key, objects use `name[key]`, nulls are dropped.
fn query_pairs(params: &JsonObject) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (name, value) in params {
        match value {
            Value::Null => {}
            Value::Array(items) => pairs.extend(
                items
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|v| (name.clone(), value_to_string(v))),
            ),
            Value::Object(map) => pairs.extend(
                map.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (format!("{name}[{k}]"), value_to_string(v))),
            ),
            scalar => pairs.push((name.clone(), value_to_string(scalar))),
        }
    }
    pairs
}

fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
        Err(_) => {
            let mime_type = content_type
                .and_then(|ct| ct.parse::<Mime>().ok())
                .map(|m| m.essence_str().to_string());
            json!({
                "encoding": "base64",
                "mimeType": mime_type,
                "data": base64::engine::general_purpose::STANDARD.encode(bytes),
            })
        }
    }
}

/// Convert a JSON value to a string for URL parameters.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// Percent-encode with the `encodeURIComponent` character set.
fn encode_uri_component(s: &str) -> String {
    percent_encode(s, |b| is_unreserved(b) || matches!(b, b'!' | b'\'' | b'(' | b')' | b'*'))
}

fn encode_query_component(s: &str) -> String {
    percent_encode(s, is_unreserved)
}

fn percent_encode(s: &str, keep: impl Fn(u8) -> bool) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if keep(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}

#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    // Best-effort: drop credentials + query + fragment.
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}
