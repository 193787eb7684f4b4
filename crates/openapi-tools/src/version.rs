//! `OpenAPI` version detection.

use crate::error::{OpenApiToolsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Document family, decided from the root `swagger` / `openapi` field only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecVersion {
    Swagger2,
    OpenApi30,
    OpenApi31,
}

impl SpecVersion {
    #[must_use]
    pub fn is_legacy(self) -> bool {
        matches!(self, SpecVersion::Swagger2)
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpecVersion::Swagger2 => "2.0",
            SpecVersion::OpenApi30 => "3.0",
            SpecVersion::OpenApi31 => "3.1",
        })
    }
}

/// Detect the version of a raw document.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::UnsupportedVersion`] when neither `swagger: "2.0"` nor an
/// `openapi` value starting with `3.0` / `3.1` is present.
pub fn detect(value: &Value) -> Result<SpecVersion> {
    if value.get("swagger").and_then(Value::as_str) == Some("2.0") {
        return Ok(SpecVersion::Swagger2);
    }
    match value.get("openapi").and_then(Value::as_str) {
        Some(v) if v.starts_with("3.0") => Ok(SpecVersion::OpenApi30),
        Some(v) if v.starts_with("3.1") => Ok(SpecVersion::OpenApi31),
        Some(v) => Err(OpenApiToolsError::UnsupportedVersion(format!("openapi: {v}"))),
        None => match value.get("swagger") {
            Some(v) => Err(OpenApiToolsError::UnsupportedVersion(format!("swagger: {v}"))),
            None => Err(OpenApiToolsError::UnsupportedVersion(
                "no 'openapi' or 'swagger' field".to_string(),
            )),
        },
    }
}
