//! Tool name and description derivation.

use crate::document::Operation;
use openapi_mcp_http_tools::HttpMethod;

/// Tool name for an operation.
///
/// `operationId` is used verbatim. Otherwise the name is `<method>_<path parts>`: empty parts
/// dropped, one leading `api` segment dropped (any case), `{p}` rendered as `By{p}`, parts joined
/// with `_`, and `root` when nothing is left.
#[must_use]
pub fn generate_tool_name(path: &str, method: HttpMethod, operation_id: Option<&str>) -> String {
    if let Some(id) = operation_id.filter(|id| !id.is_empty()) {
        return id.to_string();
    }

    let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.first().is_some_and(|p| p.eq_ignore_ascii_case("api")) {
        parts.remove(0);
    }

    let joined = parts
        .iter()
        .map(|part| match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            Some(param) => format!("By{param}"),
            None => (*part).to_string(),
        })
        .collect::<Vec<_>>()
        .join("_");

    let suffix = if joined.is_empty() { "root" } else { &joined };
    format!("{}_{suffix}", method.as_str())
}

#[must_use]
pub fn generate_tool_description(operation: &Operation) -> String {
    [&operation.summary, &operation.description]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .cloned()
        .unwrap_or_else(|| "No description available".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::OperationSecurity;

    fn op(summary: Option<&str>, description: Option<&str>) -> Operation {
        Operation {
            method: HttpMethod::Get,
            operation_id: None,
            summary: summary.map(str::to_string),
            description: description.map(str::to_string),
            parameters: Vec::new(),
            request_body: None,
            security: OperationSecurity::Inherited,
        }
    }

    #[test]
    fn operation_id_wins() {
        assert_eq!(
            generate_tool_name("/api/person/{id}", HttpMethod::Get, Some("findPerson")),
            "findPerson"
        );
    }

    #[test]
    fn names_from_paths() {
        let cases = [
            ("/api/person", HttpMethod::Get, "get_person"),
            ("/api/person/{id}", HttpMethod::Get, "get_person_Byid"),
            ("/api/person/{id}/address", HttpMethod::Get, "get_person_Byid_address"),
            ("/API/orders", HttpMethod::Post, "post_orders"),
            ("/v1/api/users", HttpMethod::Delete, "delete_v1_api_users"),
            ("/", HttpMethod::Get, "get_root"),
            ("/api", HttpMethod::Head, "head_root"),
            ("//pets//{petId}", HttpMethod::Patch, "patch_pets_BypetId"),
        ];
        for (path, method, expected) in cases {
            assert_eq!(generate_tool_name(path, method, None), expected, "{method} {path}");
        }
    }

    #[test]
    fn descriptions_fall_back_in_order() {
        assert_eq!(generate_tool_description(&op(Some("Get person"), Some("long"))), "Get person");
        assert_eq!(generate_tool_description(&op(None, Some("long"))), "long");
        assert_eq!(generate_tool_description(&op(None, None)), "No description available");
    }
}
