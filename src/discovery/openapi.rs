//! OpenAPI/Swagger document reader
//!
//! The document is walked as an untyped `serde_json::Value`; schema and
//! parameter payloads are re-serialized and kept opaque.

use serde_json::Value;

use crate::discovery::models::EndpointDraft;

/// Extract one draft per operation under `paths`, in document order.
///
/// A document without `paths` yields nothing. Keys that are not HTTP
/// methods (path-level `parameters`, `summary`, extensions) are skipped.
pub fn extract_endpoints(document: &Value, source: &str) -> Vec<EndpointDraft> {
    let mut endpoints = Vec::new();

    let Some(paths) = document.get("paths").and_then(|p| p.as_object()) else {
        return endpoints;
    };

    for (path, methods) in paths {
        let Some(methods_obj) = methods.as_object() else {
            continue;
        };

        for (method, operation) in methods_obj {
            if !is_http_method(method) {
                continue;
            }

            let mut endpoint = EndpointDraft::new(method, path, source);

            if let Some(op) = operation.as_object() {
                endpoint.summary = op.get("summary")
                    .and_then(|v| v.as_str())
                    .map(String::from);

                endpoint.description = op.get("description")
                    .and_then(|v| v.as_str())
                    .map(String::from);

                endpoint.parameters = op.get("parameters").and_then(opaque);
                endpoint.request_schema = op.get("requestBody").and_then(opaque);
                endpoint.response_schema = op.get("responses").and_then(opaque);

                if let Some(tags) = op.get("tags").and_then(|t| t.as_array()) {
                    endpoint.tags = tags.iter()
                        .filter_map(|t| t.as_str().map(String::from))
                        .collect();
                }

                endpoint.auth_required = op.get("security")
                    .and_then(|s| s.as_array())
                    .is_some_and(|requirements| !requirements.is_empty());

                endpoint.deprecated = op.get("deprecated")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
            }

            endpoints.push(endpoint);
        }
    }

    endpoints
}

/// Declared spec version: `openapi` first, then `swagger`
pub fn spec_version(document: &Value) -> Option<String> {
    ["openapi", "swagger"]
        .iter()
        .find_map(|key| document.get(*key).and_then(scalar_text))
}

/// Declared `info.title`
pub fn spec_title(document: &Value) -> Option<String> {
    document
        .get("info")
        .and_then(|info| info.get("title"))
        .and_then(|title| title.as_str())
        .filter(|title| !title.is_empty())
        .map(String::from)
}

fn is_http_method(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "get" | "post" | "put" | "patch" | "delete" | "head" | "options")
}

fn opaque(value: &Value) -> Option<String> {
    if value.is_null() {
        return None;
    }
    serde_json::to_string(value).ok()
}

// Some generators emit `swagger: 2.0` unquoted, which parses as a number
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SOURCE: &str = "http://localhost:8080/openapi.json";

    #[test]
    fn test_methods_in_declaration_order() {
        let doc = json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "get": { "summary": "List pets" },
                    "put": { "summary": "Replace pets" }
                }
            }
        });

        let endpoints = extract_endpoints(&doc, SOURCE);
        let methods: Vec<_> = endpoints.iter().map(|e| e.method.as_str()).collect();
        assert_eq!(methods, ["GET", "PUT"]);
        assert!(endpoints.iter().all(|e| e.path == "/pets" && e.source == SOURCE));
    }

    #[test]
    fn test_document_order_is_kept_across_paths() {
        let doc: Value = serde_json::from_str(
            r#"{"paths": {"/zebra": {"post": {}}, "/alpha": {"delete": {}, "GET": {}}}}"#,
        )
        .unwrap();

        let endpoints = extract_endpoints(&doc, SOURCE);
        let pairs: Vec<_> = endpoints.iter().map(|e| (e.path.as_str(), e.method.as_str())).collect();
        assert_eq!(pairs, [("/zebra", "POST"), ("/alpha", "DELETE"), ("/alpha", "GET")]);
    }

    #[test]
    fn test_operation_fields() {
        let doc = json!({
            "paths": {
                "/users/{id}": {
                    "parameters": [{ "name": "id", "in": "path" }],
                    "patch": {
                        "summary": "Update user",
                        "description": "Partial update",
                        "tags": ["users", 7, "admin"],
                        "parameters": [{ "name": "dry_run", "in": "query" }],
                        "requestBody": { "content": { "application/json": {} } },
                        "responses": { "200": { "description": "OK" } },
                        "security": [{ "bearer": [] }],
                        "deprecated": true
                    }
                }
            }
        });

        let endpoints = extract_endpoints(&doc, SOURCE);
        assert_eq!(endpoints.len(), 1);

        let ep = &endpoints[0];
        assert_eq!(ep.method, "PATCH");
        assert_eq!(ep.summary.as_deref(), Some("Update user"));
        assert_eq!(ep.description.as_deref(), Some("Partial update"));
        assert_eq!(ep.tags, ["users", "admin"]);
        assert_eq!(ep.parameters.as_deref(), Some(r#"[{"name":"dry_run","in":"query"}]"#));
        assert_eq!(ep.request_schema.as_deref(), Some(r#"{"content":{"application/json":{}}}"#));
        assert_eq!(ep.response_schema.as_deref(), Some(r#"{"200":{"description":"OK"}}"#));
        assert!(ep.auth_required);
        assert!(ep.deprecated);
    }

    #[test]
    fn test_defaults_for_bare_operation() {
        let doc = json!({ "paths": { "/health": { "head": {}, "options": { "security": [] } } } });

        let endpoints = extract_endpoints(&doc, SOURCE);
        assert_eq!(endpoints.len(), 2);
        for ep in &endpoints {
            assert!(ep.summary.is_none());
            assert!(ep.parameters.is_none());
            assert!(ep.request_schema.is_none());
            assert!(ep.response_schema.is_none());
            assert!(ep.tags.is_empty());
            assert!(!ep.auth_required);
            assert!(!ep.deprecated);
        }
    }

    #[test]
    fn test_missing_paths_is_empty() {
        assert!(extract_endpoints(&json!({ "openapi": "3.1.0" }), SOURCE).is_empty());
        assert!(extract_endpoints(&json!({ "paths": "nope" }), SOURCE).is_empty());
    }

    #[test]
    fn test_unknown_method_keys_skipped() {
        let doc = json!({ "paths": { "/x": { "trace": {}, "x-internal": {}, "get": {} } } });
        let endpoints = extract_endpoints(&doc, SOURCE);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method, "GET");
    }

    #[test]
    fn test_version_and_title() {
        let v3 = json!({ "openapi": "3.0.1", "swagger": "2.0", "info": { "title": "Pets" } });
        assert_eq!(spec_version(&v3).as_deref(), Some("3.0.1"));
        assert_eq!(spec_title(&v3).as_deref(), Some("Pets"));

        let v2 = json!({ "swagger": "2.0", "info": {} });
        assert_eq!(spec_version(&v2).as_deref(), Some("2.0"));
        assert_eq!(spec_title(&v2), None);
        assert_eq!(spec_title(&json!({ "info": { "title": "" } })), None);

        assert_eq!(spec_version(&json!({})), None);
    }
}
