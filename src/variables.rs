//! `{{variable}}` substitution for request fragments

use std::collections::HashMap;
use std::sync::OnceLock;
use regex::{Captures, Regex};

use crate::models::HttpRequestSpec;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").unwrap())
}

/// Replace every `{{name}}` whose name is a key of `variables`.
///
/// Unknown placeholders are left verbatim. Replacement values are inserted
/// as-is and never scanned again.
pub fn resolve(text: &str, variables: &HashMap<String, String>) -> String {
    placeholder()
        .replace_all(text, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// The substitutable parts of a request after resolution
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl ResolvedRequest {
    /// Take the request fragments verbatim
    pub fn verbatim(request: &HttpRequestSpec) -> Self {
        ResolvedRequest {
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        }
    }
}

/// Resolve the URL, every header value and the body of `request`.
///
/// Header names are never substituted.
pub fn resolve_request(request: &HttpRequestSpec, variables: &HashMap<String, String>) -> ResolvedRequest {
    let headers = request
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), resolve(value, variables)))
        .collect();

    ResolvedRequest {
        url: resolve(&request.url, variables),
        headers,
        body: request.body.as_deref().map(|body| resolve(body, variables)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HttpMethod;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_replaces_known_variable() {
        let result = resolve("{{base_url}}/api", &vars(&[("base_url", "https://api.example.com")]));
        assert_eq!(result, "https://api.example.com/api");
    }

    #[test]
    fn test_repeated_variables() {
        let result = resolve(
            "{{host}}:{{port}}/{{host}}",
            &vars(&[("host", "localhost"), ("port", "8080")]),
        );
        assert_eq!(result, "localhost:8080/localhost");
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        assert_eq!(resolve("{{foo}}", &HashMap::new()), "{{foo}}");
        assert_eq!(
            resolve("{{base_url}}/{{path}}", &vars(&[("base_url", "https://example.com")])),
            "https://example.com/{{path}}"
        );
    }

    #[test]
    fn test_unresolved_placeholders_stable_across_passes() {
        let variables = vars(&[("a", "1")]);
        let once = resolve("{{a}}-{{b}}-{{ c }}", &variables);
        assert_eq!(once, "1-{{b}}-{{ c }}");
        assert_eq!(resolve(&once, &variables), once);
    }

    #[test]
    fn test_substitution_is_not_recursive() {
        let variables = vars(&[("outer", "{{inner}}"), ("inner", "deep")]);
        assert_eq!(resolve("{{outer}}", &variables), "{{inner}}");
    }

    #[test]
    fn test_word_characters_only() {
        let variables = vars(&[("api_key_2", "abc123"), ("my-var", "x")]);
        assert_eq!(resolve("{{api_key_2}}", &variables), "abc123");
        assert_eq!(resolve("{{my-var}}", &variables), "{{my-var}}");
        assert_eq!(resolve("", &variables), "");
    }

    #[test]
    fn test_resolve_request_fragments() {
        let mut request = HttpRequestSpec::new(HttpMethod::POST, "{{base}}/users");
        request.headers.insert("Authorization".into(), "Bearer {{token}}".into());
        request.headers.insert("X-{{token}}".into(), "plain".into());
        request.body = Some(r#"{"key": "{{secret}}"}"#.into());

        let resolved = resolve_request(
            &request,
            &vars(&[("base", "https://api.example.com"), ("token", "my-token"), ("secret", "shh")]),
        );

        assert_eq!(resolved.url, "https://api.example.com/users");
        assert_eq!(resolved.headers["Authorization"], "Bearer my-token");
        assert_eq!(resolved.headers["X-{{token}}"], "plain");
        assert_eq!(resolved.body.as_deref(), Some(r#"{"key": "shh"}"#));
        // Input untouched
        assert_eq!(request.url, "{{base}}/users");
    }

    #[test]
    fn test_resolve_request_without_body() {
        let request = HttpRequestSpec::new(HttpMethod::GET, "{{base}}");
        let resolved = resolve_request(&request, &vars(&[("base", "http://localhost")]));
        assert_eq!(resolved.url, "http://localhost");
        assert!(resolved.body.is_none());
    }
}
