//! JSONPath-style property lookup over the event property dictionary.
//!
//! Supports the subset used by job configs: a `$` root, dotted member access
//! and numeric array indices, e.g. `$.data.deployment.deploymentURIsLocal[0]`.
//! Filters, wildcards and recursive descent are not supported; a path using
//! them simply resolves to nothing.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'p> {
    Key(&'p str),
    Index(usize),
}

fn parse(path: &str) -> Option<Vec<Segment<'_>>> {
    let trimmed = path.trim();
    let rest = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let rest = rest.strip_prefix('.').unwrap_or(rest);

    let mut segments = Vec::new();
    if rest.is_empty() {
        return Some(segments);
    }

    for part in rest.split('.') {
        let (key, mut indices) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if key.is_empty() && indices.is_empty() {
            return None;
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key));
        }
        while !indices.is_empty() {
            let inner = indices.strip_prefix('[')?;
            let close = inner.find(']')?;
            let index = inner[..close].trim().parse::<usize>().ok()?;
            segments.push(Segment::Index(index));
            indices = &inner[close + 1..];
        }
    }
    Some(segments)
}

/// Resolve `path` against `root`. Returns `None` for malformed paths and for
/// paths that do not exist in the document.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse(path)?;
    let mut current = root;
    for segment in segments {
        current = match segment {
            Segment::Key(key) => current.as_object()?.get(key)?,
            Segment::Index(i) => current.as_array()?.get(i)?,
        };
    }
    Some(current)
}

/// Resolve `path` and render the value as a string.
///
/// Strings are returned verbatim, other scalars as their JSON text and
/// objects/arrays as compact JSON. `null` counts as absent.
pub fn lookup_string(root: &Value, path: &str) -> Option<String> {
    match lookup(root, path)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "data": {
                "project": "sockshop",
                "test": { "teststrategy": "locust" },
                "deployment": { "deploymentURIsLocal": ["http://carts:80", "http://carts:8080"] },
                "labels": { "buildId": "build-17" },
                "value": 1,
                "flag": true,
                "nothing": null
            }
        })
    }

    #[test]
    fn resolves_nested_members() {
        assert_eq!(
            lookup_string(&doc(), "$.data.test.teststrategy").as_deref(),
            Some("locust")
        );
    }

    #[test]
    fn resolves_array_indices() {
        assert_eq!(
            lookup_string(&doc(), "$.data.deployment.deploymentURIsLocal[1]").as_deref(),
            Some("http://carts:8080")
        );
    }

    #[test]
    fn root_prefix_is_optional() {
        assert_eq!(
            lookup_string(&doc(), "data.project").as_deref(),
            Some("sockshop")
        );
    }

    #[test]
    fn renders_non_string_scalars_as_json_text() {
        assert_eq!(lookup_string(&doc(), "$.data.value").as_deref(), Some("1"));
        assert_eq!(lookup_string(&doc(), "$.data.flag").as_deref(), Some("true"));
        assert_eq!(
            lookup_string(&doc(), "$.data.labels").as_deref(),
            Some(r#"{"buildId":"build-17"}"#)
        );
    }

    #[test]
    fn missing_or_null_values_resolve_to_none() {
        assert!(lookup_string(&doc(), "$.data.missing").is_none());
        assert!(lookup_string(&doc(), "$.data.nothing").is_none());
        assert!(lookup_string(&doc(), "$.data.deployment.deploymentURIsLocal[5]").is_none());
    }

    #[test]
    fn malformed_paths_resolve_to_none() {
        assert!(lookup(&doc(), "$.data..project").is_none());
        assert!(lookup(&doc(), "$.data.deployment.deploymentURIsLocal[x]").is_none());
        assert!(lookup(&doc(), "$.data.deployment.deploymentURIsLocal[0").is_none());
    }

    #[test]
    fn bare_root_returns_whole_document() {
        assert_eq!(lookup(&doc(), "$"), Some(&doc()));
    }
}
