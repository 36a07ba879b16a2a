// Request normalization: reconciles alternate field spellings before schema
// validation. Total over any JSON value; anything it does not recognise is
// passed through untouched for validation to report.

use serde_json::{Map, Value};

/// Rewrite alternate spellings in a raw request object into canonical form.
///
/// - `target_url` becomes `target: {url}` when `target` is absent
/// - a bare string `target` is wrapped as `{url: target}`
/// - page nodes with `summary` but no `content` get `summary` renamed
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_object(map)),
        other => other,
    }
}

/// Object form of [`normalize`].
pub fn normalize_object(mut map: Map<String, Value>) -> Map<String, Value> {
    if !map.contains_key("target") {
        if let Some(url) = map.remove("target_url") {
            map.insert("target".to_string(), url_target(url));
        }
    }

    if let Some(target) = map.get_mut("target") {
        if target.is_string() {
            let url = target.take();
            *target = url_target(url);
        }
    }

    if let Some(Value::Array(pages)) = map.get_mut("pages") {
        pages.iter_mut().for_each(normalize_page);
    }

    map
}

fn url_target(url: Value) -> Value {
    let mut target = Map::new();
    target.insert("url".to_string(), url);
    Value::Object(target)
}

fn normalize_page(page: &mut Value) {
    let Value::Object(node) = page else {
        return;
    };

    if !node.contains_key("content") {
        if let Some(summary) = node.remove("summary") {
            node.insert("content".to_string(), summary);
        }
    }

    if let Some(Value::Array(children)) = node.get_mut("children") {
        children.iter_mut().for_each(normalize_page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_url_becomes_target_object() {
        let out = normalize(json!({"target_url": "https://x/1/v/s/2", "pages": []}));
        assert_eq!(out, json!({"pages": [], "target": {"url": "https://x/1/v/s/2"}}));
    }

    #[test]
    fn explicit_target_keeps_target_url_untouched() {
        let input = json!({"target": {"doc_id": "d"}, "target_url": "https://x", "pages": []});
        assert_eq!(normalize(input.clone()), input);
    }

    #[test]
    fn bare_string_target_is_wrapped() {
        let out = normalize(json!({"target": "https://x/1/v/dc/d"}));
        assert_eq!(out["target"], json!({"url": "https://x/1/v/dc/d"}));
    }

    #[test]
    fn summary_renamed_at_every_depth() {
        let out = normalize(json!({
            "pages": [
                {"title": "A", "summary": "a", "children": [
                    {"title": "A1", "summary": "a1"},
                    {"title": "A2", "content": "kept", "summary": "dropped?"}
                ]}
            ]
        }));
        assert_eq!(out["pages"][0]["content"], "a");
        assert!(out["pages"][0].get("summary").is_none());
        assert_eq!(out["pages"][0]["children"][0]["content"], "a1");
        assert_eq!(out["pages"][0]["children"][1]["content"], "kept");
        assert_eq!(out["pages"][0]["children"][1]["summary"], "dropped?");
    }

    #[test]
    fn odd_shapes_pass_through() {
        assert_eq!(normalize(json!([1, 2])), json!([1, 2]));
        let out = normalize(json!({"pages": ["not a page", 3, null]}));
        assert_eq!(out, json!({"pages": ["not a page", 3, null]}));
    }
}
