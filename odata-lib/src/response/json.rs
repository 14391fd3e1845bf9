//! OData JSON payloads
//!
//! v4 collections are `{"value": [...], "@odata.nextLink": ...}`; v2
//! wraps everything in `{"d": ...}` with `results` and `__next`.

use crate::model::Fragment;

/// Returns the array under `key` when every other key of the object is
/// collection metadata accepted by `is_metadata`.
fn wrapped<'a>(
    json: &'a serde_json::Value,
    key: &str,
    is_metadata: impl Fn(&str) -> bool,
) -> Option<&'a Vec<serde_json::Value>> {
    let object = json.as_object()?;
    let items = object.get(key)?.as_array()?;
    object
        .keys()
        .all(|k| k == key || is_metadata(k))
        .then_some(items)
}

fn entities_of(json: &serde_json::Value) -> Vec<Fragment> {
    match json {
        serde_json::Value::Array(items) => items.iter().cloned().map(Fragment::Json).collect(),
        serde_json::Value::Object(_) => vec![Fragment::Json(json.clone())],
        _ => Vec::new(),
    }
}

fn v2_results(json: &serde_json::Value) -> Option<&Vec<serde_json::Value>> {
    wrapped(json, "results", |k| k.starts_with("__") && k != "__metadata")
}

fn v4_value(json: &serde_json::Value) -> Option<&Vec<serde_json::Value>> {
    wrapped(json, "value", |k| k.starts_with('@') || k.starts_with("odata."))
}

pub(super) fn find_entities(json: &serde_json::Value) -> Vec<Fragment> {
    let payload = payload(json);
    // expanded v2 collections carry `results` without the `d` envelope
    match v4_value(payload).or_else(|| v2_results(payload)) {
        Some(items) => items.iter().cloned().map(Fragment::Json).collect(),
        None => entities_of(payload),
    }
}

/// Unwraps the v2 `d` envelope.
fn payload(json: &serde_json::Value) -> &serde_json::Value {
    json.get("d").unwrap_or(json)
}

pub(super) fn next_page_link(json: &serde_json::Value) -> Option<String> {
    let payload = payload(json);
    ["@odata.nextLink", "odata.nextLink", "__next"]
        .iter()
        .find_map(|key| payload.get(*key).or_else(|| json.get(*key)))
        .and_then(|link| link.as_str())
        .map(String::from)
}

pub(super) fn count(json: &serde_json::Value) -> Option<usize> {
    let payload = payload(json);
    let count = ["@odata.count", "odata.count", "__count"]
        .iter()
        .find_map(|key| payload.get(*key).or_else(|| json.get(*key)))?;
    match count {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v4_collection() {
        let json = serde_json::json!({
            "@odata.context": "$metadata#Products",
            "@odata.count": 3,
            "value": [{"ID": 1}, {"ID": 2}],
            "@odata.nextLink": "Products?$skip=2"
        });
        assert_eq!(find_entities(&json).len(), 2);
        assert_eq!(next_page_link(&json).as_deref(), Some("Products?$skip=2"));
        assert_eq!(count(&json), Some(3));
    }

    #[test]
    fn test_v2_envelope() {
        let json = serde_json::json!({
            "d": {"results": [{"ID": 1}], "__count": "7", "__next": "Products?$skiptoken=1"}
        });
        assert_eq!(find_entities(&json).len(), 1);
        assert_eq!(next_page_link(&json).as_deref(), Some("Products?$skiptoken=1"));
        assert_eq!(count(&json), Some(7));
    }

    #[test]
    fn test_entity_with_collection_named_like_a_wrapper() {
        let v4 = serde_json::json!({
            "@odata.context": "$metadata#Boxes/$entity",
            "ID": 1,
            "value": [{"Size": 2}, {"Size": 3}]
        });
        assert_eq!(find_entities(&v4), vec![Fragment::Json(v4.clone())]);

        let entity = serde_json::json!({
            "__metadata": {"uri": "Boxes(1)"},
            "ID": 1,
            "results": [{"Size": 2}]
        });
        let v2 = serde_json::json!({"d": entity.clone()});
        assert_eq!(find_entities(&v2), vec![Fragment::Json(entity)]);
    }

    #[test]
    fn test_expanded_v2_results() {
        let json = serde_json::json!({"results": [{"ID": 1}, {"ID": 2}]});
        assert_eq!(find_entities(&json).len(), 2);
    }

    #[test]
    fn test_single_entity() {
        let json = serde_json::json!({"@odata.context": "$metadata#Products/$entity", "ID": 1});
        assert_eq!(find_entities(&json), vec![Fragment::Json(json.clone())]);
        assert!(next_page_link(&json).is_none());
    }
}
