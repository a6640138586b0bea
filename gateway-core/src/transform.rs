//! Transformer contract: `(store-items, handler-context) -> JSON bytes`
//! (§4.7). A transformer that would produce invalid JSON is treated as empty
//! and logged; the subscriber never receives a malformed frame — since we
//! build `serde_json::Value`s directly here rather than hand-assembling
//! strings, that failure mode can only occur at final serialization, which
//! is handled by the caller (informer_pool::publish_or_warn).

use chrono::Utc;
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::{json, Map, Value};

/// Context a transformer needs: which kind is being rendered, and (for list
/// views) which resource name, if any, should be flashed via `hasUpdated`.
pub struct TransformContext<'a> {
    pub kind: &'a str,
    pub flash_name: Option<&'a str>,
}

/// Turns the informer store's contents into the list-view payload: an array
/// of objects carrying `age`, `name`, `namespace?`, `uid`, plus the object's
/// own fields, with `hasUpdated = true` stamped on the entry matching
/// `flash_name` (§4.7 GetList).
pub fn transform_list(items: &[DynamicObject], ctx: &TransformContext<'_>) -> Value {
    let rows: Vec<Value> = items
        .iter()
        .map(|obj| {
            let mut row = object_summary(obj);
            if ctx.flash_name.is_some_and(|n| n == obj.name_any()) {
                row.insert("hasUpdated".to_string(), Value::Bool(true));
            }
            Value::Object(row)
        })
        .collect();
    Value::Array(rows)
}

/// Turns a single object into the detail-view payload: the full object with
/// the same summary fields stamped on top (§4.7 GetDetails). Returns `null`
/// if the object has been deleted from the store.
pub fn transform_detail(obj: Option<&DynamicObject>) -> Value {
    match obj {
        Some(obj) => Value::Object(full_object(obj)),
        None => Value::Object(Map::new()),
    }
}

/// `{"data": <YAML bytes>}` wrapped in JSON (§4.7 GetYAML).
pub fn transform_yaml(obj: Option<&DynamicObject>) -> Value {
    match obj {
        Some(obj) => {
            let yaml = serde_yaml::to_string(obj).unwrap_or_default();
            json!({ "data": yaml })
        }
        None => json!({ "data": "" }),
    }
}

fn object_summary(obj: &DynamicObject) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("name".to_string(), Value::String(obj.name_any()));
    if let Some(ns) = obj.namespace() {
        map.insert("namespace".to_string(), Value::String(ns));
    }
    map.insert(
        "uid".to_string(),
        Value::String(obj.uid().unwrap_or_default()),
    );
    map.insert("age".to_string(), Value::String(age_of(obj)));
    map
}

fn full_object(obj: &DynamicObject) -> Map<String, Value> {
    let mut map = match serde_json::to_value(obj) {
        Ok(Value::Object(m)) => m,
        _ => Map::new(),
    };
    for (k, v) in object_summary(obj) {
        map.insert(k, v);
    }
    map
}

fn age_of(obj: &DynamicObject) -> String {
    let Some(created) = obj.creation_timestamp() else {
        return String::new();
    };
    let elapsed = Utc::now().signed_duration_since(created.0);
    humanize_duration(elapsed)
}

fn humanize_duration(d: chrono::Duration) -> String {
    let secs = d.num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn obj_with_name(name: &str, namespace: Option<&str>) -> DynamicObject {
        DynamicObject {
            types: None,
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: namespace.map(str::to_string),
                uid: Some(format!("uid-{name}")),
                ..Default::default()
            },
            data: Value::Object(Map::new()),
        }
    }

    #[test]
    fn list_transform_stamps_has_updated_only_on_the_matching_row() {
        let items = vec![obj_with_name("a", Some("default")), obj_with_name("b", Some("default"))];
        let ctx = TransformContext {
            kind: "Pod",
            flash_name: Some("b"),
        };
        let value = transform_list(&items, &ctx);
        let rows = value.as_array().unwrap();
        assert_eq!(rows[0].get("hasUpdated"), None);
        assert_eq!(rows[1]["hasUpdated"], Value::Bool(true));
    }

    #[test]
    fn detail_transform_of_missing_object_is_empty_object() {
        assert_eq!(transform_detail(None), Value::Object(Map::new()));
    }

    #[test]
    fn yaml_transform_wraps_data_key() {
        let obj = obj_with_name("p", Some("default"));
        let value = transform_yaml(Some(&obj));
        assert!(value.get("data").unwrap().as_str().unwrap().contains("name: p"));
    }
}
