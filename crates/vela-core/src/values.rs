//! Free-form property values with merge support

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// Free-form JSON values (component properties, addon arguments, chart values)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Merge `overlay` over these values; objects merge per key, anything else is replaced
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Set a value under a dotted key such as `image.tag`
    pub fn set(&mut self, key: &str, value: JsonValue) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CoreError::InvalidParameter { arg: key.to_string() });
        }
        insert_path(&mut self.0, &parts, value);
        Ok(())
    }

    pub fn inner(&self) -> &JsonValue {
        &self.0
    }
}

/// Deep merge two JSON values
pub fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Apply a JSON merge patch (RFC 7386): like [`deep_merge`], but `null` removes the key
pub fn merge_patch(base: &mut JsonValue, patch: &JsonValue) {
    let JsonValue::Object(patch_map) = patch else {
        *base = patch.clone();
        return;
    };
    if !base.is_object() {
        *base = JsonValue::Object(serde_json::Map::new());
    }
    if let JsonValue::Object(base_map) = base {
        for (key, value) in patch_map {
            if value.is_null() {
                base_map.remove(key);
            } else {
                merge_patch(
                    base_map.entry(key.clone()).or_insert(JsonValue::Null),
                    value,
                );
            }
        }
    }
}

/// Walk `parts`, turning non-objects into objects, and store `new_value` at the end
fn insert_path(target: &mut JsonValue, parts: &[&str], new_value: JsonValue) {
    let mut current = target;
    for part in parts {
        if !current.is_object() {
            *current = JsonValue::Object(serde_json::Map::new());
        }
        let JsonValue::Object(map) = current else {
            return;
        };
        current = map.entry(part.to_string()).or_insert(JsonValue::Null);
    }
    *current = new_value;
}

/// Infer the JSON type of a command-line value
pub fn infer_value(val: &str) -> JsonValue {
    if val == "true" {
        JsonValue::Bool(true)
    } else if val == "false" {
        JsonValue::Bool(false)
    } else if val == "null" {
        JsonValue::Null
    } else if let Ok(num) = val.parse::<i64>() {
        JsonValue::Number(num.into())
    } else if let Some(num) = val.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        JsonValue::Number(num)
    } else if val.starts_with('[') || val.starts_with('{') {
        serde_json::from_str(val).unwrap_or_else(|_| JsonValue::String(val.to_string()))
    } else {
        JsonValue::String(val.to_string())
    }
}

/// Parse `key=value` arguments into nested values
///
/// Keys may be dotted paths; values are type-inferred.
pub fn parse_key_values<S: AsRef<str>>(args: &[S]) -> Result<Values> {
    let mut values = Values::new();

    for arg in args {
        let arg = arg.as_ref();
        let (key, val) = arg
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| CoreError::InvalidParameter {
                arg: arg.to_string(),
            })?;

        values.set(key, infer_value(val))?;
    }

    Ok(values)
}

/// Parse `key=value` selectors into string pairs (label filters)
pub fn parse_selectors<S: AsRef<str>>(args: &[S]) -> Result<Vec<(String, String)>> {
    args.iter()
        .map(|arg| {
            let arg = arg.as_ref();
            arg.split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| CoreError::InvalidParameter {
                    arg: arg.to_string(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_overlays_nested_keys() {
        let mut base = Values(json!({"image": {"repository": "nginx", "tag": "1.0"}, "replicas": 1}));
        let overlay = Values(json!({"image": {"tag": "2.0", "pullPolicy": "Always"}, "replicas": 3}));

        base.merge(&overlay);

        assert_eq!(
            base.0,
            json!({"image": {"repository": "nginx", "tag": "2.0", "pullPolicy": "Always"}, "replicas": 3})
        );
    }

    #[test]
    fn test_merge_patch_removes_nulls() {
        let mut base = json!({"image": "nginx", "env": {"A": "1", "B": "2"}, "ports": [80]});
        merge_patch(&mut base, &json!({"env": {"A": null, "C": "3"}, "ports": [8080]}));
        assert_eq!(base, json!({"image": "nginx", "env": {"B": "2", "C": "3"}, "ports": [8080]}));

        let mut scalar = json!("x");
        merge_patch(&mut scalar, &json!({"a": 1}));
        assert_eq!(scalar, json!({"a": 1}));
    }

    #[test]
    fn test_set_dotted_key() {
        let mut values = Values(json!({"image": "flat"}));
        values.set("image.tag", json!("v1")).unwrap();
        values.set("replicas", json!(3)).unwrap();

        assert_eq!(values.0, json!({"image": {"tag": "v1"}, "replicas": 3}));
        assert!(values.set("image..tag", JsonValue::Null).is_err());
    }

    #[test]
    fn test_parse_key_values() {
        let args = ["image.tag=v2", "replicas=5", "debug=true", "ratio=0.5", "name=demo"];

        let values = parse_key_values(&args).unwrap();

        assert_eq!(
            values.0,
            json!({"image": {"tag": "v2"}, "replicas": 5, "debug": true, "ratio": 0.5, "name": "demo"})
        );
    }

    #[test]
    fn test_parse_key_values_json() {
        let values = parse_key_values(&["clusters=[\"local\",\"prod\"]"]).unwrap();
        assert_eq!(values.0["clusters"], json!(["local", "prod"]));
    }

    #[test]
    fn test_parse_key_values_invalid() {
        let err = parse_key_values(&["replicas"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter format should be foo=bar, replicas not match"
        );
        assert!(parse_key_values(&["=3"]).is_err());
    }

    #[test]
    fn test_parse_selectors() {
        let pairs = parse_selectors(&["app=web", "tier="]).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("app".to_string(), "web".to_string()),
                ("tier".to_string(), String::new())
            ]
        );
        assert!(parse_selectors(&["oops"]).is_err());
    }
}
