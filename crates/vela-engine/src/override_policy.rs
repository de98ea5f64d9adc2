//! Override policies: per-environment patches of component properties and traits

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use vela_core::{AppPolicy, ApplicationComponent, ApplicationTrait, merge_patch};

use crate::error::{EngineError, Result};

/// Properties of an `override` policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideSpec {
    #[serde(default)]
    pub components: Vec<ComponentPatch>,

    /// Components kept after patching; all of them when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentPatch {
    /// Anchored pattern on the component name; empty or `*` matches all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<TraitPatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraitPatch {
    #[serde(rename = "type")]
    pub trait_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<JsonValue>,

    #[serde(default)]
    pub disable: bool,
}

impl OverrideSpec {
    /// Decode the properties of an override policy
    pub fn from_policy(policy: &AppPolicy) -> Result<Self> {
        let properties = match &policy.properties {
            None | Some(JsonValue::Null) => {
                return Err(EngineError::EmptyOverridePolicy(policy.name.clone()));
            }
            Some(properties) => properties,
        };

        OverrideSpec::deserialize(properties).map_err(|e| EngineError::InvalidPolicy {
            name: policy.name.clone(),
            policy_type: policy.policy_type.clone(),
            message: e.to_string(),
        })
    }
}

impl ComponentPatch {
    fn matches(&self, component: &ApplicationComponent) -> Result<bool> {
        if let Some(ty) = self.component_type.as_deref().filter(|t| !t.is_empty()) {
            if ty != component.component_type {
                return Ok(false);
            }
        }

        match self.name.as_deref() {
            None | Some("") | Some("*") => Ok(true),
            Some(pattern) => {
                let re = Regex::new(&format!("^{}$", pattern)).map_err(|e| EngineError::InvalidPolicy {
                    name: pattern.to_string(),
                    policy_type: vela_core::oam::OVERRIDE_POLICY.to_string(),
                    message: e.to_string(),
                })?;
                Ok(re.is_match(&component.name))
            }
        }
    }

    fn apply(&self, component: &mut ApplicationComponent) {
        if let Some(patch) = &self.properties {
            let properties = component.properties.get_or_insert(JsonValue::Null);
            merge_patch(properties, patch);
        }

        for trait_patch in &self.traits {
            if trait_patch.disable {
                component.traits.retain(|t| t.trait_type != trait_patch.trait_type);
                continue;
            }
            match component.find_trait_mut(&trait_patch.trait_type) {
                Some(existing) => {
                    if let Some(patch) = &trait_patch.properties {
                        merge_patch(existing.properties.get_or_insert(JsonValue::Null), patch);
                    }
                }
                None => component.traits.push(ApplicationTrait {
                    trait_type: trait_patch.trait_type.clone(),
                    properties: trait_patch.properties.clone(),
                }),
            }
        }
    }
}

/// Apply override policies in order, then their component selectors
pub fn patch_components(
    components: &[ApplicationComponent],
    overrides: &[OverrideSpec],
) -> Result<Vec<ApplicationComponent>> {
    let mut components = components.to_vec();

    for spec in overrides {
        for component in &mut components {
            for patch in &spec.components {
                if patch.matches(component)? {
                    patch.apply(component);
                }
            }
        }

        if let Some(selector) = &spec.selector {
            components.retain(|c| selector.contains(&c.name));
        }
    }

    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn components() -> Vec<ApplicationComponent> {
        serde_json::from_value(json!([
            {
                "name": "web",
                "type": "webservice",
                "properties": {"image": "nginx", "env": {"A": "1"}},
                "traits": [
                    {"type": "scaler", "properties": {"replicas": 1}},
                    {"type": "gateway", "properties": {"domain": "example.com"}}
                ]
            },
            {"name": "worker-a", "type": "worker", "properties": {"image": "busybox"}},
            {"name": "worker-b", "type": "worker", "properties": {"image": "busybox"}}
        ]))
        .unwrap()
    }

    fn policy(properties: JsonValue) -> AppPolicy {
        serde_json::from_value(json!({"name": "ov", "type": "override", "properties": properties})).unwrap()
    }

    #[test]
    fn test_properties_merge_by_name() {
        let spec = OverrideSpec::from_policy(&policy(json!({
            "components": [{"name": "web", "properties": {"image": "nginx:2", "env": {"A": null, "B": "2"}}}]
        })))
        .unwrap();

        let patched = patch_components(&components(), &[spec]).unwrap();
        assert_eq!(
            patched[0].properties,
            Some(json!({"image": "nginx:2", "env": {"B": "2"}}))
        );
        assert_eq!(patched[1].properties, Some(json!({"image": "busybox"})));
    }

    #[test]
    fn test_pattern_and_type_filter() {
        let spec = OverrideSpec::from_policy(&policy(json!({
            "components": [
                {"name": "worker-.*", "properties": {"image": "alpine"}},
                {"type": "webservice", "properties": {"port": 80}}
            ]
        })))
        .unwrap();

        let patched = patch_components(&components(), &[spec]).unwrap();
        assert_eq!(patched[0].properties.as_ref().unwrap()["port"], 80);
        assert_eq!(patched[1].properties.as_ref().unwrap()["image"], "alpine");
        assert_eq!(patched[2].properties.as_ref().unwrap()["image"], "alpine");
        assert!(patched[1].properties.as_ref().unwrap().get("port").is_none());
    }

    #[test]
    fn test_traits_merge_add_and_disable() {
        let spec = OverrideSpec::from_policy(&policy(json!({
            "components": [{
                "name": "web",
                "traits": [
                    {"type": "scaler", "properties": {"replicas": 3}},
                    {"type": "gateway", "disable": true},
                    {"type": "sidecar", "properties": {"image": "envoy"}}
                ]
            }]
        })))
        .unwrap();

        let patched = patch_components(&components(), &[spec]).unwrap();
        let traits: Vec<&str> = patched[0].traits.iter().map(|t| t.trait_type.as_str()).collect();
        assert_eq!(traits, vec!["scaler", "sidecar"]);
        assert_eq!(patched[0].traits[0].properties, Some(json!({"replicas": 3})));
    }

    #[test]
    fn test_selector_keeps_order() {
        let spec = OverrideSpec::from_policy(&policy(json!({
            "selector": ["worker-b", "web"]
        })))
        .unwrap();

        let patched = patch_components(&components(), &[spec]).unwrap();
        let names: Vec<&str> = patched.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["web", "worker-b"]);
    }

    #[test]
    fn test_invalid_override_policies() {
        let err = OverrideSpec::from_policy(&AppPolicy {
            name: "empty".to_string(),
            policy_type: "override".to_string(),
            properties: None,
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "override policy empty must not have empty properties");

        let err = OverrideSpec::from_policy(&policy(json!({"component": []}))).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPolicy { .. }));

        let spec = OverrideSpec::from_policy(&policy(json!({"components": [{"name": "(", "properties": {}}]}))).unwrap();
        assert!(patch_components(&components(), &[spec]).is_err());
    }
}
