//! Standalone Policy and Workflow objects
//!
//! Both live next to an Application rather than inside it and are merged in
//! by the assembler.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::application::{AppPolicy, WorkflowMode, WorkflowStep};

pub const POLICY_API_VERSION: &str = "core.oam.dev/v1alpha1";
pub const POLICY_KIND: &str = "Policy";
pub const WORKFLOW_API_VERSION: &str = "core.oam.dev/v1alpha1";
pub const WORKFLOW_KIND: &str = "Workflow";

/// A typed policy supplied outside of an Application
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(rename = "type")]
    pub policy_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<JsonValue>,
}

impl Policy {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("")
    }

    /// Embedded form used in `spec.policies`
    pub fn to_app_policy(&self) -> AppPolicy {
        AppPolicy {
            name: self.name().to_string(),
            policy_type: self.policy_type.clone(),
            properties: self.properties.clone(),
        }
    }

    /// Serialize with type metadata
    pub fn to_document(&self) -> serde_json::Result<JsonValue> {
        with_type_meta(self, POLICY_API_VERSION, POLICY_KIND)
    }
}

/// Ordered workflow steps supplied outside of an Application
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub steps: Vec<WorkflowStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<WorkflowMode>,
}

impl Workflow {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("")
    }

    /// Serialize with type metadata
    pub fn to_document(&self) -> serde_json::Result<JsonValue> {
        with_type_meta(self, WORKFLOW_API_VERSION, WORKFLOW_KIND)
    }
}

fn with_type_meta<T: Serialize>(obj: &T, api_version: &str, kind: &str) -> serde_json::Result<JsonValue> {
    let mut value = serde_json::to_value(obj)?;
    if let JsonValue::Object(map) = &mut value {
        map.insert("apiVersion".to_string(), JsonValue::String(api_version.to_string()));
        map.insert("kind".to_string(), JsonValue::String(kind.to_string()));
    }
    Ok(value)
}
