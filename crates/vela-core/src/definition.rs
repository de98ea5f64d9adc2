//! Capability definitions: components, traits, policies and workflow steps
//!
//! Each definition carries a schematic telling the renderer how to turn
//! properties into cluster resources: a CUE template or a plain Kubernetes
//! object with parameters bound to field paths.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::document::InputDocument;
use crate::error::{CoreError, Result};
use crate::oam;

#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "core.oam.dev",
    version = "v1beta1",
    kind = "ComponentDefinition",
    namespaced,
    shortname = "comp",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDefinitionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<WorkloadTypeDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schematic: Option<Schematic>,
}

#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "core.oam.dev",
    version = "v1beta1",
    kind = "TraitDefinition",
    namespaced,
    shortname = "trait",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct TraitDefinitionSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to_workloads: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<String>,

    #[serde(default)]
    pub pod_disruptive: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schematic: Option<Schematic>,
}

#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "core.oam.dev",
    version = "v1beta1",
    kind = "PolicyDefinition",
    namespaced,
    shortname = "def-policy",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinitionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schematic: Option<Schematic>,
}

#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "core.oam.dev",
    version = "v1beta1",
    kind = "WorkflowStepDefinition",
    namespaced,
    shortname = "workflowstep",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStepDefinitionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schematic: Option<Schematic>,
}

/// Workload produced by a component definition
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadTypeDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<WorkloadGvk>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub workload_type: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadGvk {
    pub api_version: String,
    pub kind: String,
}

/// How a definition renders resources
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Schematic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cue: Option<CueSchematic>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube: Option<KubeSchematic>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CueSchematic {
    pub template: String,
}

/// A literal Kubernetes object with parameters bound to field paths
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct KubeSchematic {
    pub template: JsonValue,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<KubeParameter>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeParameter {
    pub name: String,

    #[serde(default)]
    pub value_type: ParameterValueType,

    #[serde(default)]
    pub field_paths: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterValueType {
    #[default]
    String,
    Number,
    Boolean,
}

impl ParameterValueType {
    /// Whether a JSON value matches this parameter type
    pub fn accepts(&self, value: &JsonValue) -> bool {
        match self {
            ParameterValueType::String => value.is_string(),
            ParameterValueType::Number => value.is_number(),
            ParameterValueType::Boolean => value.is_boolean(),
        }
    }
}

/// The four kinds of capability definitions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefinitionKind {
    Component,
    Trait,
    Policy,
    WorkflowStep,
}

impl DefinitionKind {
    pub const ALL: [DefinitionKind; 4] = [
        DefinitionKind::Component,
        DefinitionKind::Trait,
        DefinitionKind::Policy,
        DefinitionKind::WorkflowStep,
    ];

    /// Kubernetes kind of the definition resource
    pub fn resource_kind(&self) -> &'static str {
        match self {
            DefinitionKind::Component => "ComponentDefinition",
            DefinitionKind::Trait => "TraitDefinition",
            DefinitionKind::Policy => "PolicyDefinition",
            DefinitionKind::WorkflowStep => "WorkflowStepDefinition",
        }
    }

    pub fn from_resource_kind(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.resource_kind() == kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Component => "component",
            DefinitionKind::Trait => "trait",
            DefinitionKind::Policy => "policy",
            DefinitionKind::WorkflowStep => "workflow-step",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A definition of any kind, flattened for lookup and display
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub name: String,
    pub kind: DefinitionKind,
    pub namespace: Option<String>,
    pub description: String,
    pub schematic: Option<Schematic>,
    /// Workload types a trait may be attached to
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload: Option<WorkloadGvk>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl Definition {
    fn from_meta(metadata: &ObjectMeta, kind: DefinitionKind, schematic: Option<Schematic>) -> Self {
        let description = metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(oam::ANNOTATION_DEFINITION_DESCRIPTION))
            .cloned()
            .unwrap_or_default();

        Self {
            name: metadata.name.clone().unwrap_or_default(),
            kind,
            namespace: metadata.namespace.clone(),
            description,
            schematic,
            applies_to: Vec::new(),
            workload: None,
            labels: metadata.labels.clone().unwrap_or_default(),
        }
    }

    /// Decode a definition from a canonical document of any definition kind
    pub fn from_document(doc: &InputDocument) -> Result<Self> {
        let meta = doc.type_meta();
        let kind = match DefinitionKind::from_resource_kind(&meta.kind) {
            Some(kind) if meta.is_oam() => kind,
            _ => {
                return Err(CoreError::InvalidObject {
                    kind: meta.kind.clone(),
                    file: doc.name.clone(),
                    message: "not a definition".to_string(),
                });
            }
        };

        let invalid = |e: serde_json::Error| CoreError::InvalidObject {
            kind: kind.resource_kind().to_string(),
            file: doc.name.clone(),
            message: e.to_string(),
        };

        let content = doc.content.clone();
        Ok(match kind {
            DefinitionKind::Component => {
                ComponentDefinition::deserialize(content).map_err(invalid)?.into()
            }
            DefinitionKind::Trait => TraitDefinition::deserialize(content).map_err(invalid)?.into(),
            DefinitionKind::Policy => PolicyDefinition::deserialize(content).map_err(invalid)?.into(),
            DefinitionKind::WorkflowStep => {
                WorkflowStepDefinition::deserialize(content).map_err(invalid)?.into()
            }
        })
    }

    /// Whether the schematic is a CUE template
    pub fn is_cue(&self) -> bool {
        self.schematic.as_ref().is_some_and(|s| s.cue.is_some())
    }
}

impl From<ComponentDefinition> for Definition {
    fn from(def: ComponentDefinition) -> Self {
        let mut out = Definition::from_meta(&def.metadata, DefinitionKind::Component, def.spec.schematic);
        out.workload = def.spec.workload.and_then(|w| w.definition);
        out
    }
}

impl From<TraitDefinition> for Definition {
    fn from(def: TraitDefinition) -> Self {
        let mut out = Definition::from_meta(&def.metadata, DefinitionKind::Trait, def.spec.schematic);
        out.applies_to = def.spec.applies_to_workloads;
        out
    }
}

impl From<PolicyDefinition> for Definition {
    fn from(def: PolicyDefinition) -> Self {
        Definition::from_meta(&def.metadata, DefinitionKind::Policy, def.spec.schematic)
    }
}

impl From<WorkflowStepDefinition> for Definition {
    fn from(def: WorkflowStepDefinition) -> Self {
        Definition::from_meta(&def.metadata, DefinitionKind::WorkflowStep, def.spec.schematic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kube_schematic_definition() {
        let yaml = r#"
apiVersion: core.oam.dev/v1beta1
kind: ComponentDefinition
metadata:
  name: kube-worker
  namespace: vela-system
  annotations:
    definition.oam.dev/description: Long-running worker
spec:
  workload:
    definition:
      apiVersion: apps/v1
      kind: Deployment
  schematic:
    kube:
      template:
        apiVersion: apps/v1
        kind: Deployment
        spec:
          template:
            spec:
              containers:
                - name: main
                  image: busybox
      parameters:
        - name: image
          required: true
          fieldPaths:
            - spec.template.spec.containers[0].image
        - name: replicas
          valueType: number
          fieldPaths:
            - spec.replicas
"#;
        let doc = InputDocument::from_yaml("def.yaml", yaml.as_bytes()).unwrap();
        let def = Definition::from_document(&doc).unwrap();

        assert_eq!(def.name, "kube-worker");
        assert_eq!(def.kind, DefinitionKind::Component);
        assert_eq!(def.description, "Long-running worker");
        assert_eq!(def.workload.as_ref().unwrap().kind, "Deployment");
        assert!(!def.is_cue());

        let kube = def.schematic.unwrap().kube.unwrap();
        assert_eq!(kube.parameters.len(), 2);
        assert_eq!(kube.parameters[0].value_type, ParameterValueType::String);
        assert_eq!(kube.parameters[1].value_type, ParameterValueType::Number);
        assert_eq!(kube.parameters[0].required, Some(true));
    }

    #[test]
    fn test_cue_trait_definition() {
        let yaml = r#"
apiVersion: core.oam.dev/v1beta1
kind: TraitDefinition
metadata:
  name: scaler
spec:
  appliesToWorkloads: ["deployments.apps"]
  schematic:
    cue:
      template: |
        patch: spec: replicas: parameter.replicas
        parameter: replicas: *1 | int
"#;
        let doc = InputDocument::from_yaml("scaler.yaml", yaml.as_bytes()).unwrap();
        let def = Definition::from_document(&doc).unwrap();
        assert_eq!(def.kind, DefinitionKind::Trait);
        assert_eq!(def.applies_to, vec!["deployments.apps"]);
        assert!(def.is_cue());
    }

    #[test]
    fn test_not_a_definition() {
        let doc = InputDocument::from_yaml("cm.yaml", b"apiVersion: v1\nkind: ConfigMap\n").unwrap();
        assert!(Definition::from_document(&doc).is_err());
    }

    #[test]
    fn test_definition_kind_names() {
        for kind in DefinitionKind::ALL {
            assert_eq!(DefinitionKind::parse(kind.as_str()), Some(kind));
            assert_eq!(DefinitionKind::from_resource_kind(kind.resource_kind()), Some(kind));
        }
        assert!(ParameterValueType::Boolean.accepts(&JsonValue::Bool(true)));
        assert!(!ParameterValueType::Number.accepts(&JsonValue::String("1".into())));
    }
}
