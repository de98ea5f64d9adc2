//! Application resource model
//!
//! An Application groups named components (each rendered by a component
//! definition and decorated by traits), the policies attached to them and an
//! optional workflow, either inline or referenced by name.

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::oam;

/// Desired state of an application
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "core.oam.dev",
    version = "v1beta1",
    kind = "Application",
    namespaced,
    status = "ApplicationStatus",
    shortname = "app",
    schema = "disabled",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(default)]
    pub components: Vec<ApplicationComponent>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<AppPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<AppWorkflow>,
}

/// One deployable unit of an application
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationComponent {
    pub name: String,

    #[serde(rename = "type")]
    pub component_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<ApplicationTrait>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_revision: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<JsonValue>,
}

/// Operational behaviour attached to a component
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ApplicationTrait {
    #[serde(rename = "type")]
    pub trait_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<JsonValue>,
}

/// Policy embedded in an application
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AppPolicy {
    pub name: String,

    #[serde(rename = "type")]
    pub policy_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<JsonValue>,
}

/// Workflow slot of an application: a reference to a standalone Workflow or inline steps
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppWorkflow {
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    pub reference: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<WorkflowStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<WorkflowMode>,
}

/// Execution mode of steps and sub-steps (`DAG` or `StepByStep`)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_steps: Option<String>,
}

/// A single workflow step, possibly grouping sub-steps
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub name: String,

    #[serde(rename = "type")]
    pub step_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_steps: Vec<WorkflowStep>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<JsonValue>,
}

/// Observed state reported by the controller
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    /// Phase of the application (`running`, `runningWorkflow`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ComponentStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_revision: Option<RevisionRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowStatus>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    #[serde(default)]
    pub healthy: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<TraitStatus>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TraitStatus {
    #[serde(rename = "type")]
    pub trait_type: String,

    #[serde(default)]
    pub healthy: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRef {
    pub name: String,

    #[serde(default)]
    pub revision: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revision_hash: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_revision: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default)]
    pub suspend: bool,

    #[serde(default)]
    pub terminated: bool,

    #[serde(default)]
    pub finished: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepStatus>,
}

/// Status of one workflow step; sub-steps reuse the same shape
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub step_type: String,

    /// One of the `oam::STEP_*` phases
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phase: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_execute_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execute_time: Option<String>,

    #[serde(rename = "subSteps", default, skip_serializing_if = "Vec::is_empty")]
    pub sub_steps: Vec<StepStatus>,
}

impl WorkflowStatus {
    /// Still executing: neither suspended, terminated nor finished
    pub fn is_running(&self) -> bool {
        !self.suspend && !self.terminated && !self.finished
    }
}

impl Application {
    /// Current phase, empty when the controller has not reported yet
    pub fn phase(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.status.as_deref())
            .unwrap_or("")
    }

    /// Find a component by name
    pub fn component(&self, name: &str) -> Option<&ApplicationComponent> {
        self.spec.components.iter().find(|c| c.name == name)
    }

    /// Find a component by name for modification
    pub fn component_mut(&mut self, name: &str) -> Option<&mut ApplicationComponent> {
        self.spec.components.iter_mut().find(|c| c.name == name)
    }

    /// Publish version annotation, if set
    pub fn publish_version(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(oam::ANNOTATION_PUBLISH_VERSION))
            .map(String::as_str)
    }

    /// Set an annotation, creating the map when needed
    pub fn set_annotation(&mut self, key: &str, value: impl Into<String>) {
        self.metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(key.to_string(), value.into());
    }

    /// Remove an annotation; returns whether it was present
    pub fn remove_annotation(&mut self, key: &str) -> bool {
        self.metadata
            .annotations
            .as_mut()
            .map(|a| a.remove(key).is_some())
            .unwrap_or(false)
    }

    /// Names of components that appear more than once
    pub fn duplicate_components(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for component in &self.spec.components {
            if !seen.insert(component.name.as_str()) && !duplicates.contains(&component.name.as_str())
            {
                duplicates.push(component.name.as_str());
            }
        }
        duplicates
    }
}

impl ApplicationComponent {
    /// Find a trait by type
    pub fn find_trait(&self, trait_type: &str) -> Option<&ApplicationTrait> {
        self.traits.iter().find(|t| t.trait_type == trait_type)
    }

    /// Find a trait by type for modification
    pub fn find_trait_mut(&mut self, trait_type: &str) -> Option<&mut ApplicationTrait> {
        self.traits.iter_mut().find(|t| t.trait_type == trait_type)
    }
}

impl AppWorkflow {
    /// Whether the workflow slot references a standalone Workflow
    pub fn has_reference(&self) -> bool {
        !self.reference.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = r#"
apiVersion: core.oam.dev/v1beta1
kind: Application
metadata:
  name: first-vela-app
  annotations:
    app.oam.dev/publishVersion: alpha
spec:
  components:
    - name: express-server
      type: webservice
      properties:
        image: oamdev/hello-world
        ports:
          - port: 8000
            expose: true
      traits:
        - type: scaler
          properties:
            replicas: 1
  policies:
    - name: target-default
      type: topology
      properties:
        clusters: ["local"]
  workflow:
    steps:
      - name: deploy2default
        type: deploy
        properties:
          policies: ["target-default"]
"#;

    #[test]
    fn test_application_decode() {
        let app: Application = serde_yaml::from_str(APP).unwrap();

        assert_eq!(app.metadata.name.as_deref(), Some("first-vela-app"));
        assert_eq!(app.spec.components.len(), 1);
        let comp = &app.spec.components[0];
        assert_eq!(comp.component_type, "webservice");
        assert_eq!(comp.find_trait("scaler").unwrap().properties.as_ref().unwrap()["replicas"], 1);
        assert_eq!(app.spec.policies[0].policy_type, "topology");
        let workflow = app.spec.workflow.as_ref().unwrap();
        assert!(!workflow.has_reference());
        assert_eq!(workflow.steps[0].step_type, "deploy");
        assert_eq!(app.publish_version(), Some("alpha"));
        assert_eq!(app.phase(), "");
    }

    #[test]
    fn test_workflow_reference_roundtrip() {
        let yaml = r#"
apiVersion: core.oam.dev/v1beta1
kind: Application
metadata:
  name: app
spec:
  components: []
  workflow:
    ref: wf
"#;
        let app: Application = serde_yaml::from_str(yaml).unwrap();
        let workflow = app.spec.workflow.as_ref().unwrap();
        assert_eq!(workflow.reference, "wf");

        let json = serde_json::to_value(&app).unwrap();
        assert_eq!(json["spec"]["workflow"]["ref"], "wf");
        assert_eq!(json["kind"], "Application");
        assert_eq!(json["apiVersion"], "core.oam.dev/v1beta1");
        assert!(json["spec"].get("policies").is_none());
    }

    #[test]
    fn test_annotations() {
        let mut app = Application::new("app", ApplicationSpec::default());
        assert!(app.publish_version().is_none());

        app.set_annotation(oam::ANNOTATION_PUBLISH_VERSION, "v2");
        assert_eq!(app.publish_version(), Some("v2"));

        assert!(app.remove_annotation(oam::ANNOTATION_PUBLISH_VERSION));
        assert!(!app.remove_annotation(oam::ANNOTATION_PUBLISH_VERSION));
    }

    #[test]
    fn test_duplicate_components() {
        let mut app = Application::new("app", ApplicationSpec::default());
        for name in ["a", "b", "a", "a"] {
            app.spec.components.push(ApplicationComponent {
                name: name.to_string(),
                component_type: "webservice".to_string(),
                ..Default::default()
            });
        }
        assert_eq!(app.duplicate_components(), vec!["a"]);
    }
}
