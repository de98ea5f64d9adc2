//! Adopting existing workloads into an Application
//!
//! Each workload is pruned down to its identity and desired state and wrapped
//! in its own `k8s-objects` component.

use kube::Api;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use serde_json::{Map, Value as JsonValue, json};
use vela_core::{Application, ApplicationComponent, ApplicationSpec, oam};
use vela_engine::K8S_OBJECTS_COMPONENT;

use crate::error::{KubeError, Result};

/// Resource type adopted when a reference has no `type/` prefix
pub const DEFAULT_TYPE: &str = "deployment";

/// A workload to adopt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRef {
    pub resource_type: String,
    pub name: String,
}

impl WorkloadRef {
    /// Parse `type/name` or `name` (of `default_type`)
    pub fn parse(reference: &str, default_type: &str) -> Result<Self> {
        let (resource_type, name) = match reference.split_once('/') {
            Some((t, n)) => (t, n),
            None => (default_type, reference),
        };
        if name.is_empty() || resource_type.is_empty() {
            return Err(KubeError::InvalidConfig(format!(
                "invalid resource reference {:?}, expected <type>/<name>",
                reference
            )));
        }
        Ok(Self {
            resource_type: resource_type.to_lowercase(),
            name: name.to_string(),
        })
    }

    /// Group, version and kind of the referenced type
    pub fn gvk(&self) -> Result<GroupVersionKind> {
        let (group, version, kind) = match self.resource_type.as_str() {
            "deployment" | "deployments" | "deploy" => ("apps", "v1", "Deployment"),
            "statefulset" | "statefulsets" | "sts" => ("apps", "v1", "StatefulSet"),
            "daemonset" | "daemonsets" | "ds" => ("apps", "v1", "DaemonSet"),
            "job" | "jobs" => ("batch", "v1", "Job"),
            "cronjob" | "cronjobs" | "cj" => ("batch", "v1", "CronJob"),
            "service" | "services" | "svc" => ("", "v1", "Service"),
            "configmap" | "configmaps" | "cm" => ("", "v1", "ConfigMap"),
            "secret" | "secrets" => ("", "v1", "Secret"),
            "ingress" | "ingresses" | "ing" => ("networking.k8s.io", "v1", "Ingress"),
            other => {
                return Err(KubeError::InvalidConfig(format!("unsupported resource type {}", other)));
            }
        };
        Ok(GroupVersionKind::gvk(group, version, kind))
    }
}

/// Application owning an object, from its `app.oam.dev/name` label
pub fn managing_app(object: &JsonValue) -> Option<&str> {
    object
        .pointer("/metadata/labels")
        .and_then(|l| l.get(oam::LABEL_APP_NAME))
        .and_then(JsonValue::as_str)
}

/// Strip status and server-populated metadata from an object
pub fn prune(object: &JsonValue) -> JsonValue {
    let mut pruned = Map::new();
    let Some(fields) = object.as_object() else {
        return object.clone();
    };
    for (key, value) in fields {
        match key.as_str() {
            "status" => {}
            "metadata" => {
                let mut metadata = Map::new();
                for field in ["name", "namespace", "labels"] {
                    if let Some(v) = value.get(field) {
                        metadata.insert(field.to_string(), v.clone());
                    }
                }
                pruned.insert(key.clone(), JsonValue::Object(metadata));
            }
            _ => {
                pruned.insert(key.clone(), value.clone());
            }
        }
    }
    JsonValue::Object(pruned)
}

/// Default application name for adopted workloads
pub fn default_app_name(refs: &[WorkloadRef]) -> String {
    match refs.first() {
        Some(first) => format!("{}-adopted", first.name),
        None => "adopted".to_string(),
    }
}

/// Build the adopting application from pruned objects
pub fn build_application(app_name: &str, namespace: &str, objects: &[JsonValue]) -> Application {
    let mut app = Application::new(app_name, ApplicationSpec::default());
    app.metadata.namespace = Some(namespace.to_string());
    for object in objects {
        let name = object
            .pointer("/metadata/name")
            .and_then(JsonValue::as_str)
            .unwrap_or(app_name);
        let component_name = match app.component(name) {
            None => name.to_string(),
            Some(_) => {
                let kind = object.get("kind").and_then(JsonValue::as_str).unwrap_or("object");
                format!("{}-{}", name, kind.to_lowercase())
            }
        };
        app.spec.components.push(ApplicationComponent {
            name: component_name,
            component_type: K8S_OBJECTS_COMPONENT.to_string(),
            properties: Some(json!({ "objects": [object] })),
            ..Default::default()
        });
    }
    app
}

/// Read workloads and check none of them already belongs to an application
pub async fn fetch_workloads(client: &kube::Client, namespace: &str, refs: &[WorkloadRef]) -> Result<Vec<JsonValue>> {
    let mut objects = Vec::with_capacity(refs.len());
    for reference in refs {
        let gvk = reference.gvk()?;
        let resource = ApiResource::from_gvk(&gvk);
        let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, &resource);
        tracing::debug!(kind = %gvk.kind, name = %reference.name, %namespace, "reading workload");
        let object = serde_json::to_value(api.get(&reference.name).await?)?;

        if let Some(app) = managing_app(&object) {
            return Err(KubeError::AlreadyManaged {
                kind: gvk.kind.clone(),
                name: reference.name.clone(),
                app: app.to_string(),
            });
        }
        objects.push(prune(&object));
    }
    Ok(objects)
}
