//! Live-diff: compare a locally rendered application with the deployed one
//!
//! Both sides are turned into a manifest tree (application, components,
//! traits, policies, workflow). Nodes are matched by kind and name and
//! carry the kind of change found.

use std::fmt;
use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use similar::{ChangeTag, TextDiff};
use vela_core::{Application, oam};

use crate::error::Result;
use crate::render::RenderedApplication;

/// Kind of change on a manifest node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiffType {
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "MODIFY")]
    Modify,
    #[serde(rename = "REMOVE")]
    Remove,
    #[serde(rename = "")]
    NoChange,
}

impl DiffType {
    fn describe(&self) -> &'static str {
        match self {
            DiffType::Add => "has been added(+)",
            DiffType::Modify => "has been modified(*)",
            DiffType::Remove => "has been removed(-)",
            DiffType::NoChange => "has no change",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ManifestKind {
    Application,
    Component,
    Trait,
    Policy,
    Workflow,
    ReferredObject,
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManifestKind::Application => "Application",
            ManifestKind::Component => "Component",
            ManifestKind::Trait => "Trait",
            ManifestKind::Policy => "Policy",
            ManifestKind::Workflow => "Workflow",
            ManifestKind::ReferredObject => "ReferredObject",
        };
        f.write_str(s)
    }
}

/// A node in the manifest tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestNode {
    pub kind: ManifestKind,
    pub name: String,
    /// YAML of the node on the compared side (the base side for removals)
    pub content: String,
    /// YAML of the base side when the node was modified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    pub diff_type: DiffType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subs: Vec<ManifestNode>,
}

impl ManifestNode {
    fn new(kind: ManifestKind, name: impl Into<String>, content: String) -> Self {
        Self {
            kind,
            name: name.into(),
            content,
            previous: None,
            diff_type: DiffType::NoChange,
            subs: Vec::new(),
        }
    }

    /// Whether this node or any descendant changed
    pub fn has_changes(&self) -> bool {
        self.diff_type != DiffType::NoChange || self.subs.iter().any(ManifestNode::has_changes)
    }

    fn mark(mut self, diff_type: DiffType) -> Self {
        self.diff_type = diff_type;
        self.subs = self.subs.into_iter().map(|s| s.mark(diff_type)).collect();
        self
    }
}

/// Build the manifest tree of an application and its rendering
pub fn build_manifest(app: &Application, rendered: &RenderedApplication) -> Result<ManifestNode> {
    let mut app_value = serde_json::to_value(app)?;
    if let Some(spec) = app_value.get_mut("spec").and_then(JsonValue::as_object_mut) {
        spec.remove("workflow");
    }
    let name = app.metadata.name.clone().unwrap_or_default();
    let mut root = ManifestNode::new(ManifestKind::Application, name, to_yaml(&clean_object(&app_value))?);

    for component in &rendered.components {
        let mut node = ManifestNode::new(
            ManifestKind::Component,
            component.name.clone(),
            to_yaml(&clean_object(&component.workload))?,
        );
        for manifest in &component.traits {
            node.subs.push(ManifestNode::new(
                ManifestKind::Trait,
                format!("{}/{}", manifest.trait_type, manifest.resource),
                to_yaml(&clean_object(&manifest.object))?,
            ));
        }
        root.subs.push(node);
    }

    for policy in &app.spec.policies {
        let mut node = ManifestNode::new(
            ManifestKind::Policy,
            policy.name.clone(),
            to_yaml(&serde_json::to_value(policy)?)?,
        );
        if let Some(manifest) = rendered.policies.iter().find(|p| p.name == policy.name) {
            for object in &manifest.objects {
                node.subs.push(ManifestNode::new(
                    ManifestKind::ReferredObject,
                    referred_name(object),
                    to_yaml(&clean_object(object))?,
                ));
            }
        }
        root.subs.push(node);
    }

    if let Some(workflow) = &app.spec.workflow {
        root.subs.push(ManifestNode::new(
            ManifestKind::Workflow,
            root.name.clone(),
            to_yaml(&serde_json::to_value(workflow)?)?,
        ));
    }

    Ok(root)
}

/// Compare two trees; the result follows `compare` with removed nodes appended
pub fn diff_manifests(base: &ManifestNode, compare: &ManifestNode) -> ManifestNode {
    let mut result = ManifestNode::new(compare.kind, compare.name.clone(), compare.content.clone());

    for sub in &compare.subs {
        let matched = base
            .subs
            .iter()
            .find(|b| b.kind == sub.kind && b.name == sub.name);
        result.subs.push(match matched {
            Some(base_sub) => diff_manifests(base_sub, sub),
            None => sub.clone().mark(DiffType::Add),
        });
    }
    for sub in &base.subs {
        if !compare.subs.iter().any(|c| c.kind == sub.kind && c.name == sub.name) {
            result.subs.push(sub.clone().mark(DiffType::Remove));
        }
    }

    if base.content != compare.content {
        result.previous = Some(base.content.clone());
        result.diff_type = DiffType::Modify;
    } else if result.subs.iter().any(ManifestNode::has_changes) {
        result.diff_type = DiffType::Modify;
    }

    result
}

/// Keep what matters for a comparison
///
/// Status is dropped, metadata is reduced to name, namespace, labels and
/// annotations, and revision bookkeeping is removed.
pub fn clean_object(value: &JsonValue) -> JsonValue {
    let Some(map) = value.as_object() else {
        return value.clone();
    };

    let mut out = Map::new();
    for (key, field) in map {
        match key.as_str() {
            "status" => {}
            "metadata" => {
                out.insert(key.clone(), clean_metadata(field));
            }
            _ => {
                out.insert(key.clone(), field.clone());
            }
        }
    }
    JsonValue::Object(out)
}

fn clean_metadata(metadata: &JsonValue) -> JsonValue {
    let mut out = Map::new();
    for key in ["name", "namespace", "labels", "annotations"] {
        if let Some(field) = metadata.get(key) {
            out.insert(key.to_string(), field.clone());
        }
    }

    let strip = |out: &mut Map<String, JsonValue>, key: &str, remove: &[&str]| {
        if let Some(JsonValue::Object(entries)) = out.get_mut(key) {
            for r in remove {
                entries.remove(*r);
            }
            if entries.is_empty() {
                out.remove(key);
            }
        }
    };
    strip(&mut out, "labels", &[oam::LABEL_APP_REVISION]);
    strip(
        &mut out,
        "annotations",
        &[
            oam::ANNOTATION_KUBEVELA_VERSION,
            oam::ANNOTATION_APP_REVISION,
            oam::ANNOTATION_LAST_APPLIED,
        ],
    );

    JsonValue::Object(out)
}

fn referred_name(object: &JsonValue) -> String {
    let kind = object.get("kind").and_then(JsonValue::as_str).unwrap_or("");
    let name = object
        .pointer("/metadata/name")
        .and_then(JsonValue::as_str)
        .unwrap_or("");
    format!("{} {}", kind, name).trim().to_string()
}

fn to_yaml(value: &JsonValue) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

/// Prints a diffed manifest tree
pub struct DiffPrinter {
    /// Unchanged lines shown around each change
    pub context_lines: usize,
}

impl Default for DiffPrinter {
    fn default() -> Self {
        Self { context_lines: 3 }
    }
}

impl DiffPrinter {
    pub fn new(context_lines: usize) -> Self {
        Self { context_lines }
    }

    pub fn print<W: Write>(&self, node: &ManifestNode, out: &mut W) -> Result<()> {
        self.print_node(node, out, 1)
    }

    fn print_node<W: Write>(&self, node: &ManifestNode, out: &mut W, depth: usize) -> Result<()> {
        write!(
            out,
            "---\n{} {} ({}) {}\n---\n",
            "#".repeat(depth),
            node.kind,
            node.name,
            node.diff_type.describe()
        )?;

        match (node.diff_type, &node.previous) {
            (DiffType::Add, _) => write_prefixed(out, "+ ", &node.content)?,
            (DiffType::Remove, _) => write_prefixed(out, "- ", &node.content)?,
            (DiffType::Modify, Some(previous)) => self.write_changes(out, previous, &node.content)?,
            _ => {}
        }
        out.write_all(b"\n")?;

        for sub in &node.subs {
            self.print_node(sub, out, depth + 1)?;
        }
        Ok(())
    }

    fn write_changes<W: Write>(&self, out: &mut W, old: &str, new: &str) -> Result<()> {
        let diff = TextDiff::from_lines(old, new);
        for (index, group) in diff.grouped_ops(self.context_lines).iter().enumerate() {
            if index > 0 {
                out.write_all(b"...\n")?;
            }
            for op in group {
                for change in diff.iter_changes(op) {
                    let sign = match change.tag() {
                        ChangeTag::Delete => "- ",
                        ChangeTag::Insert => "+ ",
                        ChangeTag::Equal => "  ",
                    };
                    writeln!(out, "{}{}", sign, change.value().trim_end())?;
                }
            }
        }
        Ok(())
    }
}

fn write_prefixed<W: Write>(out: &mut W, prefix: &str, content: &str) -> Result<()> {
    for line in content.lines() {
        writeln!(out, "{}{}", prefix, line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::{FakeCue, app, catalog};
    use crate::render::Renderer;
    use serde_json::json;

    const LIVE: &str = r#"
apiVersion: core.oam.dev/v1beta1
kind: Application
metadata:
  name: demo
  namespace: default
  annotations:
    oam.dev/kubevela-version: v1.9.0
    app.oam.dev/appRevision: demo-v3
spec:
  components:
    - name: backend
      type: worker
      properties:
        image: nginx:1.24
      traits:
        - type: expose
          properties:
            port: 80
    - name: legacy
      type: worker
      properties:
        image: busybox
status:
  status: running
"#;

    const LOCAL: &str = r#"
apiVersion: core.oam.dev/v1beta1
kind: Application
metadata:
  name: demo
  namespace: default
spec:
  components:
    - name: backend
      type: worker
      properties:
        image: nginx:1.25
      traits:
        - type: expose
          properties:
            port: 80
    - name: cache
      type: worker
      properties:
        image: redis
"#;

    fn tree(yaml: &str) -> ManifestNode {
        let catalog = catalog();
        let cue = FakeCue::default();
        let application = app(yaml);
        let rendered = Renderer::new(&catalog, &cue).render(&application).unwrap();
        build_manifest(&application, &rendered).unwrap()
    }

    #[test]
    fn test_clean_object() {
        let object = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "web",
                "uid": "1234",
                "resourceVersion": "42",
                "labels": {"app.oam.dev/appRevision": "web-v1", "app": "web"},
                "annotations": {"kubectl.kubernetes.io/last-applied-configuration": "{}"}
            },
            "spec": {"replicas": 1},
            "status": {"readyReplicas": 1}
        });
        assert_eq!(
            clean_object(&object),
            json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": "web", "labels": {"app": "web"}},
                "spec": {"replicas": 1}
            })
        );
    }

    #[test]
    fn test_build_manifest_tree() {
        let root = tree(LOCAL);
        assert_eq!(root.kind, ManifestKind::Application);
        assert_eq!(root.name, "demo");
        assert_eq!(root.subs.len(), 2);
        assert_eq!(root.subs[0].subs[0].name, "expose/service");
        assert!(!root.content.contains("appRevision"));
    }

    #[test]
    fn test_diff_detects_add_modify_remove() {
        let result = diff_manifests(&tree(LIVE), &tree(LOCAL));
        assert_eq!(result.diff_type, DiffType::Modify);

        let find = |name: &str| result.subs.iter().find(|s| s.name == name).unwrap();
        assert_eq!(find("backend").diff_type, DiffType::Modify);
        assert_eq!(find("backend").subs[0].diff_type, DiffType::NoChange);
        assert_eq!(find("cache").diff_type, DiffType::Add);
        assert_eq!(find("legacy").diff_type, DiffType::Remove);
        assert_eq!(find("legacy").subs.len(), 0);
    }

    #[test]
    fn test_identical_trees() {
        let result = diff_manifests(&tree(LOCAL), &tree(LOCAL));
        assert!(!result.has_changes());
    }

    #[test]
    fn test_print_diff() {
        let result = diff_manifests(&tree(LIVE), &tree(LOCAL));
        let mut out = Vec::new();
        DiffPrinter::new(1).print(&result, &mut out).unwrap();
        let output = String::from_utf8(out).unwrap();

        assert!(output.starts_with("---\n# Application (demo) has been modified(*)\n---\n"));
        assert!(output.contains("## Component (backend) has been modified(*)"));
        assert!(output.lines().any(|l| l.starts_with("- ") && l.ends_with("image: nginx:1.24")));
        assert!(output.lines().any(|l| l.starts_with("+ ") && l.ends_with("image: nginx:1.25")));
        assert!(output.contains("### Trait (expose/service) has no change"));
        assert!(output.contains("## Component (cache) has been added(+)"));
        assert!(output.contains("## Component (legacy) has been removed(-)"));
    }
}
