//! Addon rendering
//!
//! Addon files are MiniJinja templates with `[[ ]]` expressions, `[% %]`
//! blocks and `[# #]` comments so that they stay valid YAML around `{}`.
//! Arguments are exposed as `args` (and `parameter`), the metadata as `addon`.

use minijinja::syntax::SyntaxConfig;
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use vela_core::addon::addon_app_name;
use vela_core::{AddonFile, AddonPackage, Application, ApplicationComponent, Values, oam};

use crate::error::{EngineError, Result, TemplateError};

/// Component type wrapping raw Kubernetes objects
pub const K8S_OBJECTS_COMPONENT: &str = "k8s-objects";

/// Renders addon packages into their Application
pub struct AddonRenderer {
    env: Environment<'static>,
}

impl AddonRenderer {
    pub fn new() -> Result<Self> {
        let syntax = SyntaxConfig::builder()
            .block_delimiters("[%", "%]")
            .variable_delimiters("[[", "]]")
            .comment_delimiters("[#", "#]")
            .build()
            .map_err(|e| EngineError::Template(TemplateError::from_minijinja(e, "<syntax>", "")))?;

        let mut env = Environment::new();
        env.set_syntax(syntax);
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        env.add_filter("toyaml", toyaml);
        env.add_filter("tojson", tojson);

        Ok(Self { env })
    }

    /// Render one addon file
    pub fn render_file(&self, file: &AddonFile, package: &AddonPackage, args: &Values) -> Result<String> {
        let to_error = |e: Error| EngineError::Template(TemplateError::from_minijinja(e, &file.path, &file.content));

        let ctx = minijinja::context! {
            args => args.inner(),
            parameter => args.inner(),
            addon => &package.meta,
        };
        self.env
            .render_named_str(&file.path, &file.content, ctx)
            .map_err(to_error)
    }

    /// Render the addon Application with `args`
    pub fn render(&self, package: &AddonPackage, args: &Values) -> Result<Application> {
        let name = &package.meta.name;

        let mut app: Application = match &package.template {
            Some(file) => {
                let rendered = self.render_file(file, package, args)?;
                serde_yaml::from_str(&rendered)?
            }
            None => serde_json::from_value(json!({
                "apiVersion": "core.oam.dev/v1beta1",
                "kind": "Application",
                "metadata": {},
                "spec": {"components": []}
            }))?,
        };

        for resource in &package.resources {
            let rendered = self.render_file(resource, package, args)?;
            let mut objects = Vec::new();
            for de in serde_yaml::Deserializer::from_str(&rendered) {
                let object = JsonValue::deserialize(de)?;
                if !object.is_null() {
                    objects.push(object);
                }
            }
            if objects.is_empty() {
                continue;
            }
            app.spec.components.push(ApplicationComponent {
                name: component_name(&resource.path),
                component_type: K8S_OBJECTS_COMPONENT.to_string(),
                properties: Some(json!({ "objects": objects })),
                ..Default::default()
            });
        }

        let app_name = addon_app_name(name);
        if app.metadata.name.as_deref().is_some_and(|n| !n.is_empty() && n != app_name) {
            tracing::warn!(addon = %name, "application name in template is overwritten with {}", app_name);
        }
        app.metadata.name = Some(app_name);
        app.metadata.namespace = Some(oam::SYSTEM_NAMESPACE.to_string());

        let labels = app.metadata.labels.get_or_insert_with(Default::default);
        labels.insert(oam::LABEL_ADDON_NAME.to_string(), name.clone());
        labels.insert(oam::LABEL_ADDON_REGISTRY.to_string(), package.registry.clone());
        app.set_annotation(oam::ANNOTATION_ADDON_VERSION, package.meta.version.clone());

        Ok(app)
    }
}

/// Component name derived from a resource file path
fn component_name(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = file
        .strip_suffix(".yaml")
        .or_else(|| file.strip_suffix(".yml"))
        .or_else(|| file.strip_suffix(".json"))
        .unwrap_or(file);
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

fn toyaml(value: Value) -> std::result::Result<String, Error> {
    let json_value: JsonValue =
        serde_json::to_value(&value).map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
    let yaml =
        serde_yaml::to_string(&json_value).map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
    Ok(yaml.trim_start_matches("---\n").trim_end().to_string())
}

fn tojson(value: Value) -> std::result::Result<String, Error> {
    serde_json::to_string(&value).map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::AddonMeta;
    use vela_core::parse_key_values;

    fn package(template: Option<&str>, resources: &[(&str, &str)]) -> AddonPackage {
        AddonPackage {
            meta: AddonMeta {
                name: "fluxcd".to_string(),
                version: "2.3.0".to_string(),
                ..Default::default()
            },
            registry: "KubeVela".to_string(),
            template: template.map(|t| AddonFile {
                path: "template.yaml".to_string(),
                content: t.to_string(),
            }),
            resources: resources
                .iter()
                .map(|(path, content)| AddonFile {
                    path: path.to_string(),
                    content: content.to_string(),
                })
                .collect(),
        }
    }

    const TEMPLATE: &str = r#"
apiVersion: core.oam.dev/v1beta1
kind: Application
metadata:
  name: whatever
spec:
  components:
    - name: controller
      type: webservice
      properties:
        image: "fluxcd/controller:[[ addon.version ]]"
        replicas: [[ args.replicas | default(1) ]]
[% if args.ha %]
  policies:
    - name: ha
      type: topology
      properties:
        clusters: [[ args.clusters | tojson ]]
[% endif %]
"#;

    #[test]
    fn test_render_template_with_args() {
        let renderer = AddonRenderer::new().unwrap();
        let args = parse_key_values(&["replicas=3", "ha=true", r#"clusters=["local"]"#]).unwrap();
        let app = renderer.render(&package(Some(TEMPLATE), &[]), &args).unwrap();

        assert_eq!(app.metadata.name.as_deref(), Some("addon-fluxcd"));
        assert_eq!(app.metadata.namespace.as_deref(), Some("vela-system"));
        let labels = app.metadata.labels.as_ref().unwrap();
        assert_eq!(labels[oam::LABEL_ADDON_NAME], "fluxcd");
        assert_eq!(labels[oam::LABEL_ADDON_REGISTRY], "KubeVela");
        assert_eq!(
            app.metadata.annotations.as_ref().unwrap()[oam::ANNOTATION_ADDON_VERSION],
            "2.3.0"
        );

        let props = app.spec.components[0].properties.as_ref().unwrap();
        assert_eq!(props["image"], "fluxcd/controller:2.3.0");
        assert_eq!(props["replicas"], 3);
        assert_eq!(app.spec.policies[0].properties.as_ref().unwrap()["clusters"], json!(["local"]));
    }

    #[test]
    fn test_defaults_without_args() {
        let renderer = AddonRenderer::new().unwrap();
        let app = renderer.render(&package(Some(TEMPLATE), &[]), &Values::new()).unwrap();
        assert_eq!(app.spec.components[0].properties.as_ref().unwrap()["replicas"], 1);
        assert!(app.spec.policies.is_empty());
    }

    #[test]
    fn test_resources_become_components() {
        let renderer = AddonRenderer::new().unwrap();
        let resources = [
            (
                "resources/crds.yaml",
                "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: flux-system\n---\napiVersion: v1\nkind: ServiceAccount\nmetadata:\n  name: flux\n",
            ),
            ("resources/Empty_File.yaml", "---\n"),
        ];
        let app = renderer.render(&package(None, &resources), &Values::new()).unwrap();

        assert_eq!(app.spec.components.len(), 1);
        let component = &app.spec.components[0];
        assert_eq!(component.name, "crds");
        assert_eq!(component.component_type, K8S_OBJECTS_COMPONENT);
        assert_eq!(
            component.properties.as_ref().unwrap()["objects"][1]["kind"],
            "ServiceAccount"
        );
    }

    #[test]
    fn test_component_name() {
        assert_eq!(component_name("resources/Flux_CRDs.yaml"), "flux-crds");
        assert_eq!(component_name("deploy.yml"), "deploy");
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let renderer = AddonRenderer::new().unwrap();
        let err = renderer
            .render(&package(Some("name: [[ args.x "), &[]), &Values::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Template(_)));

        let err = renderer
            .render(&package(Some("name: [[ args.x.y.z ]]"), &[]), &Values::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Template(_)));
    }
}
