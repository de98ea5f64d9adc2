//! Rendering of an Application into the Kubernetes objects it would produce

use serde_json::{Map, Value as JsonValue, json};
use vela_core::{
    AppPolicy, Application, ApplicationComponent, Definition, DefinitionKind, deep_merge, oam,
};

use crate::catalog::DefinitionCatalog;
use crate::cue::{CueRuntime, compose_source, declares_field};
use crate::error::{EngineError, Result};
use crate::kube_schematic;

/// A resource produced by a trait, or an auxiliary output of the component
#[derive(Debug, Clone, PartialEq)]
pub struct TraitManifest {
    pub trait_type: String,
    /// Output name within the trait
    pub resource: String,
    pub object: JsonValue,
}

impl TraitManifest {
    pub fn is_auxiliary(&self) -> bool {
        self.trait_type == oam::AUXILIARY_WORKLOAD
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentManifest {
    pub name: String,
    pub component_type: String,
    pub workload: JsonValue,
    pub traits: Vec<TraitManifest>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyManifest {
    pub name: String,
    pub policy_type: String,
    pub objects: Vec<JsonValue>,
}

/// Everything an Application renders to
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedApplication {
    pub name: String,
    pub namespace: String,
    pub components: Vec<ComponentManifest>,
    pub policies: Vec<PolicyManifest>,
}

/// Result of evaluating one definition
#[derive(Debug, Default)]
struct Evaluated {
    output: Option<JsonValue>,
    outputs: Vec<(String, JsonValue)>,
    patch: Option<JsonValue>,
}

/// Application-wide values made available to templates
struct AppContext {
    name: String,
    namespace: String,
    revision: String,
    components: Vec<String>,
}

impl AppContext {
    fn new(app: &Application) -> Self {
        let name = app.metadata.name.clone().unwrap_or_default();
        Self {
            revision: oam::first_revision_name(&name),
            namespace: app
                .metadata
                .namespace
                .clone()
                .unwrap_or_else(|| oam::DEFAULT_NAMESPACE.to_string()),
            components: app.spec.components.iter().map(|c| c.name.clone()).collect(),
            name,
        }
    }

    fn template_context(&self, component: &str, workload: Option<&JsonValue>) -> JsonValue {
        let mut context = json!({
            "name": component,
            "appName": self.name,
            "namespace": self.namespace,
            "appRevision": self.revision,
            "appRevisionNum": 1,
            "components": self.components,
        });
        if let (Some(output), Some(map)) = (workload, context.as_object_mut()) {
            map.insert("output".to_string(), output.clone());
        }
        context
    }
}

/// Renders applications against a definition catalogue
pub struct Renderer<'a> {
    catalog: &'a DefinitionCatalog,
    cue: &'a dyn CueRuntime,
}

impl<'a> Renderer<'a> {
    pub fn new(catalog: &'a DefinitionCatalog, cue: &'a dyn CueRuntime) -> Self {
        Self { catalog, cue }
    }

    pub fn catalog(&self) -> &DefinitionCatalog {
        self.catalog
    }

    /// Render every component and every non built-in policy of `app`
    pub fn render(&self, app: &Application) -> Result<RenderedApplication> {
        validate(app)?;
        let ctx = AppContext::new(app);

        let components = app
            .spec
            .components
            .iter()
            .map(|component| self.render_component(&ctx, component))
            .collect::<Result<Vec<_>>>()?;

        let policies = app
            .spec
            .policies
            .iter()
            .filter(|p| !oam::BUILTIN_POLICIES.contains(&p.policy_type.as_str()))
            .map(|policy| self.render_policy(&ctx, policy))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            app = %ctx.name,
            components = components.len(),
            policies = policies.len(),
            "rendered application"
        );

        Ok(RenderedApplication {
            name: ctx.name,
            namespace: ctx.namespace,
            components,
            policies,
        })
    }

    fn render_component(&self, ctx: &AppContext, component: &ApplicationComponent) -> Result<ComponentManifest> {
        let definition = self
            .catalog
            .get(DefinitionKind::Component, &component.component_type)?;

        let evaluated = self.evaluate(definition, &component.name, component.properties.as_ref(), ctx, None)?;
        let mut workload = evaluated.output.ok_or_else(|| EngineError::Render {
            component: component.name.clone(),
            message: format!("definition {} produced no output", definition.name),
        })?;

        let mut traits = Vec::new();
        for (resource, object) in evaluated.outputs {
            traits.push(TraitManifest {
                trait_type: oam::AUXILIARY_WORKLOAD.to_string(),
                resource,
                object,
            });
        }

        for app_trait in &component.traits {
            let trait_def = self.catalog.get(DefinitionKind::Trait, &app_trait.trait_type)?;
            check_applies_to(trait_def, definition, component)?;

            let evaluated = self.evaluate(
                trait_def,
                &component.name,
                app_trait.properties.as_ref(),
                ctx,
                Some(&workload),
            )?;

            if let Some(patch) = &evaluated.patch {
                deep_merge(&mut workload, patch);
            }
            if let Some(object) = evaluated.output {
                traits.push(TraitManifest {
                    trait_type: app_trait.trait_type.clone(),
                    resource: resource_name(&object),
                    object,
                });
            }
            for (resource, object) in evaluated.outputs {
                traits.push(TraitManifest {
                    trait_type: app_trait.trait_type.clone(),
                    resource,
                    object,
                });
            }
        }

        stamp(&mut workload, ctx, Some(&component.name), None)?;
        if workload.pointer("/metadata/name").is_none() {
            if let Some(metadata) = workload.get_mut("metadata").and_then(JsonValue::as_object_mut) {
                metadata.insert("name".to_string(), JsonValue::String(component.name.clone()));
            }
        }
        for manifest in &mut traits {
            stamp(
                &mut manifest.object,
                ctx,
                Some(&component.name),
                Some((&manifest.trait_type, &manifest.resource)),
            )?;
        }

        Ok(ComponentManifest {
            name: component.name.clone(),
            component_type: component.component_type.clone(),
            workload,
            traits,
        })
    }

    fn render_policy(&self, ctx: &AppContext, policy: &AppPolicy) -> Result<PolicyManifest> {
        let definition = self.catalog.get(DefinitionKind::Policy, &policy.policy_type)?;
        let evaluated = self.evaluate(definition, &policy.name, policy.properties.as_ref(), ctx, None)?;

        let mut objects: Vec<JsonValue> = evaluated.output.into_iter().collect();
        objects.extend(evaluated.outputs.into_iter().map(|(_, object)| object));
        for object in &mut objects {
            stamp(object, ctx, None, None)?;
        }

        Ok(PolicyManifest {
            name: policy.name.clone(),
            policy_type: policy.policy_type.clone(),
            objects,
        })
    }

    fn evaluate(
        &self,
        definition: &Definition,
        name: &str,
        properties: Option<&JsonValue>,
        ctx: &AppContext,
        workload: Option<&JsonValue>,
    ) -> Result<Evaluated> {
        let schematic = definition.schematic.as_ref().ok_or_else(|| EngineError::NoSchematic {
            name: definition.name.clone(),
        })?;

        if let Some(cue) = &schematic.cue {
            let template = &cue.template;
            let source = compose_source(
                template,
                properties.unwrap_or(&JsonValue::Null),
                &ctx.template_context(name, workload),
            );
            let export = |field: &str| -> Result<Option<JsonValue>> {
                if !declares_field(template, field) {
                    return Ok(None);
                }
                self.cue
                    .export(&source, Some(field))
                    .map(Some)
                    .map_err(|e| match e {
                        EngineError::Cue { message } => EngineError::Render {
                            component: name.to_string(),
                            message,
                        },
                        other => other,
                    })
            };

            let outputs = match export("outputs")? {
                Some(JsonValue::Object(map)) => map.into_iter().collect(),
                Some(JsonValue::Null) | None => Vec::new(),
                Some(_) => {
                    return Err(EngineError::Render {
                        component: name.to_string(),
                        message: "outputs must be an object".to_string(),
                    });
                }
            };

            return Ok(Evaluated {
                output: export("output")?,
                outputs,
                patch: export("patch")?,
            });
        }

        if let Some(kube) = &schematic.kube {
            return Ok(Evaluated {
                output: Some(kube_schematic::render(&definition.name, kube, properties)?),
                ..Default::default()
            });
        }

        Err(EngineError::NoSchematic {
            name: definition.name.clone(),
        })
    }
}

/// Reject applications the controller would refuse
pub fn validate(app: &Application) -> Result<()> {
    if let Some(name) = app.duplicate_components().first() {
        return Err(EngineError::DuplicateComponent(name.to_string()));
    }

    for component in &app.spec.components {
        for dependency in &component.depends_on {
            if app.component(dependency).is_none() {
                return Err(EngineError::UnknownDependency {
                    component: component.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Whether a trait definition accepts the component's workload
fn check_applies_to(trait_def: &Definition, component_def: &Definition, component: &ApplicationComponent) -> Result<()> {
    if trait_def.applies_to.is_empty() {
        return Ok(());
    }

    let workload = component_def.workload.as_ref().map(|w| {
        let group = w.api_version.split_once('/').map(|(g, _)| g).unwrap_or("");
        let resource = format!("{}s", w.kind.to_lowercase());
        (group.to_string(), resource, w.kind.clone())
    });

    let applies = trait_def.applies_to.iter().any(|target| {
        if target == "*" || *target == component.component_type {
            return true;
        }
        let Some((group, resource, kind)) = &workload else {
            return false;
        };
        if let Some(target_group) = target.strip_prefix("*.") {
            return target_group == group;
        }
        match target.split_once('.') {
            Some((r, g)) => r == resource && g == group,
            None => target == resource || target == kind,
        }
    });

    if applies {
        Ok(())
    } else {
        Err(EngineError::TraitNotApplicable {
            trait_type: trait_def.name.clone(),
            component: component.name.clone(),
            component_type: component.component_type.clone(),
        })
    }
}

/// Name used for a trait resource rendered from a plain object
fn resource_name(object: &JsonValue) -> String {
    object
        .get("kind")
        .and_then(JsonValue::as_str)
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Add namespace and ownership labels to a rendered object
fn stamp(
    object: &mut JsonValue,
    ctx: &AppContext,
    component: Option<&str>,
    trait_labels: Option<(&str, &str)>,
) -> Result<()> {
    let Some(map) = object.as_object_mut() else {
        return Err(EngineError::Render {
            component: component.unwrap_or(&ctx.name).to_string(),
            message: "rendered resource is not an object".to_string(),
        });
    };

    let metadata = map
        .entry("metadata")
        .or_insert_with(|| JsonValue::Object(Map::new()));
    if metadata.is_null() {
        *metadata = JsonValue::Object(Map::new());
    }
    let Some(metadata) = metadata.as_object_mut() else {
        return Err(EngineError::Render {
            component: component.unwrap_or(&ctx.name).to_string(),
            message: "metadata is not an object".to_string(),
        });
    };

    metadata
        .entry("namespace")
        .or_insert_with(|| JsonValue::String(ctx.namespace.clone()));

    let labels = metadata
        .entry("labels")
        .or_insert_with(|| JsonValue::Object(Map::new()));
    if !labels.is_object() {
        *labels = JsonValue::Object(Map::new());
    }
    if let Some(labels) = labels.as_object_mut() {
        let mut set = |key: &str, value: &str| {
            labels.insert(key.to_string(), JsonValue::String(value.to_string()));
        };
        set(oam::LABEL_APP_NAME, &ctx.name);
        if let Some(component) = component {
            set(oam::LABEL_APP_COMPONENT, component);
        }
        set(oam::LABEL_APP_REVISION, &ctx.revision);
        if let Some((trait_type, resource)) = trait_labels {
            set(oam::LABEL_TRAIT_TYPE, trait_type);
            set(oam::LABEL_TRAIT_RESOURCE, resource);
        }
    }

    Ok(())
}
