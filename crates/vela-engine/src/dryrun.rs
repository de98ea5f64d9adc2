//! Dry-run: render an Application locally and print the resulting objects
//!
//! When the workflow has `deploy` steps, each step is rendered with the
//! override policies it references, once per referenced topology.

use std::io::Write;

use serde_json::Value as JsonValue;
use vela_core::{AppPolicy, Application, DeployStepProperties, oam};

use crate::error::{EngineError, Result};
use crate::override_policy::{OverrideSpec, patch_components};
use crate::render::{RenderedApplication, Renderer};

/// Render `app` the way the controller would deploy it and print the result
pub fn execute_with_policies<W: Write>(renderer: &Renderer<'_>, app: &Application, out: &mut W) -> Result<()> {
    let mut app = app.clone();
    if app.metadata.namespace.as_deref().is_none_or(str::is_empty) {
        app.metadata.namespace = Some(oam::DEFAULT_NAMESPACE.to_string());
    }
    let name = app.metadata.name.clone().unwrap_or_default();

    let deploy_steps: Vec<_> = app
        .spec
        .workflow
        .iter()
        .flat_map(|w| w.steps.iter())
        .filter(|s| s.step_type == oam::DEPLOY_STEP)
        .collect();

    if deploy_steps.is_empty() {
        let rendered = renderer.render(&app)?;
        return print_dry_run(out, &name, &rendered);
    }

    for step in deploy_steps {
        let properties = DeployStepProperties::from_step(step)?;
        let (topologies, overrides) = filter_policies(&app.spec.policies, &properties.policies)?;
        let overrides = overrides
            .into_iter()
            .map(OverrideSpec::from_policy)
            .collect::<Result<Vec<_>>>()?;

        let mut patched = app.clone();
        patched.spec.components = patch_components(&app.spec.components, &overrides)?;
        let rendered = renderer.render(&patched)?;

        tracing::debug!(step = %step.name, topologies = topologies.len(), overrides = overrides.len(), "dry-run deploy step");

        if topologies.is_empty() {
            print_dry_run(out, &format!("{} only with override policies", name), &rendered)?;
        } else {
            for topology in topologies {
                print_dry_run(out, &format!("{} with topology {}", name, topology.name), &rendered)?;
            }
        }
    }

    Ok(())
}

/// Split the policies named by a deploy step into topology and override ones
pub fn filter_policies<'a>(
    policies: &'a [AppPolicy],
    names: &[String],
) -> Result<(Vec<&'a AppPolicy>, Vec<&'a AppPolicy>)> {
    let mut topologies = Vec::new();
    let mut overrides = Vec::new();

    for name in names {
        let policy = policies
            .iter()
            .find(|p| &p.name == name)
            .ok_or_else(|| EngineError::PolicyNotFound(name.clone()))?;
        match policy.policy_type.as_str() {
            oam::TOPOLOGY_POLICY => topologies.push(policy),
            oam::OVERRIDE_POLICY => overrides.push(policy),
            _ => {}
        }
    }

    Ok((topologies, overrides))
}

/// Print rendered objects under `title`
pub fn print_dry_run<W: Write>(out: &mut W, title: &str, rendered: &RenderedApplication) -> Result<()> {
    for component in &rendered.components {
        write!(out, "---\n# Application({}) -- Component({}) \n---\n\n", title, component.name)?;
        out.write_all(to_yaml(&component.workload)?.as_bytes())?;
        out.write_all(b"\n---\n")?;

        for manifest in &component.traits {
            if manifest.is_auxiliary() {
                out.write_all(b"## From the auxiliary workload \n")?;
            } else if !manifest.trait_type.is_empty() {
                write!(out, "## From the trait {} \n", manifest.trait_type)?;
            }
            out.write_all(to_yaml(&manifest.object)?.as_bytes())?;
            out.write_all(b"\n---\n")?;
        }
        out.write_all(b"\n")?;
    }

    for policy in &rendered.policies {
        for object in &policy.objects {
            write!(out, "---\n# Application({}) -- Policy({}) \n---\n\n", title, policy.name)?;
            out.write_all(to_yaml(object)?.as_bytes())?;
            out.write_all(b"\n---\n")?;
        }
    }

    Ok(())
}

fn to_yaml(value: &JsonValue) -> Result<String> {
    let yaml = serde_yaml::to_string(value)?;
    Ok(yaml.trim_start_matches("---\n").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::{FakeCue, app, catalog};
    use crate::render::{ComponentManifest, PolicyManifest, TraitManifest};
    use serde_json::json;

    #[test]
    fn test_print_format() {
        let rendered = RenderedApplication {
            name: "demo".to_string(),
            namespace: "default".to_string(),
            components: vec![ComponentManifest {
                name: "web".to_string(),
                component_type: "worker".to_string(),
                workload: json!({"kind": "Deployment"}),
                traits: vec![
                    TraitManifest {
                        trait_type: "expose".to_string(),
                        resource: "service".to_string(),
                        object: json!({"kind": "Service"}),
                    },
                    TraitManifest {
                        trait_type: oam::AUXILIARY_WORKLOAD.to_string(),
                        resource: "config".to_string(),
                        object: json!({"kind": "ConfigMap"}),
                    },
                ],
            }],
            policies: vec![PolicyManifest {
                name: "limits".to_string(),
                policy_type: "quota".to_string(),
                objects: vec![json!({"kind": "ResourceQuota"})],
            }],
        };

        let mut out = Vec::new();
        print_dry_run(&mut out, "demo", &rendered).unwrap();
        let expected = "---\n# Application(demo) -- Component(web) \n---\n\nkind: Deployment\n\n---\n\
            ## From the trait expose \nkind: Service\n\n---\n\
            ## From the auxiliary workload \nkind: ConfigMap\n\n---\n\n\
            ---\n# Application(demo) -- Policy(limits) \n---\n\nkind: ResourceQuota\n\n---\n";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    const APP_WITH_POLICIES: &str = r#"
apiVersion: core.oam.dev/v1beta1
kind: Application
metadata:
  name: demo
spec:
  components:
    - name: backend
      type: worker
      properties:
        image: nginx
    - name: cache
      type: worker
      properties:
        image: redis
  policies:
    - name: target-prod
      type: topology
      properties:
        clusters: ["prod"]
    - name: target-staging
      type: topology
      properties:
        clusters: ["staging"]
    - name: replicas
      type: override
      properties:
        components:
          - name: backend
            properties:
              replicas: 3
        selector: ["backend"]
  workflow:
    steps:
      - name: deploy-all
        type: deploy
        properties:
          policies: ["target-prod", "target-staging", "replicas"]
"#;

    #[test]
    fn test_topology_fan_out() {
        let catalog = catalog();
        let cue = FakeCue::default();
        let renderer = Renderer::new(&catalog, &cue);

        let mut out = Vec::new();
        execute_with_policies(&renderer, &app(APP_WITH_POLICIES), &mut out).unwrap();
        let output = String::from_utf8(out).unwrap();

        assert!(output.contains("# Application(demo with topology target-prod) -- Component(backend) \n"));
        assert!(output.contains("# Application(demo with topology target-staging) -- Component(backend) \n"));
        assert!(!output.contains("Component(cache)"));
        assert!(output.contains("replicas: 3"));
        assert!(output.contains("namespace: default"));
    }

    #[test]
    fn test_override_only() {
        let yaml = APP_WITH_POLICIES.replace(
            "policies: [\"target-prod\", \"target-staging\", \"replicas\"]",
            "policies: [\"replicas\"]",
        );
        let catalog = catalog();
        let cue = FakeCue::default();
        let renderer = Renderer::new(&catalog, &cue);

        let mut out = Vec::new();
        execute_with_policies(&renderer, &app(&yaml), &mut out).unwrap();
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("# Application(demo only with override policies) -- Component(backend) \n"));
        assert!(!output.contains("with topology"));
    }

    #[test]
    fn test_missing_policy() {
        let yaml = APP_WITH_POLICIES.replace("\"replicas\"]", "\"nonexistent\"]");
        let catalog = catalog();
        let cue = FakeCue::default();
        let renderer = Renderer::new(&catalog, &cue);

        let err = execute_with_policies(&renderer, &app(&yaml), &mut Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "policy nonexistent not found");
    }

    #[test]
    fn test_no_deploy_steps_renders_plain() {
        let yaml = r#"
apiVersion: core.oam.dev/v1beta1
kind: Application
metadata:
  name: plain
spec:
  components:
    - name: backend
      type: worker
      properties:
        image: nginx
"#;
        let catalog = catalog();
        let cue = FakeCue::default();
        let renderer = Renderer::new(&catalog, &cue);

        let mut out = Vec::new();
        execute_with_policies(&renderer, &app(yaml), &mut out).unwrap();
        let output = String::from_utf8(out).unwrap();
        assert!(output.starts_with("---\n# Application(plain) -- Component(backend) \n---\n\n"));
        assert!(output.ends_with("\n---\n\n"));
    }

    #[test]
    fn test_filter_policies() {
        let application = app(APP_WITH_POLICIES);
        let names = vec!["replicas".to_string(), "target-prod".to_string()];
        let (topologies, overrides) = filter_policies(&application.spec.policies, &names).unwrap();
        assert_eq!(topologies.len(), 1);
        assert_eq!(overrides[0].name, "replicas");
    }
}
