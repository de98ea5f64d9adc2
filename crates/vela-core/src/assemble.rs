//! Multi-file application assembly
//!
//! Several documents (one Application plus standalone Policies and at most
//! one Workflow) are combined into a single Application ready for rendering.
//! Standalone objects that the Application does not reference are reported
//! on the warning sink and left out, unless merging is requested.

use std::collections::BTreeSet;
use std::io::Write;

use serde::Deserialize;

use crate::application::{AppWorkflow, Application, WorkflowStep};
use crate::document::{Document, InputDocument};
use crate::error::{CoreError, Result};
use crate::oam;
use crate::standalone::{Policy, Workflow};

/// Properties of a `deploy` workflow step
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeployStepProperties {
    #[serde(default)]
    pub auto: Option<bool>,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub parallelism: Option<i64>,
    #[serde(default)]
    pub ignore_terraform_component: Option<bool>,
}

impl DeployStepProperties {
    /// Strictly decode the properties of a deploy step
    pub fn from_step(step: &WorkflowStep) -> Result<Self> {
        match &step.properties {
            None => Ok(Self::default()),
            Some(props) => Self::deserialize(props).map_err(|e| CoreError::InvalidDeployStep {
                step: step.name.clone(),
                message: e.to_string(),
            }),
        }
    }
}

/// Documents sorted by kind, before any merging
#[derive(Debug, Default)]
struct Classified {
    application: Option<Application>,
    policies: Vec<Policy>,
    workflow: Option<Workflow>,
}

/// Assemble an Application from several documents
///
/// Exactly one Application must be present. With `merge`, the standalone
/// Workflow replaces the Application's workflow and every standalone Policy
/// is appended; otherwise only Policies named by a deploy step of the merged
/// workflow are appended and everything else is reported on `warnings`.
pub fn assemble<W: Write>(docs: &[InputDocument], merge: bool, warnings: &mut W) -> Result<Application> {
    let classified = classify_all(docs)?;

    let mut app = classified.application.ok_or(CoreError::NoApplication)?;
    let mut policy_names = BTreeSet::new();

    if let Some(workflow) = classified.workflow {
        if merge {
            policy_names = referenced_policies(&workflow.steps)?;
            app.spec.workflow = Some(AppWorkflow {
                reference: String::new(),
                steps: workflow.steps,
                mode: workflow.mode,
            });
        } else {
            let referenced = app
                .spec
                .workflow
                .as_ref()
                .is_some_and(|wf| wf.has_reference() && wf.reference == workflow.name());
            if !referenced {
                write!(
                    warnings,
                    "WARNING: workflow {} not referenced by application\n\n",
                    workflow.name()
                )?;
            }
        }
    }

    for policy in classified.policies {
        if merge || policy_names.contains(policy.name()) {
            app.spec.policies.push(policy.to_app_policy());
        } else {
            write!(
                warnings,
                "WARNING: policy {} not referenced by application\n\n",
                policy.name()
            )?;
        }
    }

    tracing::debug!(
        application = app.metadata.name.as_deref().unwrap_or(""),
        components = app.spec.components.len(),
        policies = app.spec.policies.len(),
        "assembled application"
    );

    Ok(app)
}

fn classify_all(docs: &[InputDocument]) -> Result<Classified> {
    let mut classified = Classified::default();

    for doc in docs {
        match Document::classify(doc)? {
            Document::Application(app) => {
                if classified.application.is_some() {
                    return Err(CoreError::MultipleApplications);
                }
                classified.application = Some(*app);
            }
            Document::Policy(policy) => classified.policies.push(policy),
            Document::Workflow(workflow) => {
                if classified.workflow.is_some() {
                    return Err(CoreError::MultipleWorkflows);
                }
                classified.workflow = Some(workflow);
            }
        }
    }

    Ok(classified)
}

/// Collect the policy names referenced by deploy steps, including sub-steps
pub fn referenced_policies(steps: &[WorkflowStep]) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    collect_policies(steps, &mut names)?;
    Ok(names)
}

fn collect_policies(steps: &[WorkflowStep], names: &mut BTreeSet<String>) -> Result<()> {
    for step in steps {
        if step.step_type == oam::DEPLOY_STEP {
            names.extend(DeployStepProperties::from_step(step)?.policies);
        }
        collect_policies(&step.sub_steps, names)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = r#"
apiVersion: core.oam.dev/v1beta1
kind: Application
metadata:
  name: first-vela-app
spec:
  components:
    - name: express-server
      type: webservice
      properties:
        image: oamdev/hello-world
"#;

    const APP_WITH_REF: &str = r#"
apiVersion: core.oam.dev/v1beta1
kind: Application
metadata:
  name: referencing-app
spec:
  components:
    - name: express-server
      type: webservice
  workflow:
    ref: wf
"#;

    const WORKFLOW: &str = r#"
apiVersion: core.oam.dev/v1alpha1
kind: Workflow
metadata:
  name: wf
steps:
  - name: deploy-local
    type: deploy
    properties:
      policies: ["topology-local"]
  - name: group
    type: step-group
    subSteps:
      - name: deploy-remote
        type: deploy
        properties:
          policies: ["topology-remote", "override-remote"]
"#;

    const TOPOLOGY_LOCAL: &str = r#"
apiVersion: core.oam.dev/v1alpha1
kind: Policy
metadata:
  name: topology-local
type: topology
properties:
  clusters: ["local"]
"#;

    const OVERRIDE_REMOTE: &str = r#"
apiVersion: core.oam.dev/v1alpha1
kind: Policy
metadata:
  name: override-remote
type: override
properties:
  components:
    - name: express-server
      properties:
        image: nginx
"#;

    const UNUSED: &str = r#"
apiVersion: core.oam.dev/v1alpha1
kind: Policy
metadata:
  name: unused
type: garbage-collect
"#;

    fn doc(name: &str, yaml: &str) -> InputDocument {
        InputDocument::from_yaml(name, yaml.as_bytes()).unwrap()
    }

    fn run(docs: &[InputDocument], merge: bool) -> (Result<Application>, String) {
        let mut out = Vec::new();
        let result = assemble(docs, merge, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_single_application_unchanged() {
        let docs = [doc("app.yaml", APP)];
        let (app, warnings) = run(&docs, false);
        let expected: Application = serde_yaml::from_str(APP).unwrap();
        assert_eq!(app.unwrap(), expected);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unreferenced_files_warn_without_merge() {
        let docs = [
            doc("app.yaml", APP),
            doc("wf.yaml", WORKFLOW),
            doc("policy.yaml", TOPOLOGY_LOCAL),
        ];
        let (app, warnings) = run(&docs, false);

        let expected: Application = serde_yaml::from_str(APP).unwrap();
        assert_eq!(app.unwrap(), expected);
        assert_eq!(
            warnings,
            "WARNING: workflow wf not referenced by application\n\n\
             WARNING: policy topology-local not referenced by application\n\n"
        );
    }

    #[test]
    fn test_two_applications_in_any_order() {
        for docs in [
            [doc("a.yaml", APP), doc("b.yaml", APP_WITH_REF)],
            [doc("b.yaml", APP_WITH_REF), doc("a.yaml", APP)],
        ] {
            let (result, _) = run(&docs, true);
            assert_eq!(
                result.unwrap_err().to_string(),
                "more than one applications provided"
            );
        }
    }

    #[test]
    fn test_two_workflows_fail_even_without_merge() {
        let docs = [
            doc("app.yaml", APP),
            doc("wf1.yaml", WORKFLOW),
            doc("wf2.yaml", WORKFLOW),
        ];
        for merge in [true, false] {
            let (result, warnings) = run(&docs, merge);
            assert_eq!(
                result.unwrap_err().to_string(),
                "more than one external workflow provided"
            );
            assert!(warnings.is_empty());
        }
    }

    #[test]
    fn test_merge_replaces_workflow_and_collects_policies() {
        let docs = [
            doc("app.yaml", APP_WITH_REF),
            doc("override.yaml", OVERRIDE_REMOTE),
            doc("wf.yaml", WORKFLOW),
            doc("topology.yaml", TOPOLOGY_LOCAL),
        ];
        let (app, warnings) = run(&docs, true);
        let app = app.unwrap();

        let workflow = app.spec.workflow.as_ref().unwrap();
        assert!(workflow.reference.is_empty());
        assert_eq!(workflow.steps.len(), 2);
        assert_eq!(workflow.steps[1].sub_steps[0].name, "deploy-remote");

        let names: Vec<_> = app.spec.policies.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["override-remote", "topology-local"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_merge_appends_unreferenced_policies() {
        let docs = [doc("app.yaml", APP), doc("unused.yaml", UNUSED)];
        let (app, warnings) = run(&docs, true);
        let app = app.unwrap();
        assert_eq!(app.spec.policies.len(), 1);
        assert_eq!(app.spec.policies[0].policy_type, "garbage-collect");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unrecognized_file_is_named() {
        let docs = [
            doc("app.yaml", APP),
            doc("deploy.yaml", "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: x\n"),
        ];
        let (result, _) = run(&docs, false);
        assert_eq!(
            result.unwrap_err().to_string(),
            "file deploy.yaml is not application, policy or workflow"
        );
    }

    #[test]
    fn test_matching_reference_does_not_warn() {
        let docs = [doc("app.yaml", APP_WITH_REF), doc("wf.yaml", WORKFLOW)];
        let (app, warnings) = run(&docs, false);
        let app = app.unwrap();

        assert!(!warnings.contains("not referenced"));
        assert_eq!(app.metadata.name.as_deref(), Some("referencing-app"));
        assert_eq!(app.spec.workflow.unwrap().reference, "wf");
    }

    #[test]
    fn test_mismatched_reference_warns() {
        let other = WORKFLOW.replace("name: wf", "name: other");
        let docs = [doc("app.yaml", APP_WITH_REF), doc("wf.yaml", &other)];
        let (app, warnings) = run(&docs, false);
        assert!(app.is_ok());
        assert_eq!(warnings, "WARNING: workflow other not referenced by application\n\n");
    }

    #[test]
    fn test_only_policy_fails() {
        let docs = [doc("policy.yaml", TOPOLOGY_LOCAL)];
        let (result, _) = run(&docs, true);
        assert_eq!(result.unwrap_err().to_string(), "no application provided");

        let (result, _) = run(&[], false);
        assert!(matches!(result, Err(CoreError::NoApplication)));
    }

    #[test]
    fn test_referenced_policies_strict_properties() {
        let steps: Vec<WorkflowStep> = serde_yaml::from_str(
            r#"
- name: deploy
  type: deploy
  properties:
    policies: ["a"]
    replicas: 3
"#,
        )
        .unwrap();
        let err = referenced_policies(&steps).unwrap_err();
        assert!(matches!(err, CoreError::InvalidDeployStep { .. }));
    }

    #[test]
    fn test_referenced_policies_ignores_other_steps() {
        let steps: Vec<WorkflowStep> = serde_yaml::from_str(
            r#"
- name: suspend
  type: suspend
  properties:
    duration: 10s
- name: deploy
  type: deploy
  properties:
    auto: false
    parallelism: 5
    policies: ["b", "a", "b"]
"#,
        )
        .unwrap();
        let names = referenced_policies(&steps).unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
