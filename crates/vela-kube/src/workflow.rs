//! Workflow control: suspend, resume, terminate, restart and rollback
//!
//! Each operation reads the application, edits its workflow status and writes
//! the result back with a merge patch on the status subresource. The
//! controller picks the change up on its next reconcile.

use serde_json::{Value as JsonValue, json};
use vela_core::{Application, RevisionRef, StepStatus, WorkflowStatus, oam};

use crate::error::{KubeError, Result};
use crate::store::{ApplicationStore, revision_number};

/// Result of resuming a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed,
    NotSuspended,
}

/// What a rollback restored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Spec of the latest revision, for applications without a publish version
    LatestRevision(String),

    /// Spec and workflow status of the newest succeeded, published revision
    Published { revision: String, publish_version: String },
}

fn workflow_error(message: impl Into<String>) -> KubeError {
    KubeError::Workflow(message.into())
}

fn step_not_found(step: Option<&str>) -> KubeError {
    workflow_error(format!("can not find step {}", step.unwrap_or("")))
}

/// Load an application whose workflow has started
async fn started(store: &dyn ApplicationStore, namespace: &str, name: &str) -> Result<(Application, WorkflowStatus)> {
    let app = store.get(namespace, name).await?;
    let workflow = app
        .status
        .as_ref()
        .and_then(|s| s.workflow.clone())
        .ok_or_else(|| workflow_error("the workflow in application is not running"))?;
    Ok((app, workflow))
}

/// Refuse `operation` once the workflow has succeeded
fn ensure_not_complete(app: &Application, workflow: &WorkflowStatus, operation: &str) -> Result<()> {
    if workflow.status.as_deref() == Some(oam::WORKFLOW_SUCCEEDED) {
        return Err(workflow_error(format!(
            "{} workflow not allowed because application {} is running",
            operation,
            app.metadata.name.as_deref().unwrap_or("")
        )));
    }
    Ok(())
}

async fn patch_workflow(store: &dyn ApplicationStore, namespace: &str, name: &str, workflow: JsonValue) -> Result<()> {
    store.patch_status(namespace, name, &json!({ "workflow": workflow })).await?;
    Ok(())
}

/// Move steps and sub-steps in phase `from` to `to`, all of them or only
/// those named `step`. Returns false when a named step matched nothing.
fn transition(steps: &mut [StepStatus], from: &str, to: &str, step: Option<&str>) -> bool {
    let selected = |s: &StepStatus| s.phase == from && step.is_none_or(|name| s.name == name);
    let mut found = step.is_none();
    for parent in steps.iter_mut() {
        for sub in parent.sub_steps.iter_mut() {
            if selected(sub) {
                sub.phase = to.to_string();
                found = true;
            }
        }
        if selected(parent) {
            parent.phase = to.to_string();
            found = true;
        }
    }
    found
}

fn terminate_step(step: &mut StepStatus) {
    match step.phase.as_str() {
        oam::STEP_FAILED => {
            if step.reason != oam::REASON_FAILED_AFTER_RETRIES && step.reason != oam::REASON_TIMEOUT {
                step.reason = oam::REASON_TERMINATE.to_string();
            }
        }
        oam::STEP_RUNNING | oam::STEP_SUSPENDING => {
            step.phase = oam::STEP_FAILED.to_string();
            step.reason = oam::REASON_TERMINATE.to_string();
        }
        _ => {}
    }
}

/// Forget the status of `step` and of every top-level step after it.
/// A sub-step is dropped from its group and the group goes back to running.
fn clean_from_step(steps: &mut Vec<StepStatus>, step: &str) -> bool {
    if let Some(index) = steps.iter().position(|s| s.name == step) {
        steps.truncate(index);
        return true;
    }

    let group = steps
        .iter()
        .position(|parent| parent.sub_steps.iter().any(|s| s.name == step));
    let Some(index) = group else {
        return false;
    };
    steps.truncate(index + 1);
    let parent = &mut steps[index];
    parent.sub_steps.retain(|s| s.name != step);
    parent.phase = oam::STEP_RUNNING.to_string();
    parent.reason.clear();
    true
}

/// Suspend the workflow, or only one running step
pub async fn suspend(store: &dyn ApplicationStore, namespace: &str, name: &str, step: Option<&str>) -> Result<()> {
    let (app, mut workflow) = started(store, namespace, name).await?;
    ensure_not_complete(&app, &workflow, "suspend")?;
    if step.is_some() && workflow.terminated {
        return Err(workflow_error("can not suspend a terminated workflow"));
    }

    workflow.suspend = true;
    if !transition(&mut workflow.steps, oam::STEP_RUNNING, oam::STEP_SUSPENDING, step) {
        return Err(step_not_found(step));
    }
    tracing::debug!(%namespace, %name, ?step, "suspending workflow");
    patch_workflow(store, namespace, name, serde_json::to_value(&workflow)?).await
}

/// Resume a suspended workflow, or only one suspended step
pub async fn resume(
    store: &dyn ApplicationStore,
    namespace: &str,
    name: &str,
    step: Option<&str>,
) -> Result<ResumeOutcome> {
    let (app, mut workflow) = started(store, namespace, name).await?;
    ensure_not_complete(&app, &workflow, "resume")?;
    if workflow.terminated {
        return Err(workflow_error("can not resume a terminated workflow"));
    }
    if !workflow.suspend {
        return Ok(ResumeOutcome::NotSuspended);
    }

    workflow.suspend = false;
    if !transition(&mut workflow.steps, oam::STEP_SUSPENDING, oam::STEP_RUNNING, step) {
        return Err(step_not_found(step));
    }
    tracing::debug!(%namespace, %name, ?step, "resuming workflow");
    patch_workflow(store, namespace, name, serde_json::to_value(&workflow)?).await?;
    Ok(ResumeOutcome::Resumed)
}

/// Terminate the workflow; unfinished steps fail with reason `Terminate`
pub async fn terminate(store: &dyn ApplicationStore, namespace: &str, name: &str) -> Result<()> {
    let (app, mut workflow) = started(store, namespace, name).await?;
    ensure_not_complete(&app, &workflow, "terminate")?;

    workflow.terminated = true;
    workflow.suspend = false;
    for step in workflow.steps.iter_mut() {
        terminate_step(step);
        step.sub_steps.iter_mut().for_each(terminate_step);
    }
    tracing::debug!(%namespace, %name, "terminating workflow");
    patch_workflow(store, namespace, name, serde_json::to_value(&workflow)?).await
}

/// Restart the whole workflow, or re-run it from `step`
pub async fn restart(store: &dyn ApplicationStore, namespace: &str, name: &str, step: Option<&str>) -> Result<()> {
    let (_, mut workflow) = started(store, namespace, name).await?;

    let Some(step) = step else {
        tracing::debug!(%namespace, %name, "resetting workflow status");
        return patch_workflow(store, namespace, name, JsonValue::Null).await;
    };

    workflow.terminated = false;
    workflow.suspend = false;
    workflow.finished = false;
    workflow.end_time = None;
    if !clean_from_step(&mut workflow.steps, step) {
        return Err(step_not_found(Some(step)));
    }

    let mut patch = serde_json::to_value(&workflow)?;
    // null removes the field under merge-patch semantics
    patch["endTime"] = JsonValue::Null;
    tracing::debug!(%namespace, %name, %step, "restarting workflow from step");
    patch_workflow(store, namespace, name, patch).await
}

/// Roll the application back to a previous revision
///
/// Without a publish version the spec of the latest revision is restored.
/// With one, the newest succeeded revision that carries a publish version
/// provides the spec, the publish version and the workflow status.
pub async fn rollback(store: &dyn ApplicationStore, namespace: &str, name: &str) -> Result<RollbackOutcome> {
    let mut app = store.get(namespace, name).await?;
    let status = app.status.clone().unwrap_or_default();
    if status.workflow.as_ref().is_some_and(WorkflowStatus::is_running) {
        return Err(workflow_error("can not rollback a running workflow"));
    }

    if app.publish_version().is_none() {
        let latest = status
            .latest_revision
            .as_ref()
            .map(|r| r.name.as_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| workflow_error(format!("the latest revision is not set: {}", name)))?;
        let revision = store.get_revision(namespace, latest).await?;
        app.spec = revision.spec.application.spec;
        store.apply(&app).await?;
        return Ok(RollbackOutcome::LatestRevision(latest.to_string()));
    }

    let revision = store
        .list_revisions(namespace, name)
        .await?
        .into_iter()
        .rev()
        .find(|r| r.succeeded() && !r.publish_version().is_empty())
        .ok_or_else(|| {
            workflow_error(format!(
                "failed to find previous succeeded revision for application {}/{}",
                namespace, name
            ))
        })?;

    let revision_name = revision.metadata.name.clone().unwrap_or_default();
    let publish_version = revision.publish_version().to_string();
    let latest_revision = RevisionRef {
        name: revision_name.clone(),
        revision: revision_number(&revision_name) as i64,
        revision_hash: revision.hash().to_string(),
    };
    let workflow = revision.status.as_ref().and_then(|s| s.workflow.clone());
    tracing::debug!(%namespace, %name, revision = %revision_name, "rolling back application");

    app.spec = revision.spec.application.spec;
    app.set_annotation(oam::ANNOTATION_PUBLISH_VERSION, publish_version.clone());
    store.apply(&app).await?;

    let patch = json!({
        "workflow": serde_json::to_value(&workflow)?,
        "latestRevision": serde_json::to_value(&latest_revision)?,
        "services": [],
    });
    store.patch_status(namespace, name, &patch).await?;

    Ok(RollbackOutcome::Published {
        revision: revision_name,
        publish_version,
    })
}
