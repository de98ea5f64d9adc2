//! Application revisions: immutable snapshots recorded by the controller

use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::application::{Application, WorkflowStatus};
use crate::oam;

#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "core.oam.dev",
    version = "v1beta1",
    kind = "ApplicationRevision",
    namespaced,
    status = "ApplicationRevisionStatus",
    shortname = "apprev",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRevisionSpec {
    pub application: Application,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRevisionStatus {
    #[serde(default)]
    pub succeeded: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowStatus>,
}

impl ApplicationRevision {
    /// Publish version the revision was created for
    pub fn publish_version(&self) -> &str {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(oam::ANNOTATION_PUBLISH_VERSION))
            .map(String::as_str)
            .or_else(|| self.spec.application.publish_version())
            .unwrap_or("")
    }

    /// Owning application name, from the label or the revision name
    pub fn app_name(&self) -> String {
        self.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(oam::LABEL_APP_NAME))
            .cloned()
            .unwrap_or_else(|| {
                oam::app_name_from_revision(self.metadata.name.as_deref().unwrap_or("")).to_string()
            })
    }

    pub fn succeeded(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.succeeded)
    }

    /// Workflow phase recorded for this revision
    pub fn workflow_phase(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.workflow.as_ref())
            .and_then(|w| w.status.as_deref())
            .unwrap_or("")
    }

    /// Time the revision's workflow started
    pub fn begin_time(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.workflow.as_ref())
            .and_then(|w| w.start_time.as_deref())
            .unwrap_or("")
    }

    /// Hash of the revision content, from the revision label
    pub fn hash(&self) -> &str {
        self.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(oam::LABEL_APP_REVISION_HASH))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Serialized size in bytes
    pub fn size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}
