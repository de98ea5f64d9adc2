//! Well-known labels, annotations and names of the OAM resource model

/// API group of every OAM resource
pub const GROUP: &str = "core.oam.dev";

/// Namespace hosting the control plane, addons and shared definitions
pub const SYSTEM_NAMESPACE: &str = "vela-system";

/// Namespace used when nothing else selects one
pub const DEFAULT_NAMESPACE: &str = "default";

// ========== Labels ==========

pub const LABEL_APP_NAME: &str = "app.oam.dev/name";
pub const LABEL_APP_NAMESPACE: &str = "app.oam.dev/namespace";
pub const LABEL_APP_COMPONENT: &str = "app.oam.dev/component";
pub const LABEL_APP_REVISION: &str = "app.oam.dev/appRevision";
pub const LABEL_APP_REVISION_HASH: &str = "app.oam.dev/app-revision-hash";
pub const LABEL_TRAIT_TYPE: &str = "trait.oam.dev/type";
pub const LABEL_TRAIT_RESOURCE: &str = "trait.oam.dev/resource";
pub const LABEL_ADDON_NAME: &str = "addons.oam.dev/name";
pub const LABEL_ADDON_REGISTRY: &str = "addons.oam.dev/registry";
pub const LABEL_CONFIG_CATALOG: &str = "config.oam.dev/catalog";
pub const LABEL_CONFIG_TYPE: &str = "config.oam.dev/type";
pub const LABEL_VELAQL_VIEW: &str = "velaql.oam.dev/view";

/// Catalog value shared by configs and config templates
pub const CONFIG_CATALOG: &str = "velacore-config";

// ========== Annotations ==========

pub const ANNOTATION_PUBLISH_VERSION: &str = "app.oam.dev/publishVersion";
pub const ANNOTATION_APP_REVISION: &str = "app.oam.dev/appRevision";
pub const ANNOTATION_REVISION_ONLY: &str = "app.oam.dev/revision-only";
pub const ANNOTATION_KUBEVELA_VERSION: &str = "oam.dev/kubevela-version";
pub const ANNOTATION_LAST_APPLIED: &str = "kubectl.kubernetes.io/last-applied-configuration";
pub const ANNOTATION_DEFINITION_DESCRIPTION: &str = "definition.oam.dev/description";
pub const ANNOTATION_ADDON_VERSION: &str = "addons.oam.dev/version";

// ========== Step and policy types ==========

pub const DEPLOY_STEP: &str = "deploy";
pub const TOPOLOGY_POLICY: &str = "topology";
pub const OVERRIDE_POLICY: &str = "override";
pub const DEBUG_POLICY: &str = "debug";

/// Policy types handled by the controller itself; they never render resources
pub const BUILTIN_POLICIES: &[&str] = &[
    TOPOLOGY_POLICY,
    OVERRIDE_POLICY,
    DEBUG_POLICY,
    "garbage-collect",
    "apply-once",
    "shared-resource",
    "take-over",
    "read-only",
    "replication",
];

// ========== Workflow step phases and reasons ==========

pub const STEP_PENDING: &str = "pending";
pub const STEP_RUNNING: &str = "running";
pub const STEP_SUSPENDING: &str = "suspending";
pub const STEP_SUCCEEDED: &str = "succeeded";
pub const STEP_FAILED: &str = "failed";
pub const STEP_SKIPPED: &str = "skipped";

pub const REASON_TERMINATE: &str = "Terminate";
pub const REASON_FAILED_AFTER_RETRIES: &str = "FailedAfterRetries";
pub const REASON_TIMEOUT: &str = "Timeout";

/// Workflow phase once every step has succeeded
pub const WORKFLOW_SUCCEEDED: &str = "succeeded";

/// Trait type label value marking an auxiliary output of a component
pub const AUXILIARY_WORKLOAD: &str = "AuxiliaryWorkload";

/// Revision name of the first revision of an application
pub fn first_revision_name(app: &str) -> String {
    format!("{}-v1", app)
}

/// Strip the trailing `-vN` segment of a revision name
pub fn app_name_from_revision(revision: &str) -> &str {
    match revision.rsplit_once('-') {
        Some((name, _)) => name,
        None => revision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_name_from_revision() {
        assert_eq!(app_name_from_revision("my-app-v3"), "my-app");
        assert_eq!(app_name_from_revision("app-v1"), "app");
        assert_eq!(app_name_from_revision("app"), "app");
    }
}
