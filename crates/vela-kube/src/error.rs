//! Error types for vela-kube

use thiserror::Error;

/// Result type for vela-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur during cluster operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Application not found
    #[error("application {namespace}/{name} not found")]
    ApplicationNotFound { name: String, namespace: String },

    /// Application revision not found
    #[error("application revision {namespace}/{name} not found")]
    RevisionNotFound { name: String, namespace: String },

    /// Component not found in an application
    #[error("component {component} not found in application {app}")]
    ComponentNotFound { app: String, component: String },

    /// No pod matched the application selection
    #[error("no pod found for application {app}{}", .component.as_ref().map(|c| format!(" component {}", c)).unwrap_or_default())]
    PodNotFound {
        app: String,
        component: Option<String>,
    },

    /// Workload already belongs to an application
    #[error("{kind} {name} is already managed by application {app}")]
    AlreadyManaged {
        kind: String,
        name: String,
        app: String,
    },

    /// Addon is not enabled
    #[error("addon {0} is not enabled")]
    AddonNotEnabled(String),

    /// Applications still exist when uninstalling
    #[error("{count} application(s) still exist in the cluster\nHint: delete them first or run with --force")]
    ApplicationsExist { count: usize },

    /// Config template not found
    #[error("config template {0} not found")]
    ConfigTemplateNotFound(String),

    /// VelaQL view not found
    #[error("view {0} not found")]
    ViewNotFound(String),

    /// Invalid VelaQL view name
    #[error("invalid view name {0:?}: must consist of lower case alphanumeric characters or '-'")]
    InvalidViewName(String),

    /// VelaQL query failed
    #[error("query failed: {0}")]
    Query(String),

    /// Workflow state does not allow the operation
    #[error("{0}")]
    Workflow(String),

    /// Helm binary could not be started
    #[error("failed to run {binary}: {message}\nHint: install Helm from https://helm.sh/docs/intro/install/")]
    HelmUnavailable { binary: String, message: String },

    /// Helm command exited with an error
    #[error("helm {command} failed: {message}")]
    Helm { command: String, message: String },

    /// Cluster version below the supported minimum
    #[error("Kubernetes version {version} is not supported, requires >= {minimum}")]
    UnsupportedServerVersion { version: String, minimum: String },

    /// Kubeconfig could not be loaded
    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(String),

    /// Stream to a pod could not be opened
    #[error("stream error: {0}")]
    Stream(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Timeout, with an optional hint for the user
    #[error("{operation}: timed out after {elapsed}{}", .hint.as_ref().map(|h| format!("\nHint: {}", h)).unwrap_or_default())]
    Timeout {
        operation: String,
        elapsed: String,
        hint: Option<String>,
    },

    /// Rendering error from the engine
    #[error("render error: {0}")]
    Render(String),

    /// Resource model error
    #[error("{0}")]
    Core(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<vela_core::CoreError> for KubeError {
    fn from(e: vela_core::CoreError) -> Self {
        KubeError::Core(e.to_string())
    }
}

impl From<vela_engine::EngineError> for KubeError {
    fn from(e: vela_engine::EngineError) -> Self {
        KubeError::Render(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a not-found error, from the API or a store
    pub fn is_not_found(&self) -> bool {
        match self {
            KubeError::Api(kube::Error::Api(resp)) => resp.code == 404,
            KubeError::ApplicationNotFound { .. } | KubeError::RevisionNotFound { .. } => true,
            _ => false,
        }
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 409)
    }

    /// Check if this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, KubeError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> KubeError {
        KubeError::Api(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "NotFound".to_string(),
            code,
        }))
    }

    #[test]
    fn test_not_found_and_conflict() {
        assert!(api_error(404).is_not_found());
        assert!(!api_error(404).is_conflict());
        assert!(api_error(409).is_conflict());
        assert!(
            KubeError::ApplicationNotFound {
                name: "a".into(),
                namespace: "default".into()
            }
            .is_not_found()
        );
        assert!(!KubeError::AddonNotEnabled("x".into()).is_not_found());
    }

    #[test]
    fn test_timeout_message_with_hint() {
        let err = KubeError::Timeout {
            operation: "Could not complete KubeVela control plane installation".to_string(),
            elapsed: "10m".to_string(),
            hint: Some("kubectl get pods -n vela-system".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Could not complete KubeVela control plane installation: timed out after 10m\nHint: kubectl get pods -n vela-system"
        );
        assert!(err.is_timeout());
    }

    #[test]
    fn test_pod_not_found_message() {
        let err = KubeError::PodNotFound {
            app: "web".into(),
            component: Some("frontend".into()),
        };
        assert_eq!(err.to_string(), "no pod found for application web component frontend");
    }
}
