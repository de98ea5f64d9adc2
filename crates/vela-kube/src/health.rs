//! Deployment readiness checks used while installing and removing the
//! control plane

use k8s_openapi::api::apps::v1::Deployment;
use kube::Api;
use kube::api::ListParams;

use crate::error::Result;

/// Readiness of one Deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentHealth {
    pub name: String,
    pub desired: i32,
    pub ready: i32,
    pub updated: i32,
    pub available: i32,
    /// Failing conditions, or a progress summary when unhealthy
    pub message: Option<String>,
}

impl DeploymentHealth {
    /// All replicas are ready, updated and available
    pub fn is_healthy(&self) -> bool {
        self.ready == self.desired && self.updated == self.desired && self.available == self.desired
    }
}

impl From<&Deployment> for DeploymentHealth {
    fn from(deployment: &Deployment) -> Self {
        let spec = deployment.spec.as_ref();
        let status = deployment.status.as_ref();

        let desired = spec.and_then(|s| s.replicas).unwrap_or(1);
        let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
        let updated = status.and_then(|s| s.updated_replicas).unwrap_or(0);
        let available = status.and_then(|s| s.available_replicas).unwrap_or(0);

        let mut health = Self {
            name: deployment.metadata.name.clone().unwrap_or_default(),
            desired,
            ready,
            updated,
            available,
            message: None,
        };

        if !health.is_healthy() {
            let conditions = status
                .and_then(|s| s.conditions.as_ref())
                .map(|c| {
                    c.iter()
                        .filter(|cond| cond.status == "False")
                        .filter_map(|cond| cond.message.as_ref().map(|m| format!("{}: {}", cond.type_, m)))
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .filter(|s| !s.is_empty());

            health.message = Some(conditions.unwrap_or_else(|| {
                format!(
                    "Waiting: {}/{} ready, {}/{} updated, {}/{} available",
                    ready, desired, updated, desired, available, desired
                )
            }));
        }
        health
    }
}

/// Readiness of the Deployments in a namespace, optionally label-selected
pub async fn deployments(client: &kube::Client, namespace: &str, selector: Option<&str>) -> Result<Vec<DeploymentHealth>> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let mut params = ListParams::default();
    if let Some(selector) = selector {
        params = params.labels(selector);
    }
    let list = api.list(&params).await?;
    Ok(list.items.iter().map(DeploymentHealth::from).collect())
}

/// At least one Deployment exists and all of them are healthy
pub fn all_ready(deployments: &[DeploymentHealth]) -> bool {
    !deployments.is_empty() && deployments.iter().all(DeploymentHealth::is_healthy)
}
