//! Control plane installation through the KubeVela Helm chart

use k8s_openapi::api::apps::v1::Deployment;
use kube::Api;
use kube::api::ListParams;
use serde_json::json;
use vela_core::{Values, oam};

use crate::error::{KubeError, Result};
use crate::health;
use crate::helm::{HelmCli, HelmRelease};
use crate::store::ApplicationStore;
use crate::wait::{PollConfig, format_duration, poll_until};

/// Helm release name of the control plane
pub const RELEASE_NAME: &str = "kubevela";

/// Chart repository of the control plane
pub const CHART_REPO: &str = "https://charts.kubevela.net/core";

/// Control plane version installed when none is requested
pub const DEFAULT_VERSION: &str = "1.9.11";

/// Oldest supported Kubernetes minor version (1.x)
pub const MIN_KUBERNETES_MINOR: u64 = 19;

/// Label selecting the control plane Deployments
const RELEASE_SELECTOR: &str = "app.kubernetes.io/instance=kubevela";

/// Chart URL of a control plane version
pub fn chart_url(version: &str) -> String {
    format!("{}/vela-core-{}.tgz", CHART_REPO, version.trim_start_matches('v'))
}

/// Image tag of a control plane version, always `v`-prefixed
pub fn image_tag(version: &str) -> String {
    format!("v{}", version.trim_start_matches('v'))
}

/// Fail unless the API server reports Kubernetes >= 1.19
pub fn check_version(git_version: &str) -> Result<()> {
    let unsupported = || KubeError::UnsupportedServerVersion {
        version: git_version.to_string(),
        minimum: format!("1.{}", MIN_KUBERNETES_MINOR),
    };
    let version = semver::Version::parse(git_version.trim().trim_start_matches('v')).map_err(|_| unsupported())?;
    if version.major > 1 || (version.major == 1 && version.minor >= MIN_KUBERNETES_MINOR) {
        Ok(())
    } else {
        Err(unsupported())
    }
}

/// Check the server version of the connected cluster; returns it
pub async fn check_server_version(client: &kube::Client) -> Result<String> {
    let info = client.apiserver_version().await?;
    tracing::debug!(version = %info.git_version, "connected to Kubernetes");
    check_version(&info.git_version)?;
    Ok(info.git_version)
}

/// Version from a control plane image reference: `oamdev/vela-core:v1.9.11` -> `1.9.11`
pub fn image_version(image: &str) -> Option<String> {
    let (_, tag) = image.rsplit_once(':')?;
    if tag.contains('/') || tag.is_empty() {
        return None;
    }
    Some(tag.trim_start_matches('v').to_string())
}

/// Version of the installed control plane, read from its `vela-core` image
pub async fn control_plane_version(client: &kube::Client, namespace: &str) -> Result<Option<String>> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let list = api.list(&ListParams::default().labels(RELEASE_SELECTOR)).await?;
    let version = list
        .items
        .iter()
        .filter_map(|d| d.spec.as_ref()?.template.spec.as_ref())
        .flat_map(|pod| pod.containers.iter())
        .filter_map(|c| c.image.as_deref())
        .filter(|image| image.contains("vela-core"))
        .find_map(image_version);
    tracing::debug!(?version, %namespace, "control plane version");
    Ok(version)
}

/// Options for `vela install`
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub version: String,
    pub namespace: String,
    /// User-supplied chart values
    pub values: Values,
    /// Local chart used instead of the published one
    pub chart: Option<String>,
    pub reuse_values: bool,
    pub poll: PollConfig,
}

impl InstallOptions {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            namespace: oam::SYSTEM_NAMESPACE.to_string(),
            values: Values::new(),
            chart: None,
            reuse_values: false,
            poll: PollConfig::INSTALL,
        }
    }

    /// Release to hand to helm: the image tag follows the version unless set explicitly
    pub fn release(&self) -> Result<HelmRelease> {
        let mut values = self.values.clone();
        if values.get("image.tag").is_none() {
            values.set("image.tag", json!(image_tag(&self.version)))?;
        }
        let chart = self.chart.clone().unwrap_or_else(|| chart_url(&self.version));
        Ok(HelmRelease::new(RELEASE_NAME, chart, &self.namespace)
            .with_values(values)
            .with_reuse_values(self.reuse_values))
    }
}

/// Install or upgrade the control plane and wait for its Deployments
pub async fn install(client: &kube::Client, helm: &HelmCli, options: &InstallOptions) -> Result<()> {
    check_server_version(client).await?;
    helm.upgrade_install(&options.release()?).await?;

    let namespace = options.namespace.as_str();
    let result = poll_until(options.poll, "waiting for control plane", move || async move {
        let deployments = health::deployments(client, namespace, None).await?;
        for pending in deployments.iter().filter(|d| !d.is_healthy()) {
            tracing::debug!(deployment = %pending.name, message = pending.message.as_deref().unwrap_or(""), "not ready");
        }
        Ok(health::all_ready(&deployments))
    })
    .await;

    match result {
        Err(e) if e.is_timeout() => Err(KubeError::Timeout {
            operation: "Could not complete KubeVela control plane installation".to_string(),
            elapsed: format_duration(options.poll.timeout),
            hint: Some(format!("kubectl get pods -n {}", namespace)),
        }),
        other => other,
    }
}

/// Options for `vela uninstall`
#[derive(Debug, Clone)]
pub struct UninstallOptions {
    pub namespace: String,
    /// Delete remaining applications instead of refusing
    pub force: bool,
    pub poll: PollConfig,
}

impl UninstallOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            force: false,
            poll: PollConfig::INSTALL,
        }
    }
}

/// Applications that block uninstalling, empty when `force` is set
pub async fn blocking_applications(store: &dyn ApplicationStore, force: bool) -> Result<usize> {
    let count = store.list(None, None).await?.len();
    if count > 0 && !force {
        return Err(KubeError::ApplicationsExist { count });
    }
    Ok(count)
}

/// Delete every application, remove the release and wait for its Deployments to go
pub async fn uninstall(
    client: &kube::Client,
    store: &dyn ApplicationStore,
    helm: &HelmCli,
    options: &UninstallOptions,
) -> Result<usize> {
    let apps = store.list(None, None).await?;
    if !apps.is_empty() && !options.force {
        return Err(KubeError::ApplicationsExist { count: apps.len() });
    }

    let deleted = delete_all(store, &apps).await?;
    helm.uninstall(RELEASE_NAME, &options.namespace).await?;

    let namespace = options.namespace.as_str();
    poll_until(options.poll, "waiting for control plane removal", move || async move {
        Ok(health::deployments(client, namespace, Some(RELEASE_SELECTOR)).await?.is_empty())
    })
    .await?;
    Ok(deleted)
}

async fn delete_all(store: &dyn ApplicationStore, apps: &[vela_core::Application]) -> Result<usize> {
    let mut deleted = 0;
    for app in apps {
        let namespace = app.metadata.namespace.as_deref().unwrap_or(oam::DEFAULT_NAMESPACE);
        let name = app.metadata.name.as_deref().unwrap_or("");
        match store.delete(namespace, name).await {
            Ok(()) => deleted += 1,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }
    Ok(deleted)
}
