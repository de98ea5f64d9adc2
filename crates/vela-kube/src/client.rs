//! Cluster connection

use std::path::Path;

use kube::Config;
use kube::config::{KubeConfigOptions, Kubeconfig};

use crate::error::{KubeError, Result};

/// Build a client from an explicit kubeconfig and/or context, else infer one
/// (in-cluster service account or `$KUBECONFIG` / `~/.kube/config`)
pub async fn connect(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<kube::Client> {
    let options = KubeConfigOptions {
        context: context.map(String::from),
        ..Default::default()
    };
    let to_error = |e: &dyn std::fmt::Display| KubeError::Kubeconfig(e.to_string());

    let config = match kubeconfig {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| to_error(&e))?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| to_error(&e))?
        }
        None if context.is_some() => Config::from_kubeconfig(&options).await.map_err(|e| to_error(&e))?,
        None => Config::infer().await.map_err(|e| to_error(&e))?,
    };
    tracing::debug!(cluster = %config.cluster_url, "connecting");
    Ok(kube::Client::try_from(config)?)
}
