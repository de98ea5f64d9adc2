//! Shared command context
//!
//! The `Factory` owns the global connection flags and builds the cluster
//! client on first use, so that offline commands never touch a kubeconfig.

use std::path::PathBuf;

use clap::Args;
use tokio::sync::OnceCell;
use vela_kube::ClusterStore;
use vela_repo::EnvConfig;

use crate::error::{CliError, Result};

/// `-n/--namespace` and `-e/--env`
#[derive(Args, Debug, Clone, Default)]
pub struct NamespaceArgs {
    /// Namespace, overrides the env
    #[arg(short, long, env = "VELA_NAMESPACE")]
    pub namespace: Option<String>,

    /// Env whose namespace is used
    #[arg(short, long = "env")]
    pub env: Option<String>,
}

/// Explicit namespace, else the named env, else the current env
pub fn resolve_namespace(args: &NamespaceArgs, envs: &EnvConfig) -> Result<String> {
    if let Some(namespace) = args.namespace.as_deref().filter(|n| !n.is_empty()) {
        return Ok(namespace.to_string());
    }
    if let Some(env) = &args.env {
        return Ok(envs.get(env)?.namespace);
    }
    Ok(envs.current().namespace)
}

pub struct Factory {
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
    client: OnceCell<kube::Client>,
}

impl Factory {
    pub fn new(kubeconfig: Option<PathBuf>, context: Option<String>) -> Self {
        Self {
            kubeconfig,
            context,
            client: OnceCell::new(),
        }
    }

    /// Cluster client, connected on first use
    pub async fn client(&self) -> Result<kube::Client> {
        let client = self
            .client
            .get_or_try_init(|| vela_kube::connect(self.kubeconfig.as_deref(), self.context.as_deref()))
            .await
            .map_err(|e| CliError::Cluster {
                message: e.to_string(),
                help: Some("check your kubeconfig, or pass --kubeconfig / --context".to_string()),
            })?;
        Ok(client.clone())
    }

    pub async fn store(&self) -> Result<ClusterStore> {
        Ok(ClusterStore::new(self.client().await?))
    }

    pub fn home(&self) -> Result<PathBuf> {
        Ok(vela_repo::vela_home()?)
    }

    pub fn envs(&self) -> Result<EnvConfig> {
        Ok(EnvConfig::load(&self.home()?)?)
    }

    pub fn namespace(&self, args: &NamespaceArgs) -> Result<String> {
        if args.namespace.as_deref().is_some_and(|n| !n.is_empty()) {
            return resolve_namespace(args, &EnvConfig::default());
        }
        resolve_namespace(args, &self.envs()?)
    }
}
