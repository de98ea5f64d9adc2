//! Helm operations through the `helm` binary

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use vela_core::Values;

use crate::error::{KubeError, Result};

/// Environment variable overriding the helm binary
pub const HELM_BINARY_ENV: &str = "VELA_HELM_BINARY";

/// A release to install or upgrade
#[derive(Debug, Clone)]
pub struct HelmRelease {
    pub name: String,
    /// Chart reference: URL, local path or `repo/chart`
    pub chart: String,
    pub namespace: String,
    pub values: Values,
    pub create_namespace: bool,
    pub reuse_values: bool,
}

impl HelmRelease {
    pub fn new(name: impl Into<String>, chart: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chart: chart.into(),
            namespace: namespace.into(),
            values: Values::new(),
            create_namespace: true,
            reuse_values: false,
        }
    }

    pub fn with_values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    pub fn with_reuse_values(mut self, reuse: bool) -> Self {
        self.reuse_values = reuse;
        self
    }

    /// Arguments of `helm upgrade --install`; values are read from stdin
    pub fn upgrade_args(&self) -> Vec<String> {
        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            self.name.clone(),
            self.chart.clone(),
            "--namespace".to_string(),
            self.namespace.clone(),
        ];
        if self.create_namespace {
            args.push("--create-namespace".to_string());
        }
        if self.reuse_values {
            args.push("--reuse-values".to_string());
        }
        if !self.values.is_empty() {
            args.push("--values".to_string());
            args.push("-".to_string());
        }
        args
    }
}

/// Runs helm commands
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: String,
}

impl Default for HelmCli {
    fn default() -> Self {
        Self::new()
    }
}

impl HelmCli {
    /// Use `$VELA_HELM_BINARY`, else `helm` from PATH
    pub fn new() -> Self {
        Self {
            binary: std::env::var(HELM_BINARY_ENV).unwrap_or_else(|_| "helm".to_string()),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Install or upgrade a release; returns helm's output
    pub async fn upgrade_install(&self, release: &HelmRelease) -> Result<String> {
        let stdin = if release.values.is_empty() {
            None
        } else {
            Some(serde_yaml::to_string(release.values.inner())?)
        };
        tracing::debug!(release = %release.name, chart = %release.chart, "helm upgrade --install");
        self.run(&release.upgrade_args(), stdin.as_deref()).await
    }

    /// Uninstall a release
    pub async fn uninstall(&self, name: &str, namespace: &str) -> Result<String> {
        let args = ["uninstall", name, "--namespace", namespace].map(String::from);
        tracing::debug!(release = %name, %namespace, "helm uninstall");
        self.run(&args, None).await
    }

    async fn run(&self, args: &[String], stdin: Option<&str>) -> Result<String> {
        let command = args.first().cloned().unwrap_or_default();
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| KubeError::HelmUnavailable {
                binary: self.binary.clone(),
                message: e.to_string(),
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(KubeError::Helm {
                command,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
