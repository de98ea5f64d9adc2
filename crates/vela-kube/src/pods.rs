//! Pods of an application: selection, exec, logs and port forwarding

use std::net::SocketAddr;

use futures::{AsyncBufReadExt, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::Api;
use kube::api::{AttachParams, ListParams, LogParams};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use vela_core::oam;

use crate::error::{KubeError, Result};

/// Label selector of the pods of an application or one of its components
pub fn pod_selector(app: &str, component: Option<&str>) -> String {
    match component {
        Some(component) => format!("{}={},{}={}", oam::LABEL_APP_NAME, app, oam::LABEL_APP_COMPONENT, component),
        None => format!("{}={}", oam::LABEL_APP_NAME, app),
    }
}

/// Prefer a running pod, then the first one
pub fn pick_pod<'a>(pods: &'a [Pod], name: Option<&str>) -> Option<&'a Pod> {
    if let Some(name) = name {
        return pods.iter().find(|p| p.metadata.name.as_deref() == Some(name));
    }
    pods.iter()
        .find(|p| p.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Running"))
        .or_else(|| pods.first())
}

/// Exit code carried by an exec status
pub fn exit_code(status: &Status) -> i32 {
    if status.status.as_deref() == Some("Success") {
        return 0;
    }
    status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| causes.iter().find(|c| c.reason.as_deref() == Some("ExitCode")))
        .and_then(|c| c.message.as_deref())
        .and_then(|m| m.parse().ok())
        .unwrap_or(1)
}

/// Parse `local[:remote]`; the remote port defaults to the local one
pub fn parse_port_mapping(mapping: &str) -> Result<(u16, u16)> {
    let invalid = || KubeError::InvalidConfig(format!("invalid port mapping {:?}, expected local[:remote]", mapping));
    let (local, remote) = match mapping.split_once(':') {
        Some((l, r)) => (l, r),
        None => (mapping, mapping),
    };
    let local: u16 = local.parse().map_err(|_| invalid())?;
    let remote: u16 = remote.parse().map_err(|_| invalid())?;
    if remote == 0 {
        return Err(invalid());
    }
    Ok((local, remote))
}

/// Options for streaming logs
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub container: Option<String>,
    pub follow: bool,
    pub tail: Option<i64>,
}

/// Access to the pods of applications
pub struct PodClient {
    client: kube::Client,
    namespace: String,
}

impl PodClient {
    pub fn new(client: kube::Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn api(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    /// Pod of an application (or component) to operate on
    pub async fn find(&self, app: &str, component: Option<&str>, pod: Option<&str>) -> Result<Pod> {
        let selector = pod_selector(app, component);
        tracing::debug!(namespace = %self.namespace, %selector, "listing pods");
        let pods = self.api().list(&ListParams::default().labels(&selector)).await?.items;
        pick_pod(&pods, pod).cloned().ok_or_else(|| KubeError::PodNotFound {
            app: app.to_string(),
            component: component.map(String::from),
        })
    }

    /// Run a command in a pod, wiring the local stdio; returns its exit code
    pub async fn exec(&self, pod: &str, container: Option<&str>, command: &[String], tty: bool) -> Result<i32> {
        let mut params = AttachParams::default().stdin(true).stdout(true).stderr(!tty).tty(tty);
        if let Some(container) = container {
            params = params.container(container);
        }
        let mut process = self.api().exec(pod, command.to_vec(), &params).await?;

        if let Some(mut input) = process.stdin() {
            tokio::spawn(async move {
                let mut stdin = tokio::io::stdin();
                if tokio::io::copy(&mut stdin, &mut input).await.is_ok() {
                    let _ = input.shutdown().await;
                }
            });
        }

        let status = process.take_status();
        let stdout = process.stdout();
        let stderr = process.stderr();
        let copy_out = async {
            if let Some(mut out) = stdout {
                tokio::io::copy(&mut out, &mut tokio::io::stdout()).await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let copy_err = async {
            if let Some(mut err) = stderr {
                tokio::io::copy(&mut err, &mut tokio::io::stderr()).await?;
            }
            Ok::<_, std::io::Error>(())
        };
        tokio::try_join!(copy_out, copy_err)?;

        let code = match status {
            Some(status) => status.await.as_ref().map(exit_code).unwrap_or(0),
            None => 0,
        };
        process.join().await.map_err(|e| KubeError::Stream(e.to_string()))?;
        Ok(code)
    }

    /// Stream the logs of a pod line by line into `out`
    pub async fn logs<W: std::io::Write>(&self, pod: &str, options: &LogOptions, out: &mut W) -> Result<()> {
        let params = LogParams {
            container: options.container.clone(),
            follow: options.follow,
            tail_lines: options.tail,
            ..Default::default()
        };
        let reader = self.api().log_stream(pod, &params).await?;
        let mut lines = std::pin::pin!(reader.lines());
        while let Some(line) = lines.try_next().await? {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }

    /// Forward connections accepted on `listener` to `remote` on the pod until Ctrl-C
    pub async fn port_forward(&self, pod: &str, listener: TcpListener, remote: u16) -> Result<()> {
        tracing::info!(%pod, address = ?listener.local_addr().ok(), remote, "forwarding");
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (mut connection, peer) = accepted?;
                    let api = self.api();
                    let pod = pod.to_string();
                    tokio::spawn(async move {
                        if let Err(e) = forward_connection(api, &pod, remote, &mut connection).await {
                            tracing::warn!(%peer, "port forward failed: {}", e);
                        }
                    });
                }
                _ = tokio::signal::ctrl_c() => return Ok(()),
            }
        }
    }
}

/// Listen on the loopback interface; port 0 picks a free port
pub async fn bind_local(port: u16) -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let address = listener.local_addr()?;
    Ok((listener, address))
}

async fn forward_connection(api: Api<Pod>, pod: &str, port: u16, connection: &mut tokio::net::TcpStream) -> Result<()> {
    let mut forwarder = api.portforward(pod, &[port]).await?;
    let mut upstream = forwarder
        .take_stream(port)
        .ok_or_else(|| KubeError::Stream(format!("port {} not available on pod {}", port, pod)))?;
    tokio::io::copy_bidirectional(connection, &mut upstream).await?;
    drop(upstream);
    forwarder.join().await.map_err(|e| KubeError::Stream(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod(name: &str, phase: &str) -> Pod {
        serde_json::from_value(json!({
            "metadata": {"name": name},
            "status": {"phase": phase}
        }))
        .unwrap()
    }

    #[test]
    fn test_pod_selector() {
        assert_eq!(pod_selector("web", None), "app.oam.dev/name=web");
        assert_eq!(
            pod_selector("web", Some("frontend")),
            "app.oam.dev/name=web,app.oam.dev/component=frontend"
        );
    }

    #[test]
    fn test_pick_pod() {
        let pods = vec![pod("web-1", "Pending"), pod("web-2", "Running")];
        assert_eq!(pick_pod(&pods, None).unwrap().metadata.name.as_deref(), Some("web-2"));
        assert_eq!(pick_pod(&pods, Some("web-1")).unwrap().metadata.name.as_deref(), Some("web-1"));
        assert!(pick_pod(&pods, Some("web-3")).is_none());
        assert!(pick_pod(&[], None).is_none());
        let pending = vec![pod("web-1", "Pending")];
        assert_eq!(pick_pod(&pending, None).unwrap().metadata.name.as_deref(), Some("web-1"));
    }

    #[test]
    fn test_exit_code() {
        let success: Status = serde_json::from_value(json!({"status": "Success"})).unwrap();
        assert_eq!(exit_code(&success), 0);

        let failure: Status = serde_json::from_value(json!({
            "status": "Failure",
            "reason": "NonZeroExitCode",
            "details": {"causes": [{"reason": "ExitCode", "message": "42"}]}
        }))
        .unwrap();
        assert_eq!(exit_code(&failure), 42);
    }

    #[test]
    fn test_parse_port_mapping() {
        assert_eq!(parse_port_mapping("8080:80").unwrap(), (8080, 80));
        assert_eq!(parse_port_mapping("9000").unwrap(), (9000, 9000));
        assert_eq!(parse_port_mapping("0:80").unwrap(), (0, 80));
        assert!(parse_port_mapping("80:abc").is_err());
        assert!(parse_port_mapping("8080:0").is_err());
    }
}
