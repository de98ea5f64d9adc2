//! Exec, port-forward and logs commands - work with the pods of an application

use clap::Args;
use console::style;
use vela_kube::PodClient;
use vela_kube::pods::{LogOptions, bind_local, parse_port_mapping};

use crate::error::Result;
use crate::factory::{Factory, NamespaceArgs};

/// Pod selection shared by the pod commands
#[derive(Args, Debug, Clone)]
pub struct PodSelection {
    /// Application name
    pub app: String,

    /// Component of the application
    #[arg(short, long)]
    pub component: Option<String>,

    /// Pod name, when the component has several
    #[arg(long)]
    pub pod: Option<String>,

    #[command(flatten)]
    pub namespace: NamespaceArgs,
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    #[command(flatten)]
    pub selection: PodSelection,

    /// Container in the pod
    #[arg(long)]
    pub container: Option<String>,

    /// Allocate a terminal
    #[arg(short, long)]
    pub tty: bool,

    /// Command to run
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PortForwardArgs {
    #[command(flatten)]
    pub selection: PodSelection,

    /// Port mapping `local[:remote]`
    pub ports: String,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    #[command(flatten)]
    pub selection: PodSelection,

    /// Container in the pod
    #[arg(long)]
    pub container: Option<String>,

    /// Follow the log stream
    #[arg(short, long)]
    pub follow: bool,

    /// Number of recent lines to show
    #[arg(long)]
    pub tail: Option<i64>,
}

/// Client for the selection's namespace and the name of the chosen pod
async fn select_pod(factory: &Factory, selection: &PodSelection) -> Result<(PodClient, String)> {
    let namespace = factory.namespace(&selection.namespace)?;
    let pods = PodClient::new(factory.client().await?, namespace);
    let pod = pods
        .find(&selection.app, selection.component.as_deref(), selection.pod.as_deref())
        .await?;
    let name = pod.metadata.name.unwrap_or_default();
    tracing::debug!(pod = %name, "selected pod");
    Ok((pods, name))
}

/// Run the exec command; returns the exit code of the remote command
pub async fn exec(factory: &Factory, args: ExecArgs) -> Result<i32> {
    let (pods, pod) = select_pod(factory, &args.selection).await?;
    Ok(pods.exec(&pod, args.container.as_deref(), &args.command, args.tty).await?)
}

/// Run the port-forward command until interrupted
pub async fn port_forward(factory: &Factory, args: PortForwardArgs) -> Result<()> {
    let (local, remote) = parse_port_mapping(&args.ports)?;
    let (pods, pod) = select_pod(factory, &args.selection).await?;
    let (listener, address) = bind_local(local).await?;

    println!(
        "{} Forwarding from {} -> {} (pod {})",
        style("→").blue().bold(),
        style(address).cyan(),
        remote,
        pod
    );
    println!("Press Ctrl-C to stop");
    pods.port_forward(&pod, listener, remote).await?;
    Ok(())
}

/// Run the logs command
pub async fn logs(factory: &Factory, args: LogsArgs) -> Result<()> {
    let (pods, pod) = select_pod(factory, &args.selection).await?;
    let options = LogOptions {
        container: args.container,
        follow: args.follow,
        tail: args.tail,
    };
    let mut out = std::io::stdout();
    pods.logs(&pod, &options, &mut out).await?;
    Ok(())
}
