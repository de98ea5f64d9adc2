//! Install and uninstall commands - manage the KubeVela control plane

use clap::Args;
use console::style;
use vela_core::{oam, parse_key_values};
use vela_kube::install::{self as control_plane, DEFAULT_VERSION, RELEASE_NAME};
use vela_kube::{HelmCli, InstallOptions, UninstallOptions, health};

use crate::display::{Table, confirm, or_dash, spinner, success};
use crate::error::Result;
use crate::factory::Factory;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Control plane version
    #[arg(long, default_value = DEFAULT_VERSION)]
    pub version: String,

    /// Set chart values on the command line (key=value)
    #[arg(long = "set")]
    pub set: Vec<String>,

    /// Namespace of the control plane
    #[arg(short, long, default_value = oam::SYSTEM_NAMESPACE)]
    pub namespace: String,

    /// Show the control plane deployments after installing
    #[arg(long)]
    pub detail: bool,

    /// Reuse the values of the installed release
    #[arg(long)]
    pub reuse_values: bool,

    /// Local chart to install instead of the published one
    #[arg(short, long = "file")]
    pub file: Option<String>,
}

#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Delete remaining applications as well
    #[arg(long)]
    pub force: bool,

    /// Namespace of the control plane
    #[arg(short, long, default_value = oam::SYSTEM_NAMESPACE)]
    pub namespace: String,
}

/// Run the install command
pub async fn install(factory: &Factory, args: InstallArgs) -> Result<()> {
    let mut options = InstallOptions::new(&args.version);
    options.namespace = args.namespace.clone();
    options.values = parse_key_values(&args.set)?;
    options.chart = args.file.clone();
    options.reuse_values = args.reuse_values;

    println!(
        "{} Installing KubeVela {} into namespace {}",
        style("→").blue().bold(),
        style(&args.version).cyan(),
        style(&args.namespace).yellow()
    );

    let client = factory.client().await?;
    let helm = HelmCli::new();
    let bar = spinner("Waiting for the control plane to be ready");
    let result = control_plane::install(&client, &helm, &options).await;
    bar.finish_and_clear();
    result?;

    success(format!("KubeVela control plane {} has been installed", args.version));

    if args.detail {
        let deployments = health::deployments(&client, &args.namespace, None).await?;
        let mut table = Table::new(&["NAME", "READY", "UP-TO-DATE", "AVAILABLE", "MESSAGE"]);
        for d in &deployments {
            table.add_row(vec![
                d.name.clone(),
                format!("{}/{}", d.ready, d.desired),
                d.updated.to_string(),
                d.available.to_string(),
                or_dash(d.message.as_deref().unwrap_or("")),
            ]);
        }
        println!();
        table.print();
    }
    Ok(())
}

/// Run the uninstall command
pub async fn uninstall(factory: &Factory, args: UninstallArgs) -> Result<()> {
    let client = factory.client().await?;
    let store = factory.store().await?;

    let remaining = control_plane::blocking_applications(&store, args.force).await?;
    if remaining > 0 {
        println!(
            "{} {} application(s) will be deleted along with the control plane",
            style("⚠").yellow(),
            remaining
        );
    }

    if !confirm("Would you like to uninstall KubeVela from this cluster?", args.yes)? {
        println!("Uninstall canceled");
        return Ok(());
    }

    let mut options = UninstallOptions::new(&args.namespace);
    options.force = args.force;

    println!(
        "{} Uninstalling release {} from namespace {}",
        style("→").blue().bold(),
        style(RELEASE_NAME).cyan(),
        style(&args.namespace).yellow()
    );
    let bar = spinner("Waiting for the control plane to be removed");
    let result = control_plane::uninstall(&client, &store, &HelmCli::new(), &options).await;
    bar.finish_and_clear();
    let deleted = result?;

    if deleted > 0 {
        println!("Deleted {} application(s)", deleted);
    }
    success("KubeVela control plane has been uninstalled");
    Ok(())
}
