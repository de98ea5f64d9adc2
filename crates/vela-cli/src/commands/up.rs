//! Up command - create or update an application, or re-run an existing one

use std::time::Duration;

use clap::Args;
use console::style;
use vela_engine::CueCli;
use vela_kube::actions::{self, UpOptions};
use vela_kube::{ApplicationStore, PollConfig, poll_until};

use super::dryrun::{load_application, target_namespace};
use crate::display::{spinner, success};
use crate::error::{CliError, Result};
use crate::factory::{Factory, NamespaceArgs};

#[derive(Args, Debug)]
pub struct UpArgs {
    /// Name of an existing application to re-run
    pub name: Option<String>,

    /// Application file (`-` for stdin)
    #[arg(short, long)]
    pub file: Option<String>,

    #[command(flatten)]
    pub namespace: NamespaceArgs,

    /// Publish version of this deployment
    #[arg(long)]
    pub publish_version: Option<String>,

    /// Revision to restore when re-running by name
    #[arg(long)]
    pub revision: Option<String>,

    /// Attach a debug policy to the application
    #[arg(long)]
    pub debug_policy: bool,

    /// Wait until the application is running
    #[arg(short, long)]
    pub wait: bool,

    /// Seconds to wait with --wait
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,
}

/// Run the up command
pub async fn run(factory: &Factory, args: UpArgs) -> Result<()> {
    let (namespace, name) = match (&args.name, &args.file) {
        (Some(_), Some(_)) => return Err(CliError::input("cannot use app name and file at the same time")),
        (None, None) => return Err(CliError::input("either app name or file should be set")),
        (None, Some(file)) => {
            if args.revision.is_some() {
                return Err(CliError::input("--revision can only be used when re-running an application by name"));
            }
            deploy_file(factory, &args, file).await?
        }
        (Some(name), None) => rerun(factory, &args, name).await?,
    };

    success(format!("Application {}/{} applied.", namespace, name));

    if args.wait {
        wait_running(factory, &namespace, &name, args.timeout).await?;
        success(format!("Application {}/{} is running", namespace, name));
    }
    Ok(())
}

async fn deploy_file(factory: &Factory, args: &UpArgs, file: &str) -> Result<(String, String)> {
    let cue = CueCli::new();
    let mut warnings = std::io::stdout();
    let app = load_application(&[file.to_string()], true, &mut warnings, &cue).await?;
    let namespace = target_namespace(factory, &args.namespace, &app)?;

    let mut options = UpOptions::new(&namespace);
    if let Some(version) = &args.publish_version {
        options = options.with_publish_version(version);
    }
    if args.debug_policy {
        options = options.with_debug_policy();
    }

    println!(
        "{} Applying application from {} to namespace {}",
        style("→").blue().bold(),
        style(file).cyan(),
        style(&namespace).yellow()
    );
    let store = factory.store().await?;
    let applied = actions::deploy(&store, app, &options).await?;
    Ok((namespace, applied.metadata.name.unwrap_or_default()))
}

async fn rerun(factory: &Factory, args: &UpArgs, name: &str) -> Result<(String, String)> {
    let publish_version = args.publish_version.as_deref().ok_or_else(|| {
        CliError::input("publish-version must be set if you want to force existing application to re-run")
    })?;
    let namespace = factory.namespace(&args.namespace)?;

    let mut options = UpOptions::new(&namespace);
    if let Some(revision) = &args.revision {
        options = options.with_revision(revision);
    }
    if args.debug_policy {
        options = options.with_debug_policy();
    }

    let store = factory.store().await?;
    actions::rerun(&store, name, publish_version, &options).await?;
    Ok((namespace, name.to_string()))
}

async fn wait_running(factory: &Factory, namespace: &str, name: &str, timeout: u64) -> Result<()> {
    let store = factory.store().await?;
    let store = &store;
    let config = PollConfig::new(Duration::from_secs(2), Duration::from_secs(timeout));
    let operation = format!("waiting for application {}/{} to be running", namespace, name);

    let bar = spinner(format!("Waiting for application {} to be running", name));
    let result = poll_until(config, &operation, move || async move {
        Ok(store.get(namespace, name).await?.phase() == "running")
    })
    .await;
    bar.finish_and_clear();
    Ok(result?)
}
