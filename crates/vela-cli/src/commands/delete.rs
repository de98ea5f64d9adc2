//! Delete command - remove applications from the cluster

use clap::Args;
use console::style;
use vela_kube::actions::{self, DeleteOutcome};
use vela_kube::{ApplicationStore, PollConfig};

use crate::display::{confirm, spinner, success};
use crate::error::{CliError, Result};
use crate::factory::{Factory, NamespaceArgs};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Applications to delete
    pub names: Vec<String>,

    #[command(flatten)]
    pub namespace: NamespaceArgs,

    /// Delete every application in the namespace
    #[arg(long)]
    pub all: bool,

    /// Wait until the applications are gone
    #[arg(short, long)]
    pub wait: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Remove finalizers so that deletion cannot block
    #[arg(long)]
    pub force: bool,
}

/// Run the delete command
pub async fn run(factory: &Factory, args: DeleteArgs) -> Result<()> {
    if args.names.is_empty() && !args.all {
        return Err(CliError::input_with_help(
            "no application provided for deletion",
            "pass application names, or --all to delete every application in the namespace",
        ));
    }

    let namespace = factory.namespace(&args.namespace)?;
    let store = factory.store().await?;

    let names: Vec<String> = if args.all {
        store
            .list(Some(namespace.as_str()), None)
            .await?
            .into_iter()
            .filter_map(|app| app.metadata.name)
            .collect()
    } else {
        args.names.clone()
    };
    if names.is_empty() {
        println!("No applications found in namespace {}", namespace);
        return Ok(());
    }

    let wait = args.wait.then_some(PollConfig::DELETE);
    for name in &names {
        let prompt = format!("Are you sure to delete the application {}/{}", namespace, name);
        if !confirm(&prompt, args.yes)? {
            println!("{} skipped application {}/{}", style("→").blue().bold(), namespace, name);
            continue;
        }

        if args.force && actions::remove_finalizers(&store, &namespace, name).await? {
            tracing::info!(%namespace, %name, "removed finalizers");
        }

        let bar = args.wait.then(|| spinner(format!("Deleting application {}/{}", namespace, name)));
        let result = actions::delete_application(&store, &namespace, name, wait).await;
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        match result? {
            DeleteOutcome::Deleted => success(format!("application {}/{} deleted", namespace, name)),
            DeleteOutcome::AlreadyDeleted => println!("application {}/{} already deleted", namespace, name),
        }
    }
    Ok(())
}
