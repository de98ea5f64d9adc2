//! Apprev commands - inspect and publish application revisions

use clap::Subcommand;
use vela_core::ApplicationRevision;
use vela_kube::{ApplicationStore, actions};

use crate::display::{OutputFormat, Table, or_dash, print_structured, success};
use crate::error::Result;
use crate::factory::{Factory, NamespaceArgs};

#[derive(Subcommand, Debug)]
pub enum ApprevCommand {
    /// List the revisions of an application
    #[command(alias = "ls")]
    List {
        /// Application name
        app: String,

        #[command(flatten)]
        namespace: NamespaceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Show a revision
    Get {
        /// Revision name, e.g. `my-app-v2`
        revision: String,

        #[command(flatten)]
        namespace: NamespaceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        output: OutputFormat,
    },

    /// Set the publish version of an application
    Publish {
        /// Application name
        app: String,

        /// Publish version
        version: String,

        #[command(flatten)]
        namespace: NamespaceArgs,
    },

    /// Remove the publish version of an application
    Unpublish {
        /// Application name
        app: String,

        #[command(flatten)]
        namespace: NamespaceArgs,
    },
}

/// Run an apprev subcommand
pub async fn run(factory: &Factory, command: ApprevCommand) -> Result<()> {
    match command {
        ApprevCommand::List { app, namespace, output } => {
            let namespace = factory.namespace(&namespace)?;
            let revisions = factory.store().await?.list_revisions(&namespace, &app).await?;
            if print_structured(&revisions, output)? {
                return Ok(());
            }
            if revisions.is_empty() {
                println!("No revisions found for application {}/{}", namespace, app);
                return Ok(());
            }
            revision_table(&revisions).print();
        }
        ApprevCommand::Get {
            revision,
            namespace,
            output,
        } => {
            let namespace = factory.namespace(&namespace)?;
            let revision = factory.store().await?.get_revision(&namespace, &revision).await?;
            if !print_structured(&revision, output)? {
                revision_table(std::slice::from_ref(&revision)).print();
            }
        }
        ApprevCommand::Publish { app, version, namespace } => {
            let namespace = factory.namespace(&namespace)?;
            actions::publish(&factory.store().await?, &namespace, &app, &version).await?;
            success(format!("application {}/{} published with version {}", namespace, app, version));
        }
        ApprevCommand::Unpublish { app, namespace } => {
            let namespace = factory.namespace(&namespace)?;
            if actions::unpublish(&factory.store().await?, &namespace, &app).await? {
                success(format!("application {}/{} unpublished", namespace, app));
            } else {
                println!("application {}/{} has no publish version", namespace, app);
            }
        }
    }
    Ok(())
}

fn revision_table(revisions: &[ApplicationRevision]) -> Table {
    let mut table = Table::new(&["NAME", "PUBLISH_VERSION", "SUCCEEDED", "HASH", "BEGIN_TIME", "STATUS", "SIZE"]);
    for revision in revisions {
        table.add_row(vec![
            revision.metadata.name.clone().unwrap_or_default(),
            or_dash(revision.publish_version()),
            revision.succeeded().to_string(),
            or_dash(revision.hash()),
            or_dash(revision.begin_time()),
            or_dash(revision.workflow_phase()),
            format_size(revision.size()),
        ]);
    }
    table
}

/// Byte count in the largest whole unit, e.g. `1.5 KiB`
fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }
}
