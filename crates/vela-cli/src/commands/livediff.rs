//! Live-diff command - compare a local application with the deployed one

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use vela_engine::{CueCli, DiffPrinter, Renderer, build_manifest, diff_manifests};
use vela_kube::ApplicationStore;

use super::blocking;
use super::dryrun::{load_application, load_catalog, target_namespace};
use crate::error::{CliError, Result};
use crate::factory::{Factory, NamespaceArgs};

#[derive(Args, Debug)]
pub struct LiveDiffArgs {
    /// Application, policy and workflow files (`-` for stdin)
    #[arg(short, long = "file", required = true)]
    pub files: Vec<String>,

    /// Compare with this application revision instead of the live application
    #[arg(short, long)]
    pub revision: Option<String>,

    /// Unchanged lines shown around each change
    #[arg(short = 'c', long = "context-lines", default_value_t = 3)]
    pub context: usize,

    /// Additional definition files or directories
    #[arg(short, long = "definitions")]
    pub definitions: Vec<PathBuf>,

    #[command(flatten)]
    pub namespace: NamespaceArgs,
}

/// Run the live-diff command
pub async fn run(factory: &Factory, args: LiveDiffArgs) -> Result<()> {
    let cue = CueCli::new();
    let mut out = Vec::new();

    let mut local = load_application(&args.files, true, &mut out, &cue).await?;
    let namespace = target_namespace(factory, &args.namespace, &local)?;
    local.metadata.namespace = Some(namespace.clone());
    let name = local
        .metadata
        .name
        .clone()
        .ok_or_else(|| CliError::input("the application has no name"))?;

    let store = factory.store().await?;
    let live = match &args.revision {
        Some(revision) => {
            let snapshot = store.get_revision(&namespace, revision).await?;
            if snapshot.app_name() != name {
                return Err(CliError::input(format!(
                    "revision {} belongs to application {}, not {}",
                    revision,
                    snapshot.app_name(),
                    name
                )));
            }
            snapshot.spec.application
        }
        None => store.get(&namespace, &name).await?,
    };

    let catalog = load_catalog(factory, &namespace, &args.definitions, false, &cue).await?;
    let (base, compare) = blocking(move || {
        let renderer = Renderer::new(&catalog, &cue);
        let base = build_manifest(&live, &renderer.render(&live)?)?;
        let compare = build_manifest(&local, &renderer.render(&local)?)?;
        Ok((base, compare))
    })
    .await?;
    let diff = diff_manifests(&base, &compare);
    DiffPrinter::new(args.context).print(&diff, &mut out)?;

    std::io::stdout().write_all(&out)?;
    Ok(())
}
