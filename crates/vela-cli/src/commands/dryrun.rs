//! Dry-run command - render an application without deploying it

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use vela_core::{Application, assemble};
use vela_engine::{CueCli, DefinitionCatalog, Renderer, decode_documents, execute_with_policies};
use vela_kube::{ApplicationStore, DefinitionClient};
use vela_repo::read_sources;

use super::blocking;
use crate::error::Result;
use crate::factory::{Factory, NamespaceArgs};

#[derive(Args, Debug)]
pub struct DryRunArgs {
    /// Application, policy and workflow files (`-` for stdin)
    #[arg(short, long = "file", required = true)]
    pub files: Vec<String>,

    /// Merge standalone policies and workflows into the application
    #[arg(long)]
    pub merge: bool,

    /// Definition files or directories
    #[arg(short, long = "definitions")]
    pub definitions: Vec<PathBuf>,

    /// Use only local definitions, never contact the cluster
    #[arg(long)]
    pub offline: bool,

    /// Validate the application with a server-side dry-run
    #[arg(long)]
    pub validate: bool,

    #[command(flatten)]
    pub namespace: NamespaceArgs,
}

/// Read, decode and assemble the application from input files
pub(crate) async fn load_application<W: Write>(
    files: &[String],
    merge: bool,
    warnings: &mut W,
    cue: &CueCli,
) -> Result<Application> {
    let sources = read_sources(files).await?;
    let cue = cue.clone();
    let docs = blocking(move || {
        let mut docs = Vec::new();
        for (name, data) in sources {
            docs.extend(decode_documents(&name, &data, &cue)?);
        }
        Ok(docs)
    })
    .await?;
    Ok(assemble(&docs, merge, warnings)?)
}

/// Namespace of an input application: flags win over the file
pub(crate) fn target_namespace(factory: &Factory, args: &NamespaceArgs, app: &Application) -> Result<String> {
    let explicit = args.namespace.is_some() || args.env.is_some();
    match app.metadata.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        Some(namespace) if !explicit => Ok(namespace.to_string()),
        _ => factory.namespace(args),
    }
}

/// Definitions from `-d` paths, on top of the cluster's unless offline
pub(crate) async fn load_catalog(
    factory: &Factory,
    namespace: &str,
    paths: &[PathBuf],
    offline: bool,
    cue: &CueCli,
) -> Result<DefinitionCatalog> {
    let (paths, cue) = (paths.to_vec(), cue.clone());
    let local = blocking(move || Ok(DefinitionCatalog::load_paths(&paths, &cue)?)).await?;
    if offline {
        return Ok(local);
    }
    let mut catalog = DefinitionClient::new(factory.client().await?).catalog(namespace).await?;
    catalog.overlay(local);
    Ok(catalog)
}

/// Run the dry-run command
pub async fn run(factory: &Factory, args: DryRunArgs) -> Result<()> {
    let cue = CueCli::new();
    let mut out = Vec::new();

    let mut app = load_application(&args.files, args.merge, &mut out, &cue).await?;
    let namespace = target_namespace(factory, &args.namespace, &app)?;
    app.metadata.namespace = Some(namespace.clone());

    let catalog = load_catalog(factory, &namespace, &args.definitions, args.offline, &cue).await?;
    tracing::debug!(definitions = catalog.len(), offline = args.offline, "loaded definitions");

    if args.validate {
        factory.store().await?.validate(&app).await?;
    }

    let out = blocking(move || {
        let renderer = Renderer::new(&catalog, &cue);
        execute_with_policies(&renderer, &app, &mut out)?;
        Ok(out)
    })
    .await?;

    std::io::stdout().write_all(&out)?;
    Ok(())
}
