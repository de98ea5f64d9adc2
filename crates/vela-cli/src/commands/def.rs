//! Definition commands - list, inspect, render and vet component, trait, policy and workflow-step definitions

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use vela_core::{Definition, DefinitionKind, InputDocument};
use vela_engine::{CueCli, CueRuntime, decode_documents};
use vela_kube::DefinitionClient;

use super::blocking;
use crate::display::{OutputFormat, Table, or_dash, print_structured, success};
use crate::error::{CliError, Result};
use crate::factory::{Factory, NamespaceArgs};

#[derive(Args, Debug)]
pub struct TraitArgs {
    /// Only traits that apply to this workload type
    #[arg(short = 't', long = "type")]
    pub workload: Option<String>,

    #[command(flatten)]
    pub namespace: NamespaceArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Args, Debug)]
pub struct ComponentArgs {
    #[command(flatten)]
    pub namespace: NamespaceArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum DefCommand {
    /// List definitions
    #[command(alias = "ls")]
    List {
        /// Definition type: component, trait, policy or workflow-step
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        #[command(flatten)]
        namespace: NamespaceArgs,
    },

    /// Show a definition
    Get {
        /// Definition name
        name: String,

        /// Definition type: component, trait, policy or workflow-step
        #[arg(short = 't', long = "type")]
        kind: Option<String>,

        #[command(flatten)]
        namespace: NamespaceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        output: OutputFormat,
    },

    /// Render a definition file (CUE or YAML) into Kubernetes YAML
    Render {
        /// Definition file
        file: PathBuf,

        /// Write the YAML to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate definition files without touching the cluster
    Vet {
        /// Definition files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Decode a file and keep only its definition documents
fn definition_documents(path: &Path, cue: &dyn CueRuntime) -> Result<Vec<InputDocument>> {
    let data = std::fs::read(path)?;
    let docs: Vec<InputDocument> = decode_documents(&path.display().to_string(), &data, cue)?
        .into_iter()
        .filter(|doc| DefinitionKind::from_resource_kind(&doc.type_meta().kind).is_some())
        .collect();
    if docs.is_empty() {
        return Err(CliError::input(format!("no definition found in {}", path.display())));
    }
    Ok(docs)
}

/// Kubernetes YAML for every definition in a file
fn render_file(path: &Path, cue: &dyn CueRuntime) -> Result<String> {
    let mut rendered = Vec::new();
    for doc in definition_documents(path, cue)? {
        Definition::from_document(&doc)?;
        rendered.push(serde_yaml::to_string(&doc.content)?);
    }
    Ok(rendered.join("---\n"))
}

/// Decode every definition in a file, failing on the first invalid one
fn vet_file(path: &Path, cue: &dyn CueRuntime) -> Result<Vec<Definition>> {
    definition_documents(path, cue)?
        .iter()
        .map(|doc| Ok(Definition::from_document(doc)?))
        .collect()
}

fn parse_kind(kind: Option<&str>) -> Result<Option<DefinitionKind>> {
    kind.map(|k| {
        DefinitionKind::parse(k).ok_or_else(|| {
            let valid: Vec<&str> = DefinitionKind::ALL.iter().map(|k| k.as_str()).collect();
            CliError::input_with_help(
                format!("unknown definition type {}", k),
                format!("valid types are {}", valid.join(", ")),
            )
        })
    })
    .transpose()
}

/// Whether a trait may be attached to a workload type
fn applies_to(definition: &Definition, workload: &str) -> bool {
    definition.applies_to.is_empty()
        || definition
            .applies_to
            .iter()
            .any(|t| t == "*" || t == workload || t.split('.').next() == Some(workload))
}

fn sorted(mut definitions: Vec<Definition>) -> Vec<Definition> {
    definitions.sort_by(|a, b| a.name.cmp(&b.name));
    definitions
}

/// Run the trait command
pub async fn traits(factory: &Factory, args: TraitArgs) -> Result<()> {
    let namespace = factory.namespace(&args.namespace)?;
    let client = DefinitionClient::new(factory.client().await?);
    let definitions: Vec<Definition> = sorted(client.list(DefinitionKind::Trait, &namespace).await?)
        .into_iter()
        .filter(|d| args.workload.as_deref().is_none_or(|w| applies_to(d, w)))
        .collect();

    if print_structured(&definitions, args.output)? {
        return Ok(());
    }
    trait_table(&definitions).print();
    Ok(())
}

fn trait_table(definitions: &[Definition]) -> Table {
    let mut table = Table::new(&["NAME", "APPLIES-TO"]);
    for d in definitions {
        let applies = if d.applies_to.is_empty() { "*".to_string() } else { d.applies_to.join(", ") };
        table.add_row(vec![d.name.clone(), applies]);
    }
    table
}

/// Run the component command
pub async fn components(factory: &Factory, args: ComponentArgs) -> Result<()> {
    let namespace = factory.namespace(&args.namespace)?;
    let client = DefinitionClient::new(factory.client().await?);
    let definitions = sorted(client.list(DefinitionKind::Component, &namespace).await?);

    if print_structured(&definitions, args.output)? {
        return Ok(());
    }
    component_table(&definitions).print();
    Ok(())
}

fn component_table(definitions: &[Definition]) -> Table {
    let mut table = Table::new(&["NAME", "DEFINITION", "DESCRIPTION"]);
    for d in definitions {
        let workload = d
            .workload
            .as_ref()
            .map(|w| format!("{}.{}", w.kind.to_lowercase(), w.api_version))
            .unwrap_or_default();
        table.add_row(vec![d.name.clone(), or_dash(&workload), or_dash(&d.description)]);
    }
    table
}

/// Run a def subcommand
pub async fn run(factory: &Factory, command: DefCommand) -> Result<()> {
    match command {
        DefCommand::List { kind, namespace } => {
            let kinds = match parse_kind(kind.as_deref())? {
                Some(kind) => vec![kind],
                None => DefinitionKind::ALL.to_vec(),
            };
            let namespace = factory.namespace(&namespace)?;
            let client = DefinitionClient::new(factory.client().await?);

            let mut table = Table::new(&["NAME", "TYPE", "NAMESPACE", "DESCRIPTION"]);
            for kind in kinds {
                for d in sorted(client.list(kind, &namespace).await?) {
                    table.add_row(vec![
                        d.name,
                        kind.as_str().to_string(),
                        d.namespace.unwrap_or_default(),
                        or_dash(&d.description),
                    ]);
                }
            }
            table.print();
        }
        DefCommand::Get {
            name,
            kind,
            namespace,
            output,
        } => {
            let kind = parse_kind(kind.as_deref())?;
            let namespace = factory.namespace(&namespace)?;
            let client = DefinitionClient::new(factory.client().await?);
            let found = client.get(&name, kind, &namespace).await?;

            match found.as_slice() {
                [] => return Err(CliError::input(format!("definition {} not found", name))),
                [definition] => {
                    if !print_structured(definition, output)? {
                        print_structured(definition, OutputFormat::Yaml)?;
                    }
                }
                several => {
                    let kinds: Vec<&str> = several.iter().map(|d| d.kind.as_str()).collect();
                    return Err(CliError::input_with_help(
                        format!("found more than one definition named {}: {}", name, kinds.join(", ")),
                        "pass --type to choose one",
                    ));
                }
            }
        }
        DefCommand::Render { file, output } => {
            let source = file.clone();
            let rendered = blocking(move || render_file(&source, &CueCli::new())).await?;
            match output {
                Some(target) => {
                    std::fs::write(&target, rendered)?;
                    success(format!("Rendered {} to {}", file.display(), target.display()));
                }
                None => print!("{}", rendered),
            }
        }
        DefCommand::Vet { files } => {
            for file in files {
                let source = file.clone();
                let definitions = blocking(move || vet_file(&source, &CueCli::new())).await?;
                for definition in definitions {
                    tracing::debug!(name = %definition.name, kind = %definition.kind.as_str(), "definition is valid");
                }
                success(format!("Validation {} succeeded.", file.display()));
            }
        }
    }
    Ok(())
}
