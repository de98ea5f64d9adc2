//! Registry commands - manage the addon registries in `registries.yaml`

use std::path::Path;

use clap::{Args, Subcommand};
use console::style;
use vela_repo::{Registry, RegistryConfig};

use crate::display::{OutputFormat, Table, print_structured, success};
use crate::error::Result;
use crate::factory::Factory;

#[derive(Args, Debug)]
pub struct RegistrySource {
    /// Registry name
    pub name: String,

    /// HTTP(S) URL of the registry, or a local directory
    #[arg(long)]
    pub url: String,

    /// Bearer token for HTTP registries
    #[arg(long)]
    pub token: Option<String>,
}

impl RegistrySource {
    fn registry(&self) -> Result<Registry> {
        let registry = Registry::new(&self.name, &self.url)?;
        Ok(match &self.token {
            Some(token) => registry.with_token(token),
            None => registry,
        })
    }
}

/// `vela addon registry ...`
#[derive(Subcommand, Debug)]
pub enum RegistryCommand {
    /// Add a registry
    Add(RegistrySource),

    /// Change the URL or token of a registry
    Update(RegistrySource),

    /// List registries
    #[command(alias = "ls")]
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Show a registry
    Get {
        /// Registry name
        name: String,
    },

    /// Delete a registry
    #[command(alias = "remove")]
    Delete {
        /// Registry name
        name: String,
    },
}

/// `vela registry ...`
#[derive(Subcommand, Debug)]
pub enum TopRegistryCommand {
    /// Add a registry, or update it when it exists
    Config {
        /// Registry name
        name: String,

        /// HTTP(S) URL of the registry, or a local directory
        url: String,

        /// Bearer token for HTTP registries
        #[arg(long)]
        token: Option<String>,
    },

    /// List registries
    #[command(alias = "ls")]
    List,

    /// Remove a registry
    Remove {
        /// Registry name
        name: String,
    },
}

/// Run an `addon registry` subcommand
pub fn run(factory: &Factory, command: RegistryCommand) -> Result<()> {
    let home = factory.home()?;
    match command {
        RegistryCommand::Add(source) => add(&home, source.registry()?),
        RegistryCommand::Update(source) => update(&home, source.registry()?),
        RegistryCommand::List { output } => list(&home, output),
        RegistryCommand::Get { name } => get(&home, &name),
        RegistryCommand::Delete { name } => remove(&home, &name),
    }
}

/// Run a `registry` subcommand
pub fn run_top(factory: &Factory, command: TopRegistryCommand) -> Result<()> {
    let home = factory.home()?;
    match command {
        TopRegistryCommand::Config { name, url, token } => {
            let source = RegistrySource { name, url, token };
            let registry = source.registry()?;
            let config = RegistryConfig::load(&home)?;
            if config.get(&registry.name).is_ok() {
                update(&home, registry)
            } else {
                add(&home, registry)
            }
        }
        TopRegistryCommand::List => list(&home, OutputFormat::Table),
        TopRegistryCommand::Remove { name } => remove(&home, &name),
    }
}

fn add(home: &Path, registry: Registry) -> Result<()> {
    let mut config = RegistryConfig::load(home)?;
    let (name, url) = (registry.name.clone(), registry.url.clone());
    config.add(registry)?;
    config.save(home)?;
    success(format!("registry {} ({}) has been added", name, url));
    Ok(())
}

fn update(home: &Path, registry: Registry) -> Result<()> {
    let mut config = RegistryConfig::load(home)?;
    let name = registry.name.clone();
    config.update(registry)?;
    config.save(home)?;
    success(format!("registry {} has been updated", name));
    Ok(())
}

fn list(home: &Path, output: OutputFormat) -> Result<()> {
    let config = RegistryConfig::load(home)?;
    let registries: Vec<Registry> = config.registries.iter().map(masked).collect();
    if print_structured(&registries, output)? {
        return Ok(());
    }

    let mut table = Table::new(&["NAME", "URL"]);
    for registry in &registries {
        table.add_row(vec![registry.name.clone(), registry.url.clone()]);
    }
    table.print();
    Ok(())
}

fn get(home: &Path, name: &str) -> Result<()> {
    let config = RegistryConfig::load(home)?;
    let registry = masked(config.get(name)?);
    print!("{}", serde_yaml::to_string(&registry)?);
    Ok(())
}

fn remove(home: &Path, name: &str) -> Result<()> {
    let mut config = RegistryConfig::load(home)?;
    config.remove(name)?;
    config.save(home)?;
    println!("{} registry {} has been removed", style("✓").green().bold(), name);
    Ok(())
}

/// Copy of a registry with its token hidden
fn masked(registry: &Registry) -> Registry {
    let mut registry = registry.clone();
    if registry.token.is_some() {
        registry.token = Some("******".to_string());
    }
    registry
}
