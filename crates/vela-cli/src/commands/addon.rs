//! Addon commands - enable, upgrade, disable and inspect addons

use std::collections::BTreeMap;

use clap::{Args, Subcommand};
use console::style;
use vela_core::{AddonPackage, oam, parse_key_values};
use vela_kube::addons::check_requirements;
use vela_kube::install::{check_server_version, control_plane_version};
use vela_kube::{AddonManager, AddonPhase, AddonStatus, ClusterStore, PollConfig, SecretArgsStore};
use vela_repo::{AddonSummary, RegistryClient, RegistryConfig, fetch_addon};

use super::registry::{self, RegistryCommand};
use crate::display::{OutputFormat, Table, confirm, or_dash, print_structured, spinner, success, warning};
use crate::error::Result;
use crate::factory::Factory;

/// Versions shown per addon in the list table
const LISTED_VERSIONS: usize = 3;

#[derive(Args, Debug)]
pub struct AddonSource {
    /// Addon name
    pub name: String,

    /// Addon arguments (key=value)
    pub args: Vec<String>,

    /// Addon version, the latest by default
    #[arg(long)]
    pub version: Option<String>,

    /// Registry to fetch the addon from
    #[arg(long)]
    pub registry: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum AddonCommand {
    /// Enable an addon
    Enable(AddonSource),

    /// Upgrade an enabled addon, keeping its arguments
    Upgrade(AddonSource),

    /// Disable an addon
    Disable {
        /// Addon name
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List available and enabled addons
    #[command(alias = "ls")]
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Show the status of an addon
    Status {
        /// Addon name
        name: String,
    },

    /// Manage addon registries
    #[command(subcommand)]
    Registry(RegistryCommand),
}

/// Run an addon subcommand
pub async fn run(factory: &Factory, command: AddonCommand) -> Result<()> {
    match command {
        AddonCommand::Enable(source) => enable(factory, source, false).await,
        AddonCommand::Upgrade(source) => enable(factory, source, true).await,
        AddonCommand::Disable { name, yes } => disable(factory, &name, yes).await,
        AddonCommand::List { output } => list(factory, output).await,
        AddonCommand::Status { name } => status(factory, &name).await,
        AddonCommand::Registry(command) => registry::run(factory, command),
    }
}

/// Cluster-side stores of the addon manager
struct AddonStores {
    apps: ClusterStore,
    args: SecretArgsStore,
}

impl AddonStores {
    async fn connect(factory: &Factory) -> Result<Self> {
        let client = factory.client().await?;
        Ok(Self {
            apps: ClusterStore::new(client.clone()),
            args: SecretArgsStore::new(client),
        })
    }

    fn manager(&self) -> Result<AddonManager<'_>> {
        Ok(AddonManager::new(&self.apps, &self.args)?)
    }
}

async fn fetch(factory: &Factory, source: &AddonSource) -> Result<AddonPackage> {
    let registries = RegistryConfig::load(&factory.home()?)?;
    Ok(fetch_addon(&registries, &source.name, source.version.as_deref(), source.registry.as_deref()).await?)
}

async fn check_cluster(factory: &Factory, package: &AddonPackage) -> Result<()> {
    let client = factory.client().await?;
    let kubernetes = check_server_version(&client).await?;
    let vela = control_plane_version(&client, oam::SYSTEM_NAMESPACE).await?;
    if vela.is_none() {
        tracing::debug!("control plane version unknown, skipping its requirement check");
    }
    check_requirements(&package.meta, vela.as_deref(), Some(&kubernetes))?;
    Ok(())
}

async fn enable(factory: &Factory, source: AddonSource, upgrade: bool) -> Result<()> {
    let args = parse_key_values(&source.args)?;
    let package = fetch(factory, &source).await?;
    check_cluster(factory, &package).await?;

    println!(
        "{} {} addon {} {} from registry {}",
        style("→").blue().bold(),
        if upgrade { "Upgrading" } else { "Enabling" },
        style(&package.meta.name).cyan(),
        package.meta.version,
        package.registry
    );

    let stores = AddonStores::connect(factory).await?;
    let manager = stores.manager()?;
    if upgrade {
        manager.upgrade(&package, &args).await?;
        success(format!("Addon {} upgraded successfully.", package.meta.name));
    } else {
        manager.enable(&package, &args).await?;
        success(format!("Addon {} enabled successfully.", package.meta.name));
    }
    println!("Run 'vela addon status {}' to check its status", package.meta.name);
    Ok(())
}

async fn disable(factory: &Factory, name: &str, yes: bool) -> Result<()> {
    if !confirm(&format!("Are you sure to disable the addon {}", name), yes)? {
        println!("Disable canceled");
        return Ok(());
    }
    let stores = AddonStores::connect(factory).await?;
    let manager = stores.manager()?;

    let bar = spinner(format!("Disabling addon {}", name));
    let result = manager.disable(name, PollConfig::ADDON).await;
    bar.finish_and_clear();
    result?;

    success(format!("Addon {} disabled successfully.", name));
    Ok(())
}

/// Addons from every registry, skipping registries that cannot be read
async fn available_addons(factory: &Factory) -> Result<Vec<AddonSummary>> {
    let registries = RegistryConfig::load(&factory.home()?)?;
    let mut addons = Vec::new();
    for registry in registries.registries {
        let name = registry.name.clone();
        match RegistryClient::new(registry)?.list().await {
            Ok(found) => addons.extend(found),
            Err(e) => warning(format!("failed to list addons of registry {}: {}", name, e)),
        }
    }
    Ok(addons)
}

async fn list(factory: &Factory, output: OutputFormat) -> Result<()> {
    let available = available_addons(factory).await?;
    let stores = AddonStores::connect(factory).await?;
    let installed = stores.manager()?.installed().await?;

    if print_structured(&installed, output)? {
        return Ok(());
    }
    let table = addon_table(&available, &installed);
    if table.is_empty() {
        println!("No addons found");
        return Ok(());
    }
    table.print();
    Ok(())
}

fn addon_table(available: &[AddonSummary], installed: &BTreeMap<String, AddonStatus>) -> Table {
    let mut table = Table::new(&["NAME", "REGISTRY", "DESCRIPTION", "AVAILABLE-VERSIONS", "STATUS"]);

    for addon in available {
        let phase = installed.get(&addon.name).map(|s| s.phase).unwrap_or(AddonPhase::Disabled);
        table.add_row(vec![
            addon.name.clone(),
            addon.registry.clone(),
            or_dash(&addon.description),
            format_versions(&addon.versions),
            phase.to_string(),
        ]);
    }

    // Enabled addons no registry lists any more
    for (name, status) in installed {
        if available.iter().any(|a| &a.name == name) {
            continue;
        }
        table.add_row(vec![
            name.clone(),
            or_dash(status.registry.as_deref().unwrap_or("")),
            "-".to_string(),
            status.version.clone().map(|v| format!("[{}]", v)).unwrap_or_else(|| "-".to_string()),
            status.phase.to_string(),
        ]);
    }
    table
}

fn format_versions(versions: &[String]) -> String {
    if versions.len() > LISTED_VERSIONS {
        format!("[{}, ...]", versions[..LISTED_VERSIONS].join(", "))
    } else {
        format!("[{}]", versions.join(", "))
    }
}

async fn status(factory: &Factory, name: &str) -> Result<()> {
    let stores = AddonStores::connect(factory).await?;
    let status = stores.manager()?.status(name).await?;

    let phase = match status.phase {
        AddonPhase::Enabled => style(status.phase.as_str()).green(),
        AddonPhase::Disabled => style(status.phase.as_str()).dim(),
        _ => style(status.phase.as_str()).yellow(),
    };
    println!("addon {} status is {}", style(name).cyan(), phase);
    if status.phase == AddonPhase::Disabled {
        return Ok(());
    }
    if let Some(version) = &status.version {
        println!("installed version: {}", version);
    }
    if let Some(registry) = &status.registry {
        println!("installed from registry: {}", registry);
    }
    if !status.services.is_empty() {
        println!();
        let mut table = Table::new(&["COMPONENT", "HEALTHY"]);
        for (component, healthy) in &status.services {
            table.add_row(vec![component.clone(), healthy.to_string()]);
        }
        table.print();
    }
    Ok(())
}
