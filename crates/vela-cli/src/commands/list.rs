//! List command - list applications and their components

use clap::Args;
use vela_core::{Application, parse_selectors};
use vela_kube::ApplicationStore;

use crate::display::{OutputFormat, Table, print_structured};
use crate::error::Result;
use crate::factory::{Factory, NamespaceArgs};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub namespace: NamespaceArgs,

    /// List applications in all namespaces
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// Filter by label (key=value)
    #[arg(short, long = "label")]
    pub labels: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
}

/// Run the list command
pub async fn run(factory: &Factory, args: ListArgs) -> Result<()> {
    let namespace = if args.all_namespaces {
        None
    } else {
        Some(factory.namespace(&args.namespace)?)
    };
    let selector = parse_selectors(&args.labels)?
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",");

    let store = factory.store().await?;
    let mut apps = store
        .list(namespace.as_deref(), Some(selector.as_str()).filter(|s| !s.is_empty()))
        .await?;
    apps.sort_by(|a, b| (&a.metadata.namespace, &a.metadata.name).cmp(&(&b.metadata.namespace, &b.metadata.name)));

    if print_structured(&apps, args.output)? {
        return Ok(());
    }

    if apps.is_empty() {
        match namespace {
            Some(ns) => println!("No applications found in namespace {}", ns),
            None => println!("No applications found in any namespace"),
        }
        return Ok(());
    }

    build_table(&apps, args.all_namespaces).print();
    Ok(())
}

fn build_table(apps: &[Application], with_namespace: bool) -> Table {
    let mut headers = vec!["APP", "COMPONENT", "TYPE", "TRAITS", "PHASE", "HEALTHY", "STATUS", "CREATED-TIME"];
    if with_namespace {
        headers.insert(0, "NAMESPACE");
    }
    let mut table = Table::new(headers.as_slice());

    for app in apps {
        let name = app.metadata.name.clone().unwrap_or_default();
        let created = app
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|t| t.0.format("%Y-%m-%d %H:%M:%S %z").to_string())
            .unwrap_or_default();
        let services = app.status.as_ref().map(|s| s.services.as_slice()).unwrap_or_default();
        let components = &app.spec.components;

        if components.is_empty() {
            let mut row = vec![name.clone(), String::new(), String::new(), String::new()];
            row.extend([app.phase().to_string(), String::new(), String::new(), created.clone()]);
            if with_namespace {
                row.insert(0, app.metadata.namespace.clone().unwrap_or_default());
            }
            table.add_row(row);
            continue;
        }

        for (i, component) in components.iter().enumerate() {
            let app_cell = match i {
                0 => name.clone(),
                i if i + 1 == components.len() => "└─".to_string(),
                _ => "├─".to_string(),
            };
            let traits = component
                .traits
                .iter()
                .map(|t| t.trait_type.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let service = services.iter().find(|s| s.name == component.name);
            let healthy = match service {
                Some(s) if s.healthy => "healthy",
                Some(_) => "unhealthy",
                None => "",
            };
            let message = service.and_then(|s| s.message.clone()).unwrap_or_default();

            let mut row = vec![
                app_cell,
                component.name.clone(),
                component.component_type.clone(),
                traits,
                app.phase().to_string(),
                healthy.to_string(),
                message,
                created.clone(),
            ];
            if with_namespace {
                let namespace = match i {
                    0 => app.metadata.namespace.clone().unwrap_or_default(),
                    _ => String::new(),
                };
                row.insert(0, namespace);
            }
            table.add_row(row);
        }
    }
    table
}
