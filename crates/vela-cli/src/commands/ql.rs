//! Ql command - run VelaQL queries and manage stored views

use clap::{Args, Subcommand};
use serde_json::Value as JsonValue;
use vela_core::QueryView;
use vela_engine::CueCli;
use vela_kube::ViewClient;
use vela_kube::views::evaluate_locally;
use vela_repo::read_source;

use super::blocking;
use crate::display::{OutputFormat, Table, print_structured, success};
use crate::error::{CliError, Result};
use crate::factory::Factory;

#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct QlArgs {
    #[command(subcommand)]
    pub command: Option<QlCommand>,

    /// VelaQL statement, e.g. `component-pod-view{appName=demo}.status`
    #[arg(short, long)]
    pub query: Option<String>,

    /// View template to evaluate locally (path, URL or `-`)
    #[arg(short, long)]
    pub file: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum QlCommand {
    /// Store a view template in the cluster
    Apply {
        /// View name, the file name by default
        name: Option<String>,

        /// View template file (path, URL or `-`)
        #[arg(short, long)]
        file: String,
    },

    /// List stored views
    #[command(alias = "ls")]
    List,

    /// Delete a stored view
    Delete {
        /// View name
        name: String,
    },
}

/// Run the ql command
pub async fn run(factory: &Factory, args: QlArgs) -> Result<()> {
    if let Some(command) = args.command {
        return run_view(factory, command).await;
    }

    let result = match (&args.file, &args.query) {
        (Some(file), query) => {
            let template = read_text(file).await?;
            let query = local_query(query.as_deref())?;
            blocking(move || Ok(evaluate_locally(&CueCli::new(), &template, &query)?)).await?
        }
        (None, Some(statement)) => ViewClient::new(factory.client().await?).query(statement).await?,
        (None, None) => {
            return Err(CliError::input_with_help(
                "please specify at least one VelaQL statement or VelaQL file path",
                "vela ql --query 'component-pod-view{appName=demo}.status'",
            ));
        }
    };
    print_result(&result, args.output)
}

/// Query applied to a local template; only its parameters and export matter
fn local_query(statement: Option<&str>) -> Result<QueryView> {
    match statement {
        Some(statement) => Ok(QueryView::parse(statement)?),
        None => Ok(QueryView {
            view: "local".to_string(),
            parameter: serde_json::Map::new(),
            export: vela_core::velaql::DEFAULT_EXPORT.to_string(),
        }),
    }
}

fn print_result(result: &JsonValue, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Table => println!("{}", serde_json::to_string_pretty(result)?),
        format => {
            print_structured(result, format)?;
        }
    }
    Ok(())
}

async fn read_text(file: &str) -> Result<String> {
    String::from_utf8(read_source(file).await?).map_err(|_| CliError::input(format!("{} is not valid UTF-8", file)))
}

async fn run_view(factory: &Factory, command: QlCommand) -> Result<()> {
    let views = ViewClient::new(factory.client().await?);
    match command {
        QlCommand::Apply { name, file } => {
            let name = name.or_else(|| view_name(&file)).ok_or_else(|| {
                CliError::input_with_help("cannot derive a view name", "pass the view name when reading from stdin")
            })?;
            let template = read_text(&file).await?;
            views.apply(&name, &template).await?;
            success(format!("view {} applied", name));
        }
        QlCommand::List => {
            let entries = views.list().await?;
            let mut table = Table::new(&["NAME", "CREATED-TIME"]);
            for entry in entries {
                table.add_row(vec![entry.name, entry.created]);
            }
            table.print();
        }
        QlCommand::Delete { name } => {
            if views.delete(&name).await? {
                success(format!("view {} deleted", name));
            } else {
                println!("view {} already deleted", name);
            }
        }
    }
    Ok(())
}

/// View name derived from the last path segment: `views/pod-view.cue` -> `pod-view`
fn view_name(file: &str) -> Option<String> {
    let segment = file.trim_end_matches('/').rsplit('/').next()?;
    let stem = segment.split('.').next()?;
    (!stem.is_empty() && stem != "-").then(|| stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_name() {
        assert_eq!(view_name("views/pod-view.cue").as_deref(), Some("pod-view"));
        assert_eq!(
            view_name("https://example.com/views/service-view.cue").as_deref(),
            Some("service-view")
        );
        assert_eq!(view_name("-"), None);
    }

    #[test]
    fn test_local_query_defaults_to_status() {
        let query = local_query(None).unwrap();
        assert_eq!(query.export, "status");
        assert!(query.parameter.is_empty());

        let query = local_query(Some("pods{appName=demo}.output")).unwrap();
        assert_eq!(query.export, "output");
        assert_eq!(query.parameter["appName"], "demo");
    }
}
