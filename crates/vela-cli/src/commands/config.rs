//! Config and config-template commands

use std::path::Path;

use clap::Subcommand;
use vela_core::{oam, parse_key_values};
use vela_kube::ConfigClient;
use vela_repo::read_source;

use crate::display::{OutputFormat, Table, confirm, print_structured, success};
use crate::error::{CliError, Result};
use crate::factory::Factory;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Create or update a config from a template
    Create {
        /// Config name
        name: String,

        /// Template the config is created from
        #[arg(short, long)]
        template: String,

        /// Config properties (key=value)
        properties: Vec<String>,

        /// Namespace of the config
        #[arg(short, long, default_value = oam::SYSTEM_NAMESPACE)]
        namespace: String,
    },

    /// List configs
    #[command(alias = "ls")]
    List {
        /// Only configs of this template
        #[arg(short, long)]
        template: Option<String>,

        /// Namespace of the configs
        #[arg(short, long, default_value = oam::SYSTEM_NAMESPACE)]
        namespace: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Delete a config
    Delete {
        /// Config name
        name: String,

        /// Namespace of the config
        #[arg(short, long, default_value = oam::SYSTEM_NAMESPACE)]
        namespace: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigTemplateCommand {
    /// Create or update a config template from a CUE file
    Apply {
        /// Template file (`-` for stdin)
        #[arg(short, long)]
        file: String,

        /// Template name, the file name by default
        #[arg(long)]
        name: Option<String>,

        /// Namespace of the template
        #[arg(short, long, default_value = oam::SYSTEM_NAMESPACE)]
        namespace: String,
    },

    /// List config templates
    #[command(alias = "ls")]
    List {
        /// Namespace of the templates
        #[arg(short, long, default_value = oam::SYSTEM_NAMESPACE)]
        namespace: String,
    },

    /// Delete a config template
    Delete {
        /// Template name
        name: String,

        /// Namespace of the template
        #[arg(short, long, default_value = oam::SYSTEM_NAMESPACE)]
        namespace: String,
    },
}

/// Template name derived from its file: `/tmp/helm-repo.cue` -> `helm-repo`
fn template_name(file: &str) -> Option<String> {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && *s != "-")
        .map(String::from)
}

/// Run a config subcommand
pub async fn run(factory: &Factory, command: ConfigCommand) -> Result<()> {
    let configs = ConfigClient::new(factory.client().await?);
    match command {
        ConfigCommand::Create {
            name,
            template,
            properties,
            namespace,
        } => {
            let properties = parse_key_values(&properties)?;
            configs.create_config(&namespace, &name, &template, &properties).await?;
            success(format!("config {}/{} created from template {}", namespace, name, template));
        }
        ConfigCommand::List {
            template,
            namespace,
            output,
        } => {
            let entries = configs.list_configs(&namespace, template.as_deref()).await?;
            if print_structured(&entries, output)? {
                return Ok(());
            }
            let mut table = Table::new(&["NAME", "TEMPLATE", "NAMESPACE", "CREATED-TIME"]);
            for entry in entries {
                table.add_row(vec![entry.name, entry.template, entry.namespace, entry.created]);
            }
            table.print();
        }
        ConfigCommand::Delete { name, namespace, yes } => {
            if !confirm(&format!("Are you sure to delete the config {}/{}", namespace, name), yes)? {
                println!("Delete canceled");
                return Ok(());
            }
            if configs.delete_config(&namespace, &name).await? {
                success(format!("config {}/{} deleted", namespace, name));
            } else {
                println!("config {}/{} already deleted", namespace, name);
            }
        }
    }
    Ok(())
}

/// Run a config-template subcommand
pub async fn run_template(factory: &Factory, command: ConfigTemplateCommand) -> Result<()> {
    match command {
        ConfigTemplateCommand::Apply { file, name, namespace } => {
            let name = name.or_else(|| template_name(&file)).ok_or_else(|| {
                CliError::input_with_help("cannot derive a template name", "pass --name when reading from stdin")
            })?;
            let source = String::from_utf8(read_source(&file).await?)
                .map_err(|_| CliError::input(format!("{} is not valid UTF-8", file)))?;
            ConfigClient::new(factory.client().await?)
                .apply_template(&namespace, &name, &source)
                .await?;
            success(format!("config template {}/{} applied", namespace, name));
        }
        ConfigTemplateCommand::List { namespace } => {
            let templates = ConfigClient::new(factory.client().await?).list_templates(&namespace).await?;
            let mut table = Table::new(&["NAME", "NAMESPACE", "CREATED-TIME"]);
            for template in templates {
                table.add_row(vec![template.name, template.namespace, template.created]);
            }
            table.print();
        }
        ConfigTemplateCommand::Delete { name, namespace } => {
            if ConfigClient::new(factory.client().await?)
                .delete_template(&namespace, &name)
                .await?
            {
                success(format!("config template {}/{} deleted", namespace, name));
            } else {
                println!("config template {}/{} already deleted", namespace, name);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_name() {
        assert_eq!(template_name("/tmp/helm-repo.cue").as_deref(), Some("helm-repo"));
        assert_eq!(template_name("image-registry.cue").as_deref(), Some("image-registry"));
        assert_eq!(template_name("-"), None);
    }
}
