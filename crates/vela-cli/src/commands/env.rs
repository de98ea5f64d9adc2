//! Env commands - named namespace selections in `envs.yaml`

use clap::Subcommand;
use vela_repo::EnvConfig;
use vela_repo::env::DEFAULT_NAMESPACE;

use crate::display::{OutputFormat, Table, print_structured, success};
use crate::error::Result;
use crate::factory::Factory;

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    /// Create an env, or change the namespace of an existing one
    Init {
        /// Env name
        name: String,

        /// Namespace the env targets
        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },

    /// List envs
    #[command(alias = "list")]
    Ls {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Switch the current env
    #[command(alias = "sw")]
    Set {
        /// Env name
        name: String,
    },

    /// Delete an env
    Delete {
        /// Env name
        name: String,
    },
}

/// Run an env subcommand
pub fn run(factory: &Factory, command: EnvCommand) -> Result<()> {
    let home = factory.home()?;
    let mut envs = EnvConfig::load(&home)?;

    match command {
        EnvCommand::Init { name, namespace } => {
            let env = envs.init(&name, &namespace)?;
            envs.save(&home)?;
            success(format!("environment {} with namespace {} created", env.name, env.namespace));
        }
        EnvCommand::Ls { output } => {
            let list = envs.list();
            if print_structured(&list, output)? {
                return Ok(());
            }
            let mut table = Table::new(&["NAME", "NAMESPACE", "CURRENT"]);
            for env in list {
                let current = if env.current { "*" } else { "" };
                table.add_row(vec![env.name, env.namespace, current.to_string()]);
            }
            table.print();
        }
        EnvCommand::Set { name } => {
            let env = envs.set_current(&name)?;
            envs.save(&home)?;
            success(format!("current environment switched to {} (namespace {})", env.name, env.namespace));
        }
        EnvCommand::Delete { name } => {
            envs.delete(&name)?;
            envs.save(&home)?;
            success(format!("environment {} deleted", name));
        }
    }
    Ok(())
}
