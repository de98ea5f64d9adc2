//! Cuex commands - evaluate CUE files with the cue binary

use std::path::PathBuf;

use clap::Subcommand;
use vela_engine::{CueCli, CueOutput, EvalRequest};

use super::blocking;
use crate::error::{CliError, Result};

#[derive(Subcommand, Debug)]
pub enum CuexCommand {
    /// Evaluate a CUE file
    Eval {
        /// CUE file
        file: PathBuf,

        /// Path to evaluate, e.g. `output.spec`
        #[arg(short, long)]
        path: Option<String>,

        /// Expression to evaluate
        #[arg(short, long)]
        expression: Option<String>,

        /// Output format: cue, json or yaml
        #[arg(short, long, default_value = "cue")]
        output: String,
    },
}

/// Run a cuex subcommand
pub async fn run(command: CuexCommand) -> Result<()> {
    match command {
        CuexCommand::Eval {
            file,
            path,
            expression,
            output,
        } => {
            let output = CueOutput::parse(&output).ok_or_else(|| {
                CliError::input_with_help(
                    format!("unsupported output format {}", output),
                    "use one of cue, json or yaml",
                )
            })?;
            if !file.exists() {
                return Err(CliError::Io {
                    message: format!("{}: no such file", file.display()),
                });
            }
            let request = EvalRequest {
                file,
                path,
                expression,
                output,
            };
            let result = blocking(move || Ok(CueCli::new().eval(&request)?)).await?;
            print!("{}", result);
            if !result.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
