//! Access to the external CUE evaluator
//!
//! Templates are never interpreted in-process. The source is piped to the
//! `cue` binary on stdin and the exported JSON is read back.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::Value as JsonValue;

use crate::error::{EngineError, Result};

/// Environment variable overriding the cue binary location
pub const CUE_BINARY_ENV: &str = "VELA_CUE_BINARY";

const DEFAULT_CUE_BINARY: &str = "cue";

/// Evaluates CUE sources into JSON
pub trait CueRuntime: Send + Sync {
    /// Export `source` as JSON, optionally restricted to one expression
    fn export(&self, source: &str, expression: Option<&str>) -> Result<JsonValue>;
}

/// Output encoding of `cuex eval`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CueOutput {
    #[default]
    Cue,
    Json,
    Yaml,
}

impl CueOutput {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cue" => Some(CueOutput::Cue),
            "json" => Some(CueOutput::Json),
            "yaml" => Some(CueOutput::Yaml),
            _ => None,
        }
    }
}

/// An evaluation request from `vela cuex eval`
#[derive(Debug, Clone, Default)]
pub struct EvalRequest {
    pub file: PathBuf,
    pub path: Option<String>,
    pub expression: Option<String>,
    pub output: CueOutput,
}

impl EvalRequest {
    /// Arguments passed to the cue binary
    pub fn args(&self) -> Vec<String> {
        let mut args = match self.output {
            CueOutput::Cue => vec!["eval".to_string()],
            CueOutput::Json => vec!["export".into(), "--out".into(), "json".into()],
            CueOutput::Yaml => vec!["export".into(), "--out".into(), "yaml".into()],
        };
        for selection in [&self.path, &self.expression].into_iter().flatten() {
            args.push("-e".to_string());
            args.push(selection.clone());
        }
        args.push(self.file.display().to_string());
        args
    }
}

/// The `cue` command-line tool
#[derive(Debug, Clone)]
pub struct CueCli {
    binary: String,
}

impl Default for CueCli {
    fn default() -> Self {
        Self::new()
    }
}

impl CueCli {
    /// Use `$VELA_CUE_BINARY`, or `cue` from the PATH
    pub fn new() -> Self {
        let binary = std::env::var(CUE_BINARY_ENV)
            .ok()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_CUE_BINARY.to_string());
        Self { binary }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run `cue` with the given arguments and optional stdin, returning stdout
    pub fn run(&self, args: &[String], stdin: Option<&str>) -> Result<String> {
        tracing::debug!(binary = %self.binary, ?args, "running cue");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::CueUnavailable {
                binary: self.binary.clone(),
                message: e.to_string(),
            })?;

        // cue may exit before draining stdin; its stderr explains why
        let written = match (stdin, child.stdin.take()) {
            (Some(source), Some(mut pipe)) => pipe.write_all(source.as_bytes()),
            _ => Ok(()),
        };

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(EngineError::Cue {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Evaluate a file for `vela cuex eval`
    pub fn eval(&self, request: &EvalRequest) -> Result<String> {
        if !Path::new(&request.file).exists() {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", request.file.display()),
            )));
        }
        self.run(&request.args(), None)
    }
}

impl CueRuntime for CueCli {
    fn export(&self, source: &str, expression: Option<&str>) -> Result<JsonValue> {
        let mut args = vec!["export".to_string(), "--out".to_string(), "json".to_string()];
        if let Some(expr) = expression {
            args.push("-e".to_string());
            args.push(expr.to_string());
        }
        args.push("-".to_string());

        let stdout = self.run(&args, Some(source))?;
        Ok(serde_json::from_str(&stdout)?)
    }
}

/// Build the CUE source evaluated for a definition
///
/// The template is unified with concrete `parameter` and `context` values;
/// JSON is valid CUE so both are appended verbatim.
pub fn compose_source(template: &str, parameter: &JsonValue, context: &JsonValue) -> String {
    let parameter = if parameter.is_null() {
        JsonValue::Object(Default::default())
    } else {
        parameter.clone()
    };
    format!("{}\ncontext: {}\nparameter: {}\n", template.trim_end(), context, parameter)
}

/// Whether a template declares a top-level field
pub fn declares_field(template: &str, field: &str) -> bool {
    template.lines().any(|line| {
        line.strip_prefix(field)
            .is_some_and(|rest| rest.trim_start().starts_with(':'))
    })
}
