//! CLI error type with exit code handling
//!
//! Library errors are folded into `CliError`, which knows the exit code of
//! each failure class and carries an optional hint shown by miette.

use miette::Diagnostic;
use thiserror::Error;
use vela_core::CoreError;
use vela_engine::EngineError;
use vela_kube::KubeError;
use vela_repo::RepoError;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid input files, arguments or local configuration
    #[error("{message}")]
    #[diagnostic(code(vela::cli::input))]
    Input {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Rendering failed
    #[error("{message}")]
    #[diagnostic(code(vela::cli::render))]
    Render {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The cluster or control plane failed
    #[error("{message}")]
    #[diagnostic(code(vela::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("IO error: {message}")]
    #[diagnostic(code(vela::cli::io))]
    Io { message: String },

    /// Invalid command line
    #[error("{message}")]
    #[diagnostic(code(vela::cli::usage), help("run with --help to see the accepted arguments"))]
    Usage { message: String },

    #[error("{message}")]
    #[diagnostic(code(vela::cli::error))]
    Other {
        message: String,
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Input { .. } => exit_codes::INPUT_ERROR,
            CliError::Render { .. } => exit_codes::RENDER_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: None,
        }
    }

    pub fn input_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    pub fn cluster(message: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
            help: None,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }
}

/// Split a trailing `Hint: ...` line off a message
fn split_hint(message: String) -> (String, Option<String>) {
    match message.split_once("\nHint: ") {
        Some((message, hint)) => (message.to_string(), Some(hint.to_string())),
        None => (message, None),
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::other(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::other(err.to_string())
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            other => CliError::input(other.to_string()),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::Core(e) => e.into(),
            EngineError::Io(e) => e.into(),
            EngineError::DefinitionNotFound { suggestion, .. } => CliError::Render {
                message,
                help: suggestion,
            },
            EngineError::CueUnavailable { .. } => CliError::Render {
                message,
                help: Some(
                    "install cue from https://cuelang.org/docs/introduction/installation/ or set VELA_CUE_BINARY"
                        .to_string(),
                ),
            },
            _ => CliError::Render { message, help: None },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let (message, help) = split_hint(err.to_string());
        match err {
            KubeError::Io(e) => e.into(),
            KubeError::Render(_) => CliError::Render { message, help },
            KubeError::Core(_)
            | KubeError::InvalidConfig(_)
            | KubeError::InvalidViewName(_)
            | KubeError::Workflow(_)
            | KubeError::ApplicationsExist { .. }
            | KubeError::Kubeconfig(_) => CliError::Input { message, help },
            _ => CliError::Cluster { message, help },
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        let message = err.to_string();
        match err {
            RepoError::Io(e) => e.into(),
            RepoError::Read { .. } => CliError::Io { message },
            RepoError::HttpError { .. } | RepoError::NetworkError { .. } => CliError::other(message),
            _ => CliError::input(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
