//! CLI commands

// Control plane
pub mod install;

// Applications
pub mod up;
pub mod list;
pub mod status;
pub mod delete;
pub mod scale;
pub mod pods;
pub mod apprev;
pub mod adopt;
pub mod workflow;

// Local rendering
pub mod dryrun;
pub mod livediff;
pub mod cuex;

// Addons and local configuration
pub mod addon;
pub mod registry;
pub mod env;

// Definitions, configs and views
pub mod def;
pub mod config;
pub mod ql;

pub mod version;

use crate::error::{CliError, Result};

/// Run work that shells out to `cue` on the blocking pool
pub(crate) async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| CliError::Other {
        message: format!("blocking task failed: {}", e),
        help: None,
    })?
}
