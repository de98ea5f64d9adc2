//! Vela Repo - local state and remote sources for the vela CLI
//!
//! This crate handles everything the CLI reads outside the cluster:
//!
//! - **Vela home**: `$VELA_HOME` or `<config dir>/vela`
//! - **Registries**: named addon sources in `registries.yaml`
//! - **Envs**: named namespace selections in `envs.yaml`
//! - **Fetching**: input files from paths, `http(s)` URLs or stdin
//! - **Addon registries**: HTTP registries with an `index.yaml`, or local directories
//!
//! ## Example
//!
//! ```rust,no_run
//! use vela_repo::{RegistryConfig, fetch_addon, vela_home};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RegistryConfig::load(&vela_home()?)?;
//! let package = fetch_addon(&config, "fluxcd", None, None).await?;
//! println!("{} {}", package.meta.name, package.meta.version);
//! # Ok(())
//! # }
//! ```

pub mod addons;
pub mod env;
pub mod error;
pub mod fetch;
pub mod home;
pub mod registry;

pub use addons::{AddonEntry, AddonIndex, AddonSummary, RegistryClient, fetch_addon};
pub use env::{Env, EnvConfig};
pub use error::{RepoError, Result};
pub use fetch::{HttpFetcher, Source, read_source, read_sources};
pub use home::vela_home;
pub use registry::{Registry, RegistryConfig};
