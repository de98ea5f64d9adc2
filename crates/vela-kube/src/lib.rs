//! Vela Kube - cluster operations for the vela CLI
//!
//! This crate provides:
//! - **Application store**: Applications and revisions in the cluster, or in memory for tests
//! - **Actions**: up, delete (with wait), scale, publish of applications
//! - **Definitions**: catalogues of the definitions installed in the cluster
//! - **Control plane**: Helm-based install and uninstall with readiness polling
//! - **Addons**: enable, upgrade, disable and status of addon applications
//! - **Workflow**: suspend, resume, terminate, restart and rollback of application workflows
//! - **Configs, views, adopt, pods**: the remaining cluster-facing commands
//!
//! Every entry point takes its `kube::Client` or store explicitly.

pub mod actions;
pub mod addons;
pub mod adopt;
pub mod client;
pub mod configs;
pub mod definitions;
pub mod error;
pub mod health;
pub mod helm;
pub mod install;
mod objects;
pub mod pods;
pub mod store;
pub mod views;
pub mod wait;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use actions::{DeleteOutcome, UpOptions};
pub use addons::{AddonManager, AddonPhase, AddonStatus, SecretArgsStore};
pub use client::connect;
pub use configs::ConfigClient;
pub use definitions::DefinitionClient;
pub use error::{KubeError, Result};
pub use helm::HelmCli;
pub use install::{InstallOptions, UninstallOptions};
pub use pods::PodClient;
pub use store::{ApplicationStore, ClusterStore, MockApplicationStore, OperationCounts};
pub use views::ViewClient;
pub use wait::{PollConfig, poll_until};
pub use workflow::{ResumeOutcome, RollbackOutcome};
