//! Vela Engine - local rendering for the vela CLI
//!
//! This crate turns Applications into the objects the controller would
//! create, without touching a cluster:
//! - `DefinitionCatalog`: component, trait and policy definitions by name
//! - `Renderer`: kube schematics in-process, CUE schematics via the `cue` binary
//! - `dryrun`: override/topology policy fan-out and the dry-run text format
//! - `diff`: manifest trees and line diffs for live-diff
//! - `AddonRenderer`: addon templates with `[[ ]]` delimiters

pub mod addon;
pub mod catalog;
pub mod cue;
pub mod diff;
pub mod dryrun;
pub mod error;
pub mod fieldpath;
pub mod kube_schematic;
pub mod loader;
pub mod override_policy;
pub mod render;
pub mod suggestions;

pub use addon::{AddonRenderer, K8S_OBJECTS_COMPONENT};
pub use catalog::DefinitionCatalog;
pub use cue::{CueCli, CueOutput, CueRuntime, EvalRequest};
pub use diff::{DiffPrinter, DiffType, ManifestKind, ManifestNode, build_manifest, diff_manifests};
pub use dryrun::{execute_with_policies, print_dry_run};
pub use error::{EngineError, Result, TemplateError};
pub use loader::{decode_document, decode_documents};
pub use override_policy::{OverrideSpec, patch_components};
pub use render::{ComponentManifest, PolicyManifest, RenderedApplication, Renderer, TraitManifest};
