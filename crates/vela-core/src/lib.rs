//! Vela Core - resource model and application assembly for the vela CLI
//!
//! This crate provides the foundational types used throughout vela:
//! - `Application`: components, traits, policies and workflow of an app
//! - `Policy` / `Workflow`: standalone objects merged into an Application
//! - `Definition`: component, trait, policy and workflow-step capabilities
//! - `assemble`: combine several input documents into one Application
//! - `Values`: free-form properties with deep merge and `key=value` parsing
//! - `QueryView`: parsed VelaQL statements

pub mod addon;
pub mod application;
pub mod assemble;
pub mod definition;
pub mod document;
pub mod error;
pub mod oam;
pub mod revision;
pub mod standalone;
pub mod values;
pub mod velaql;

pub use addon::{AddonFile, AddonMeta, AddonPackage};
pub use application::{
    AppPolicy, AppWorkflow, Application, ApplicationComponent, ApplicationSpec, ApplicationStatus,
    ApplicationTrait, ComponentStatus, RevisionRef, StepStatus, WorkflowMode, WorkflowStatus, WorkflowStep,
};
pub use assemble::{DeployStepProperties, assemble, referenced_policies};
pub use definition::{
    ComponentDefinition, CueSchematic, Definition, DefinitionKind, KubeParameter, KubeSchematic,
    ParameterValueType, PolicyDefinition, Schematic, TraitDefinition, WorkflowStepDefinition,
    WorkloadGvk,
};
pub use document::{Document, InputDocument, TypeMeta};
pub use error::{CoreError, Result};
pub use revision::{ApplicationRevision, ApplicationRevisionSpec, ApplicationRevisionStatus};
pub use standalone::{Policy, Workflow};
pub use values::{Values, deep_merge, merge_patch, parse_key_values, parse_selectors};
pub use velaql::QueryView;
