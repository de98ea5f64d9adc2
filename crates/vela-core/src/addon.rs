//! Addon packages as published in an addon registry
//!
//! An addon directory holds `metadata.yaml`, an optional `template.yaml`
//! (the Application skeleton) and `resources/` files, each of which becomes
//! a component of the addon application.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Prefix of the Application created for an addon
pub const ADDON_APP_PREFIX: &str = "addon-";

/// Prefix of the Secret holding an addon's arguments
pub const ADDON_SECRET_PREFIX: &str = "addon-secret-";

/// Data key of the arguments in the addon Secret
pub const ADDON_SECRET_KEY: &str = "addonParameterDataKey";

pub fn addon_app_name(addon: &str) -> String {
    format!("{}{}", ADDON_APP_PREFIX, addon)
}

pub fn addon_secret_name(addon: &str) -> String {
    format!("{}{}", ADDON_SECRET_PREFIX, addon)
}

/// Addon name from its application name, if it is an addon application
pub fn addon_name_from_app(app: &str) -> Option<&str> {
    app.strip_prefix(ADDON_APP_PREFIX).filter(|n| !n.is_empty())
}

/// `metadata.yaml` of an addon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonMeta {
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<AddonDependency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemRequirements>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub need_namespace: Vec<String>,

    #[serde(default)]
    pub invisible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddonDependency {
    pub name: String,
}

/// Version constraints on the platform and the cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vela: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<String>,
}

impl AddonMeta {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// A file of an addon package
#[derive(Debug, Clone, PartialEq)]
pub struct AddonFile {
    /// Path relative to the addon directory
    pub path: String,
    pub content: String,
}

/// Everything needed to install an addon
#[derive(Debug, Clone, PartialEq)]
pub struct AddonPackage {
    pub meta: AddonMeta,
    /// Registry the package came from
    pub registry: String,
    pub template: Option<AddonFile>,
    pub resources: Vec<AddonFile>,
}
