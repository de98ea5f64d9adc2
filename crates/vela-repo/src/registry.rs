//! Addon registry configuration
//!
//! Stored in `registries.yaml` under the vela home directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RepoError, Result};
use crate::home::{load_yaml, save_yaml};

/// File name of the registry list
pub const REGISTRIES_FILE: &str = "registries.yaml";

/// Name of the registry used when none is configured
pub const DEFAULT_REGISTRY: &str = "KubeVela";

/// URL of the official addon catalogue
pub const DEFAULT_REGISTRY_URL: &str = "https://addons.kubevela.net";

/// A named addon source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub name: String,

    /// HTTP(S) URL serving an `index.yaml`, or a local directory
    pub url: String,

    /// Bearer token sent to HTTP registries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Registry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let url = url.into();
        validate_url(&url)?;
        Ok(Self { name, url, token: None })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn official() -> Self {
        Self {
            name: DEFAULT_REGISTRY.to_string(),
            url: DEFAULT_REGISTRY_URL.to_string(),
            token: None,
        }
    }

    pub fn is_http(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    /// Directory of a local registry
    pub fn local_path(&self) -> Option<PathBuf> {
        if self.is_http() {
            return None;
        }
        match self.url.strip_prefix("file://") {
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(&self.url)),
        }
    }
}

fn validate_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(RepoError::InvalidRegistryUrl {
            url: url.to_string(),
            reason: "URL must not be empty".to_string(),
        });
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Url::parse(url).map_err(|e| RepoError::InvalidRegistryUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    } else if url.contains("://") && !url.starts_with("file://") {
        return Err(RepoError::InvalidRegistryUrl {
            url: url.to_string(),
            reason: "only http, https and file URLs are supported".to_string(),
        });
    }
    Ok(())
}

/// The configured registries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub registries: Vec<Registry>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registries: vec![Registry::official()],
        }
    }
}

impl RegistryConfig {
    pub fn path(home: &Path) -> PathBuf {
        home.join(REGISTRIES_FILE)
    }

    /// Load from the home directory; the official registry when nothing is saved
    pub fn load(home: &Path) -> Result<Self> {
        Self::load_from(&Self::path(home))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(load_yaml(path)?.unwrap_or_default())
    }

    pub fn save(&self, home: &Path) -> Result<()> {
        save_yaml(&Self::path(home), self)
    }

    pub fn get(&self, name: &str) -> Result<&Registry> {
        self.registries
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| RepoError::RegistryNotFound { name: name.to_string() })
    }

    pub fn add(&mut self, registry: Registry) -> Result<()> {
        if self.registries.iter().any(|r| r.name == registry.name) {
            return Err(RepoError::RegistryAlreadyExists { name: registry.name });
        }
        tracing::debug!(registry = %registry.name, url = %registry.url, "adding registry");
        self.registries.push(registry);
        Ok(())
    }

    /// Replace an existing registry of the same name
    pub fn update(&mut self, registry: Registry) -> Result<()> {
        let existing = self
            .registries
            .iter_mut()
            .find(|r| r.name == registry.name)
            .ok_or_else(|| RepoError::RegistryNotFound {
                name: registry.name.clone(),
            })?;
        *existing = registry;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Registry> {
        let idx = self
            .registries
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| RepoError::RegistryNotFound { name: name.to_string() })?;
        Ok(self.registries.remove(idx))
    }

    pub fn names(&self) -> Vec<&str> {
        self.registries.iter().map(|r| r.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_registry_when_absent() {
        let home = TempDir::new().unwrap();
        let config = RegistryConfig::load(home.path()).unwrap();
        assert_eq!(config.names(), vec!["KubeVela"]);
        assert_eq!(config.get("KubeVela").unwrap().url, DEFAULT_REGISTRY_URL);
    }

    #[test]
    fn test_add_duplicate() {
        let mut config = RegistryConfig::default();
        let err = config.add(Registry::official()).unwrap_err();
        assert_eq!(err.to_string(), "registry KubeVela already exists");
    }

    #[test]
    fn test_remove_missing() {
        let mut config = RegistryConfig::default();
        let err = config.remove("mine").unwrap_err();
        assert_eq!(err.to_string(), "registry mine not found");
        config.remove("KubeVela").unwrap();
        assert!(config.registries.is_empty());
    }

    #[test]
    fn test_update() {
        let mut config = RegistryConfig::default();
        config
            .update(Registry::new("KubeVela", "https://mirror.example.com").unwrap().with_token("t0k"))
            .unwrap();
        assert_eq!(config.get("KubeVela").unwrap().token.as_deref(), Some("t0k"));
        assert!(config.update(Registry::new("other", "/tmp/addons").unwrap()).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let home = TempDir::new().unwrap();
        let mut config = RegistryConfig::load(home.path()).unwrap();
        config.add(Registry::new("local", "file:///srv/addons").unwrap()).unwrap();
        config.save(home.path()).unwrap();

        let reloaded = RegistryConfig::load(home.path()).unwrap();
        assert_eq!(reloaded, config);
        let content = std::fs::read_to_string(RegistryConfig::path(home.path())).unwrap();
        assert!(!content.contains("token"));

        let emptied = RegistryConfig { registries: vec![] };
        emptied.save(home.path()).unwrap();
        assert!(RegistryConfig::load(home.path()).unwrap().registries.is_empty());
    }

    #[test]
    fn test_registry_urls() {
        assert!(Registry::official().is_http());
        assert_eq!(
            Registry::new("local", "file:///srv/addons").unwrap().local_path(),
            Some(PathBuf::from("/srv/addons"))
        );
        assert!(Registry::new("bad", "").is_err());
        assert!(Registry::new("bad", "oci://ghcr.io/addons").is_err());
        assert!(Registry::new("bad", "https://").is_err());
    }
}
