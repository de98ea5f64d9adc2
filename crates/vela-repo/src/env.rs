//! Named environments
//!
//! An env maps a name to a namespace. Envs are stored in `envs.yaml` under the
//! vela home directory; at most one of them is current. The `default` env
//! always exists and selects the `default` namespace unless overridden.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RepoError, Result};
use crate::home::{load_yaml, save_yaml};

/// File name of the env list
pub const ENVS_FILE: &str = "envs.yaml";

/// Name of the implicit env
pub const DEFAULT_ENV: &str = "default";

/// Namespace of the implicit env
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub current: bool,
}

impl Env {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            current: false,
        }
    }

    fn implicit() -> Self {
        Self::new(DEFAULT_ENV, DEFAULT_NAMESPACE)
    }
}

/// The saved envs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvConfig {
    envs: Vec<Env>,
}

impl EnvConfig {
    pub fn path(home: &Path) -> PathBuf {
        home.join(ENVS_FILE)
    }

    pub fn load(home: &Path) -> Result<Self> {
        Ok(load_yaml(&Self::path(home))?.unwrap_or_default())
    }

    pub fn save(&self, home: &Path) -> Result<()> {
        save_yaml(&Self::path(home), self)
    }

    /// Saved envs plus the implicit default one, sorted by name
    pub fn list(&self) -> Vec<Env> {
        let mut envs = self.envs.clone();
        if !envs.iter().any(|e| e.name == DEFAULT_ENV) {
            let mut default = Env::implicit();
            default.current = !envs.iter().any(|e| e.current);
            envs.push(default);
        }
        envs.sort_by(|a, b| a.name.cmp(&b.name));
        envs
    }

    pub fn get(&self, name: &str) -> Result<Env> {
        self.list()
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| RepoError::EnvNotFound { name: name.to_string() })
    }

    /// The current env, or the default one
    pub fn current(&self) -> Env {
        self.list()
            .into_iter()
            .find(|e| e.current)
            .unwrap_or_else(Env::implicit)
    }

    /// Create an env, or change the namespace of an existing one
    pub fn init(&mut self, name: &str, namespace: &str) -> Result<Env> {
        if name.is_empty() || namespace.is_empty() {
            return Err(RepoError::InvalidConfig {
                message: "env name and namespace must not be empty".to_string(),
            });
        }
        match self.envs.iter_mut().find(|e| e.name == name) {
            Some(env) => env.namespace = namespace.to_string(),
            None => self.envs.push(Env::new(name, namespace)),
        }
        self.get(name)
    }

    /// Mark an env as current
    pub fn set_current(&mut self, name: &str) -> Result<Env> {
        if !self.envs.iter().any(|e| e.name == name) {
            if name != DEFAULT_ENV {
                return Err(RepoError::EnvNotFound { name: name.to_string() });
            }
            self.envs.push(Env::implicit());
        }
        for env in &mut self.envs {
            env.current = env.name == name;
        }
        self.get(name)
    }

    pub fn delete(&mut self, name: &str) -> Result<Env> {
        let idx = self
            .envs
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| RepoError::EnvNotFound { name: name.to_string() })?;
        if self.envs[idx].current {
            return Err(RepoError::EnvInUse { name: name.to_string() });
        }
        Ok(self.envs.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_implicit_default() {
        let config = EnvConfig::default();
        let envs = config.list();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].name, "default");
        assert!(envs[0].current);
        assert_eq!(config.current().namespace, "default");
    }

    #[test]
    fn test_init_set_and_current() {
        let mut config = EnvConfig::default();
        config.init("prod", "production").unwrap();
        assert_eq!(config.current().name, "default");

        config.set_current("prod").unwrap();
        assert_eq!(config.current().namespace, "production");
        let names: Vec<_> = config.list().into_iter().map(|e| (e.name, e.current)).collect();
        assert_eq!(names, vec![("default".to_string(), false), ("prod".to_string(), true)]);

        config.init("prod", "prod-2").unwrap();
        assert_eq!(config.current().namespace, "prod-2");

        config.set_current("default").unwrap();
        assert_eq!(config.current().name, "default");
        assert!(config.set_current("staging").is_err());
    }

    #[test]
    fn test_delete() {
        let mut config = EnvConfig::default();
        config.init("dev", "dev").unwrap();
        config.set_current("dev").unwrap();
        assert!(matches!(config.delete("dev"), Err(RepoError::EnvInUse { .. })));
        assert!(matches!(config.delete("nope"), Err(RepoError::EnvNotFound { .. })));

        config.set_current("default").unwrap();
        config.delete("dev").unwrap();
        assert!(config.get("dev").is_err());
    }

    #[test]
    fn test_persisted_as_list() {
        let home = TempDir::new().unwrap();
        let mut config = EnvConfig::load(home.path()).unwrap();
        config.init("qa", "qa-ns").unwrap();
        config.set_current("qa").unwrap();
        config.save(home.path()).unwrap();

        let raw: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(EnvConfig::path(home.path())).unwrap()).unwrap();
        assert!(raw.is_sequence());
        assert_eq!(EnvConfig::load(home.path()).unwrap().current().namespace, "qa-ns");
    }
}
