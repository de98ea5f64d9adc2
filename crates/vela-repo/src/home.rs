//! The vela home directory
//!
//! Local state lives in `$VELA_HOME`, or `<user config dir>/vela` when the
//! variable is unset.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{RepoError, Result};

/// Environment variable overriding the home directory
pub const VELA_HOME_ENV: &str = "VELA_HOME";

/// Resolve the vela home directory
pub fn vela_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(VELA_HOME_ENV).filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
        message: "could not determine config directory".to_string(),
    })?;
    Ok(config_dir.join("vela"))
}

/// Load a YAML file, `None` when it does not exist
pub(crate) fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|source| RepoError::Read {
        path: path.display().to_string(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_yaml::from_str(&content)?))
}

/// Write a YAML file, creating its parent directories
pub(crate) fn save_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_yaml::to_string(value)?)?;
    tracing::debug!(path = %path.display(), "saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_and_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.yaml");
        assert!(load_yaml::<BTreeMap<String, String>>(&path).unwrap().is_none());

        std::fs::write(&path, "\n").unwrap();
        assert!(load_yaml::<BTreeMap<String, String>>(&path).unwrap().is_none());
    }

    #[test]
    fn test_save_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.yaml");
        let value: BTreeMap<String, String> = [("a".to_string(), "b".to_string())].into_iter().collect();

        save_yaml(&path, &value).unwrap();
        let loaded: BTreeMap<String, String> = load_yaml(&path).unwrap().unwrap();
        assert_eq!(loaded, value);
    }
}
