//! Error types for local configuration and registries

use thiserror::Error;

/// Errors raised by the vela-repo crate
#[derive(Error, Debug)]
pub enum RepoError {
    // ============ Registry Errors ============
    #[error("registry {name} not found")]
    RegistryNotFound { name: String },

    #[error("registry {name} already exists")]
    RegistryAlreadyExists { name: String },

    #[error("invalid registry URL '{url}': {reason}")]
    InvalidRegistryUrl { url: String, reason: String },

    #[error("addon {name} not found in registry {registry}")]
    AddonNotFound { name: String, registry: String },

    #[error("version {version} of addon {name} not found in registry {registry} (available: {available})")]
    AddonVersionNotFound {
        name: String,
        version: String,
        registry: String,
        available: String,
    },

    #[error("invalid addon {name}: {message}")]
    InvalidAddon { name: String, message: String },

    #[error("invalid registry index at {url}: {message}")]
    IndexParseError { url: String, message: String },

    // ============ Env Errors ============
    #[error("env {name} not found")]
    EnvNotFound { name: String },

    #[error("env {name} is the current env, switch to another env before deleting it")]
    EnvInUse { name: String },

    // ============ Config Errors ============
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ Network Errors ============
    #[error("HTTP {status} fetching {url}")]
    HttpError { status: u16, url: String },

    #[error("network error: {message}")]
    NetworkError { message: String },

    // ============ IO Errors ============
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for vela-repo operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RepoError::HttpError {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None if e.is_connect() => RepoError::NetworkError {
                message: format!("connection failed: {}", e),
            },
            None => RepoError::NetworkError { message: e.to_string() },
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<vela_core::CoreError> for RepoError {
    fn from(e: vela_core::CoreError) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepoError::RegistryNotFound { .. }
                | RepoError::AddonNotFound { .. }
                | RepoError::AddonVersionNotFound { .. }
                | RepoError::EnvNotFound { .. }
                | RepoError::HttpError { status: 404, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = RepoError::RegistryAlreadyExists {
            name: "KubeVela".to_string(),
        };
        assert_eq!(err.to_string(), "registry KubeVela already exists");

        let err = RepoError::RegistryNotFound {
            name: "mine".to_string(),
        };
        assert_eq!(err.to_string(), "registry mine not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_http_not_found() {
        let err = RepoError::HttpError {
            status: 404,
            url: "https://addons.example.com/index.yaml".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!RepoError::NetworkError { message: "x".into() }.is_not_found());
    }
}
