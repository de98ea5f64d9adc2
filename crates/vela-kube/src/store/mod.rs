//! Application storage
//!
//! Commands read and write Applications and ApplicationRevisions through the
//! `ApplicationStore` trait:
//! - **Cluster** (default): the Kubernetes API through a `kube::Client`
//! - **Mock**: in memory, for tests

mod cluster;
mod mock;

pub use cluster::ClusterStore;
pub use mock::{MockApplicationStore, OperationCounts};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use vela_core::{Application, ApplicationRevision};

use crate::error::Result;

/// Storage of applications and their revisions
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Get an application
    async fn get(&self, namespace: &str, name: &str) -> Result<Application>;

    /// List applications in a namespace (all namespaces when `None`),
    /// optionally filtered with a `key=value,...` label selector
    async fn list(&self, namespace: Option<&str>, selector: Option<&str>) -> Result<Vec<Application>>;

    /// Create the application, or replace it when it already exists
    async fn apply(&self, app: &Application) -> Result<Application>;

    /// Validate an application without persisting it (server-side dry-run)
    async fn validate(&self, app: &Application) -> Result<()>;

    /// Merge `patch` (RFC 7386) into the application's status subresource
    async fn patch_status(&self, namespace: &str, name: &str, patch: &JsonValue) -> Result<Application>;

    /// Delete an application
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;

    /// Revisions of an application, oldest first
    async fn list_revisions(&self, namespace: &str, app: &str) -> Result<Vec<ApplicationRevision>>;

    /// Get a revision by name
    async fn get_revision(&self, namespace: &str, name: &str) -> Result<ApplicationRevision>;

    /// Get an application, `None` when it does not exist
    async fn get_opt(&self, namespace: &str, name: &str) -> Result<Option<Application>> {
        match self.get(namespace, name).await {
            Ok(app) => Ok(Some(app)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if an application exists
    async fn exists(&self, namespace: &str, name: &str) -> Result<bool> {
        Ok(self.get_opt(namespace, name).await?.is_some())
    }
}

/// Whether `labels` satisfy an equality-based selector `k1=v1,k2=v2`
pub fn matches_selector(labels: Option<&BTreeMap<String, String>>, selector: &str) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels
                .and_then(|l| l.get(key.trim()))
                .is_some_and(|v| v == value.trim_start_matches('=').trim()),
            None => labels.is_some_and(|l| l.contains_key(term)),
        })
}

/// Revision number from a `<app>-vN` name, 0 when absent
pub fn revision_number(name: &str) -> u64 {
    name.rsplit_once("-v")
        .and_then(|(_, n)| n.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_selector() {
        let labels: BTreeMap<String, String> = [("app".to_string(), "web".to_string()), ("tier".to_string(), "fe".to_string())]
            .into_iter()
            .collect();
        assert!(matches_selector(Some(&labels), "app=web"));
        assert!(matches_selector(Some(&labels), "app=web, tier=fe"));
        assert!(matches_selector(Some(&labels), "app==web"));
        assert!(matches_selector(Some(&labels), "tier"));
        assert!(!matches_selector(Some(&labels), "app=api"));
        assert!(!matches_selector(None, "app=web"));
        assert!(matches_selector(None, ""));
    }

    #[test]
    fn test_revision_number() {
        assert_eq!(revision_number("my-app-v12"), 12);
        assert_eq!(revision_number("app-v1"), 1);
        assert_eq!(revision_number("app"), 0);
    }
}
