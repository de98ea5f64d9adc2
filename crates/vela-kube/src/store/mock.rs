//! Mock application store for testing
//!
//! Applications and revisions live in memory, so command logic can be tested
//! without a Kubernetes cluster.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use vela_core::{Application, ApplicationRevision, oam};

use super::{ApplicationStore, matches_selector, revision_number};
use crate::error::{KubeError, Result};

type Key = (String, String);

/// In-memory application store for testing
#[derive(Clone, Default)]
pub struct MockApplicationStore {
    apps: Arc<RwLock<BTreeMap<Key, Application>>>,
    revisions: Arc<RwLock<BTreeMap<Key, ApplicationRevision>>>,
    operations: Arc<RwLock<OperationCounts>>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub gets: usize,
    pub lists: usize,
    pub creates: usize,
    pub updates: usize,
    pub status_patches: usize,
    pub validations: usize,
    pub deletes: usize,
}

fn key_of(namespace: Option<&str>, name: Option<&str>) -> Key {
    (
        namespace.unwrap_or(oam::DEFAULT_NAMESPACE).to_string(),
        name.unwrap_or_default().to_string(),
    )
}

impl MockApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-populated applications
    pub fn with_apps(apps: Vec<Application>) -> Self {
        let store = Self::new();
        {
            let mut map = store.apps.write().unwrap();
            for app in apps {
                let key = key_of(app.metadata.namespace.as_deref(), app.metadata.name.as_deref());
                map.insert(key, app);
            }
        }
        store
    }

    /// Add a revision
    pub fn add_revision(&self, revision: ApplicationRevision) {
        let key = key_of(revision.metadata.namespace.as_deref(), revision.metadata.name.as_deref());
        self.revisions.write().unwrap().insert(key, revision);
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }

    /// All stored applications
    pub fn all_apps(&self) -> Vec<Application> {
        self.apps.read().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl ApplicationStore for MockApplicationStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Application> {
        self.operations.write().unwrap().gets += 1;
        self.apps
            .read()
            .unwrap()
            .get(&key_of(Some(namespace), Some(name)))
            .cloned()
            .ok_or_else(|| KubeError::ApplicationNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })
    }

    async fn list(&self, namespace: Option<&str>, selector: Option<&str>) -> Result<Vec<Application>> {
        self.operations.write().unwrap().lists += 1;
        let apps = self.apps.read().unwrap();
        Ok(apps
            .iter()
            .filter(|((ns, _), _)| namespace.is_none_or(|n| n == ns))
            .filter(|(_, app)| selector.is_none_or(|s| matches_selector(app.metadata.labels.as_ref(), s)))
            .map(|(_, app)| app.clone())
            .collect())
    }

    async fn apply(&self, app: &Application) -> Result<Application> {
        let key = key_of(app.metadata.namespace.as_deref(), app.metadata.name.as_deref());
        let mut apps = self.apps.write().unwrap();
        let mut ops = self.operations.write().unwrap();
        let mut stored = app.clone();
        stored.metadata.namespace = Some(key.0.clone());
        match apps.get(&key) {
            Some(existing) => {
                ops.updates += 1;
                stored.status = existing.status.clone();
            }
            None => ops.creates += 1,
        }
        apps.insert(key, stored.clone());
        Ok(stored)
    }

    async fn validate(&self, _app: &Application) -> Result<()> {
        self.operations.write().unwrap().validations += 1;
        Ok(())
    }

    async fn patch_status(&self, namespace: &str, name: &str, patch: &JsonValue) -> Result<Application> {
        self.operations.write().unwrap().status_patches += 1;
        let mut apps = self.apps.write().unwrap();
        let app = apps
            .get_mut(&key_of(Some(namespace), Some(name)))
            .ok_or_else(|| KubeError::ApplicationNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })?;
        let mut status = serde_json::to_value(app.status.clone().unwrap_or_default())?;
        vela_core::merge_patch(&mut status, patch);
        app.status = Some(serde_json::from_value(status)?);
        Ok(app.clone())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.operations.write().unwrap().deletes += 1;
        self.apps
            .write()
            .unwrap()
            .remove(&key_of(Some(namespace), Some(name)))
            .map(|_| ())
            .ok_or_else(|| KubeError::ApplicationNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })
    }

    async fn list_revisions(&self, namespace: &str, app: &str) -> Result<Vec<ApplicationRevision>> {
        self.operations.write().unwrap().lists += 1;
        let mut revisions: Vec<_> = self
            .revisions
            .read()
            .unwrap()
            .iter()
            .filter(|((ns, _), rev)| ns == namespace && rev.app_name() == app)
            .map(|(_, rev)| rev.clone())
            .collect();
        revisions.sort_by_key(|r| revision_number(r.metadata.name.as_deref().unwrap_or("")));
        Ok(revisions)
    }

    async fn get_revision(&self, namespace: &str, name: &str) -> Result<ApplicationRevision> {
        self.operations.write().unwrap().gets += 1;
        self.revisions
            .read()
            .unwrap()
            .get(&key_of(Some(namespace), Some(name)))
            .cloned()
            .ok_or_else(|| KubeError::RevisionNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{app, revision};

    #[tokio::test]
    async fn test_apply_creates_then_updates() {
        let store = MockApplicationStore::new();
        store.apply(&app("default", "web")).await.unwrap();
        store.apply(&app("default", "web")).await.unwrap();

        let counts = store.operation_counts();
        assert_eq!(counts.creates, 1);
        assert_eq!(counts.updates, 1);
        assert!(store.exists("default", "web").await.unwrap());
        assert!(!store.exists("prod", "web").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_namespace_and_labels() {
        let mut labelled = app("prod", "api");
        labelled.metadata.labels = Some([("team".to_string(), "core".to_string())].into_iter().collect());
        let store = MockApplicationStore::with_apps(vec![app("default", "web"), labelled]);

        assert_eq!(store.list(None, None).await.unwrap().len(), 2);
        assert_eq!(store.list(Some("default"), None).await.unwrap().len(), 1);
        let selected = store.list(None, Some("team=core")).await.unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].metadata.name.as_deref(), Some("api"));
    }

    #[tokio::test]
    async fn test_patch_status_merges_and_removes() {
        let store = MockApplicationStore::with_apps(vec![app("default", "web")]);

        let patched = store
            .patch_status("default", "web", &serde_json::json!({"status": "running", "workflow": {"suspend": true}}))
            .await
            .unwrap();
        assert_eq!(patched.phase(), "running");
        assert!(patched.status.as_ref().unwrap().workflow.as_ref().unwrap().suspend);

        let patched = store
            .patch_status("default", "web", &serde_json::json!({"workflow": null}))
            .await
            .unwrap();
        assert!(patched.status.as_ref().unwrap().workflow.is_none());
        assert_eq!(store.operation_counts().status_patches, 2);

        assert!(store.patch_status("default", "api", &serde_json::json!({})).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = MockApplicationStore::new();
        let err = store.delete("default", "web").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_revisions_sorted_by_number() {
        let store = MockApplicationStore::new();
        store.add_revision(revision("default", "web", 10));
        store.add_revision(revision("default", "web", 2));
        store.add_revision(revision("default", "api", 1));

        let revisions = store.list_revisions("default", "web").await.unwrap();
        let names: Vec<_> = revisions.iter().map(|r| r.metadata.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["web-v2", "web-v10"]);
        assert!(store.get_revision("default", "web-v3").await.unwrap_err().is_not_found());
    }
}
