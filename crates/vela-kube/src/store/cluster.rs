//! Cluster-backed application store

use async_trait::async_trait;
use kube::Api;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use serde_json::{Value as JsonValue, json};
use vela_core::{Application, ApplicationRevision, oam};

use super::{ApplicationStore, revision_number};
use crate::error::{KubeError, Result};

/// Applications and revisions read from the Kubernetes API
pub struct ClusterStore {
    client: kube::Client,
}

impl ClusterStore {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn apps(&self, namespace: &str) -> Api<Application> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn revisions(&self, namespace: &str) -> Api<ApplicationRevision> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn namespace_of(app: &Application) -> &str {
        app.metadata.namespace.as_deref().unwrap_or(oam::DEFAULT_NAMESPACE)
    }

    async fn write(&self, app: &Application, dry_run: bool) -> Result<Application> {
        let name = app.metadata.name.clone().unwrap_or_default();
        let namespace = Self::namespace_of(app);
        let api = self.apps(namespace);
        let params = PostParams {
            dry_run,
            ..Default::default()
        };

        match api.get_opt(&name).await? {
            Some(existing) => {
                let mut updated = app.clone();
                updated.metadata.resource_version = existing.metadata.resource_version;
                updated.status = None;
                tracing::debug!(%namespace, %name, dry_run, "replacing application");
                Ok(api.replace(&name, &params, &updated).await?)
            }
            None => {
                tracing::debug!(%namespace, %name, dry_run, "creating application");
                Ok(api.create(&params, app).await?)
            }
        }
    }
}

#[async_trait]
impl ApplicationStore for ClusterStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Application> {
        tracing::debug!(%namespace, %name, "getting application");
        self.apps(namespace).get_opt(name).await?.ok_or_else(|| KubeError::ApplicationNotFound {
            name: name.to_string(),
            namespace: namespace.to_string(),
        })
    }

    async fn list(&self, namespace: Option<&str>, selector: Option<&str>) -> Result<Vec<Application>> {
        let api: Api<Application> = match namespace {
            Some(ns) => self.apps(ns),
            None => Api::all(self.client.clone()),
        };
        let mut params = ListParams::default();
        if let Some(selector) = selector.filter(|s| !s.is_empty()) {
            params = params.labels(selector);
        }
        tracing::debug!(namespace = namespace.unwrap_or("*"), "listing applications");
        let mut apps = api.list(&params).await?.items;
        apps.sort_by(|a, b| {
            (a.metadata.namespace.as_deref(), a.metadata.name.as_deref())
                .cmp(&(b.metadata.namespace.as_deref(), b.metadata.name.as_deref()))
        });
        Ok(apps)
    }

    async fn apply(&self, app: &Application) -> Result<Application> {
        self.write(app, false).await
    }

    async fn validate(&self, app: &Application) -> Result<()> {
        self.write(app, true).await.map(|_| ())
    }

    async fn patch_status(&self, namespace: &str, name: &str, patch: &JsonValue) -> Result<Application> {
        tracing::debug!(%namespace, %name, "patching application status");
        let body = json!({ "status": patch });
        match self
            .apps(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&body))
            .await
        {
            Ok(app) => Ok(app),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Err(KubeError::ApplicationNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        tracing::debug!(%namespace, %name, "deleting application");
        match self.apps(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Err(KubeError::ApplicationNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_revisions(&self, namespace: &str, app: &str) -> Result<Vec<ApplicationRevision>> {
        let params = ListParams::default().labels(&format!("{}={}", oam::LABEL_APP_NAME, app));
        let mut revisions = self.revisions(namespace).list(&params).await?.items;
        revisions.sort_by_key(|r| revision_number(r.metadata.name.as_deref().unwrap_or("")));
        Ok(revisions)
    }

    async fn get_revision(&self, namespace: &str, name: &str) -> Result<ApplicationRevision> {
        self.revisions(namespace)
            .get_opt(name)
            .await?
            .ok_or_else(|| KubeError::RevisionNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })
    }
}
