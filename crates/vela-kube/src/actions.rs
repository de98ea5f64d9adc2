//! Application actions shared by the `up`, `delete`, `scale` and `apprev`
//! commands, written against `ApplicationStore`

use serde_json::json;
use vela_core::{AppPolicy, Application, ApplicationTrait, oam};

use crate::error::{KubeError, Result};
use crate::store::ApplicationStore;
use crate::wait::{PollConfig, poll_until};

/// Trait type carrying the replica count of a component
pub const SCALER_TRAIT: &str = "scaler";

/// Options for deploying an application
#[derive(Debug, Clone, Default)]
pub struct UpOptions {
    /// Target namespace
    pub namespace: String,

    /// Value of the publish version annotation
    pub publish_version: Option<String>,

    /// Revision to restore and pin (re-run by name only)
    pub revision: Option<String>,

    /// Attach a `debug` policy
    pub debug_policy: bool,
}

impl UpOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_publish_version(mut self, version: impl Into<String>) -> Self {
        self.publish_version = Some(version.into());
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn with_debug_policy(mut self) -> Self {
        self.debug_policy = true;
        self
    }
}

/// Result of deleting an application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyDeleted,
}

/// Create or update an assembled application
pub async fn deploy(
    store: &dyn ApplicationStore,
    mut app: Application,
    options: &UpOptions,
) -> Result<Application> {
    app.metadata.namespace = Some(options.namespace.clone());
    if let Some(version) = &options.publish_version {
        app.set_annotation(oam::ANNOTATION_PUBLISH_VERSION, version.clone());
    }
    if options.debug_policy {
        add_debug_policy(&mut app);
    }
    tracing::debug!(
        namespace = %options.namespace,
        name = app.metadata.name.as_deref().unwrap_or(""),
        "applying application"
    );
    store.apply(&app).await
}

/// Force an existing application to re-run its workflow under a new publish version
pub async fn rerun(
    store: &dyn ApplicationStore,
    name: &str,
    publish_version: &str,
    options: &UpOptions,
) -> Result<Application> {
    let namespace = options.namespace.as_str();
    let mut app = store.get(namespace, name).await?;

    if let Some(revision) = &options.revision {
        let snapshot = store.get_revision(namespace, revision).await?;
        let owner = snapshot.app_name();
        if owner != name {
            return Err(KubeError::InvalidConfig(format!(
                "revision {} belongs to application {}, not {}",
                revision, owner, name
            )));
        }
        app.spec = snapshot.spec.application.spec;
        app.set_annotation(oam::ANNOTATION_REVISION_ONLY, revision.clone());
    }

    app.set_annotation(oam::ANNOTATION_PUBLISH_VERSION, publish_version);
    if options.debug_policy {
        add_debug_policy(&mut app);
    }
    store.apply(&app).await
}

fn add_debug_policy(app: &mut Application) {
    if !app.spec.policies.iter().any(|p| p.policy_type == oam::DEBUG_POLICY) {
        app.spec.policies.push(AppPolicy {
            name: oam::DEBUG_POLICY.to_string(),
            policy_type: oam::DEBUG_POLICY.to_string(),
            properties: None,
        });
    }
}

/// Delete an application; a missing one is reported, not an error.
/// With `wait`, polls until the application is gone.
pub async fn delete_application(
    store: &dyn ApplicationStore,
    namespace: &str,
    name: &str,
    wait: Option<PollConfig>,
) -> Result<DeleteOutcome> {
    match store.delete(namespace, name).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(DeleteOutcome::AlreadyDeleted),
        Err(e) => return Err(e),
    }

    if let Some(config) = wait {
        let operation = format!("waiting for application {}/{} to be deleted", namespace, name);
        poll_until(config, &operation, move || async move { Ok(!store.exists(namespace, name).await?) }).await?;
    }
    Ok(DeleteOutcome::Deleted)
}

/// Drop the finalizers of an application so its deletion is not blocked;
/// returns whether any were removed
pub async fn remove_finalizers(store: &dyn ApplicationStore, namespace: &str, name: &str) -> Result<bool> {
    let Some(mut app) = store.get_opt(namespace, name).await? else {
        return Ok(false);
    };
    if app.metadata.finalizers.as_ref().is_none_or(|f| f.is_empty()) {
        return Ok(false);
    }
    tracing::debug!(%namespace, %name, "removing finalizers");
    app.metadata.finalizers = None;
    store.apply(&app).await?;
    Ok(true)
}

/// Set the replica count of a component through its scaler trait
pub async fn scale(
    store: &dyn ApplicationStore,
    namespace: &str,
    name: &str,
    component: &str,
    replicas: u32,
) -> Result<Application> {
    let mut app = store.get(namespace, name).await?;
    let target = app.component_mut(component).ok_or_else(|| KubeError::ComponentNotFound {
        app: name.to_string(),
        component: component.to_string(),
    })?;

    match target.find_trait_mut(SCALER_TRAIT) {
        Some(scaler) => {
            let properties = scaler.properties.get_or_insert_with(|| json!({}));
            match properties.as_object_mut() {
                Some(map) => {
                    map.insert("replicas".to_string(), json!(replicas));
                }
                None => *properties = json!({ "replicas": replicas }),
            }
        }
        None => target.traits.push(ApplicationTrait {
            trait_type: SCALER_TRAIT.to_string(),
            properties: Some(json!({ "replicas": replicas })),
        }),
    }

    store.apply(&app).await
}

/// Set the publish version annotation of an application
pub async fn publish(store: &dyn ApplicationStore, namespace: &str, name: &str, version: &str) -> Result<Application> {
    let mut app = store.get(namespace, name).await?;
    app.set_annotation(oam::ANNOTATION_PUBLISH_VERSION, version);
    store.apply(&app).await
}

/// Remove the publish version annotation; returns whether it was set
pub async fn unpublish(store: &dyn ApplicationStore, namespace: &str, name: &str) -> Result<bool> {
    let mut app = store.get(namespace, name).await?;
    if !app.remove_annotation(oam::ANNOTATION_PUBLISH_VERSION) {
        return Ok(false);
    }
    store.apply(&app).await?;
    Ok(true)
}
