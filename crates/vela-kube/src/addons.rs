//! Addon lifecycle in the cluster
//!
//! An enabled addon is the Application `addon-<name>` in `vela-system`; the
//! arguments it was enabled with are kept in the Secret `addon-secret-<name>`
//! so that upgrades can start from them.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::Api;
use kube::api::ObjectMeta;
use serde::Serialize;
use vela_core::addon::{ADDON_SECRET_KEY, addon_app_name, addon_name_from_app, addon_secret_name};
use vela_core::{AddonMeta, AddonPackage, Application, Values, oam};
use vela_engine::AddonRenderer;

use crate::error::{KubeError, Result};
use crate::objects::{create_or_replace, delete_if_exists};
use crate::store::ApplicationStore;
use crate::wait::{PollConfig, poll_until};

/// Lifecycle state of an addon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddonPhase {
    Disabled,
    Enabling,
    Enabled,
    Suspended,
    Disabling,
}

impl AddonPhase {
    /// Phase of an addon from its application, if any
    pub fn of(app: Option<&Application>) -> Self {
        let Some(app) = app else {
            return AddonPhase::Disabled;
        };
        match app.phase() {
            "running" => AddonPhase::Enabled,
            "workflowSuspending" => AddonPhase::Suspended,
            "deleting" => AddonPhase::Disabling,
            _ => AddonPhase::Enabling,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddonPhase::Disabled => "disabled",
            AddonPhase::Enabling => "enabling",
            AddonPhase::Enabled => "enabled",
            AddonPhase::Suspended => "suspended",
            AddonPhase::Disabling => "disabling",
        }
    }
}

impl std::fmt::Display for AddonPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installed state of one addon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddonStatus {
    pub name: String,
    pub phase: AddonPhase,
    pub version: Option<String>,
    pub registry: Option<String>,
    /// Per-component health reported by the application
    pub services: Vec<(String, bool)>,
}

impl AddonStatus {
    pub fn from_app(name: &str, app: Option<&Application>) -> Self {
        let label = |key: &str| {
            app.and_then(|a| a.metadata.labels.as_ref())
                .and_then(|l| l.get(key))
                .cloned()
        };
        Self {
            name: name.to_string(),
            phase: AddonPhase::of(app),
            version: app
                .and_then(|a| a.metadata.annotations.as_ref())
                .and_then(|a| a.get(oam::ANNOTATION_ADDON_VERSION))
                .cloned(),
            registry: label(oam::LABEL_ADDON_REGISTRY),
            services: app
                .and_then(|a| a.status.as_ref())
                .map(|s| s.services.iter().map(|c| (c.name.clone(), c.healthy)).collect())
                .unwrap_or_default(),
        }
    }
}

/// Persistence of the arguments an addon was enabled with
#[async_trait]
pub trait AddonArgsStore: Send + Sync {
    async fn load(&self, addon: &str) -> Result<Option<Values>>;

    async fn save(&self, addon: &str, args: &Values) -> Result<()>;

    /// Remove stored arguments; missing ones are not an error
    async fn remove(&self, addon: &str) -> Result<()>;
}

/// Secret holding the arguments of an addon
pub fn args_secret(addon: &str, args: &Values) -> Result<Secret> {
    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(addon_secret_name(addon)),
            namespace: Some(oam::SYSTEM_NAMESPACE.to_string()),
            labels: Some([(oam::LABEL_ADDON_NAME.to_string(), addon.to_string())].into_iter().collect()),
            ..Default::default()
        },
        string_data: Some(
            [(ADDON_SECRET_KEY.to_string(), serde_json::to_string(args.inner())?)]
                .into_iter()
                .collect(),
        ),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    })
}

/// Arguments stored in an addon Secret
pub fn args_from_secret(secret: &Secret) -> Result<Values> {
    let raw = secret
        .data
        .as_ref()
        .and_then(|d| d.get(ADDON_SECRET_KEY))
        .map(|b| String::from_utf8_lossy(&b.0).into_owned())
        .or_else(|| secret.string_data.as_ref().and_then(|d| d.get(ADDON_SECRET_KEY)).cloned());
    match raw {
        Some(raw) => Ok(Values(serde_json::from_str(&raw)?)),
        None => Ok(Values::new()),
    }
}

/// Addon arguments kept in Secrets in `vela-system`
pub struct SecretArgsStore {
    api: Api<Secret>,
}

impl SecretArgsStore {
    pub fn new(client: kube::Client) -> Self {
        Self {
            api: Api::namespaced(client, oam::SYSTEM_NAMESPACE),
        }
    }
}

#[async_trait]
impl AddonArgsStore for SecretArgsStore {
    async fn load(&self, addon: &str) -> Result<Option<Values>> {
        match self.api.get_opt(&addon_secret_name(addon)).await? {
            Some(secret) => Ok(Some(args_from_secret(&secret)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, addon: &str, args: &Values) -> Result<()> {
        create_or_replace(&self.api, args_secret(addon, args)?).await?;
        Ok(())
    }

    async fn remove(&self, addon: &str) -> Result<()> {
        delete_if_exists(&self.api, &addon_secret_name(addon)).await?;
        Ok(())
    }
}

/// Check `system` requirements of an addon against platform versions
pub fn check_requirements(meta: &AddonMeta, vela_version: Option<&str>, kubernetes_version: Option<&str>) -> Result<()> {
    let Some(system) = &meta.system else {
        return Ok(());
    };
    let checks = [
        ("vela", system.vela.as_deref(), vela_version),
        ("kubernetes", system.kubernetes.as_deref(), kubernetes_version),
    ];
    for (what, requirement, actual) in checks {
        let (Some(requirement), Some(actual)) = (requirement, actual) else {
            continue;
        };
        let req = semver::VersionReq::parse(requirement).map_err(|e| {
            KubeError::InvalidConfig(format!("addon {} has invalid {} requirement {:?}: {}", meta.name, what, requirement, e))
        })?;
        let version = release_version(actual).ok_or_else(|| {
            KubeError::InvalidConfig(format!("cannot parse {} version {:?}", what, actual))
        })?;
        if !req.matches(&version) {
            return Err(KubeError::InvalidConfig(format!(
                "addon {} requires {} {}, but {} is {}",
                meta.name, what, requirement, what, actual
            )));
        }
    }
    Ok(())
}

/// Version without pre-release or build metadata: `v1.27.3-gke.1` -> `1.27.3`
fn release_version(version: &str) -> Option<semver::Version> {
    let parsed = semver::Version::parse(version.trim().trim_start_matches('v')).ok()?;
    Some(semver::Version::new(parsed.major, parsed.minor, parsed.patch))
}

/// Enables, upgrades and disables addons
pub struct AddonManager<'a> {
    apps: &'a dyn ApplicationStore,
    args: &'a dyn AddonArgsStore,
    renderer: AddonRenderer,
}

impl<'a> AddonManager<'a> {
    pub fn new(apps: &'a dyn ApplicationStore, args: &'a dyn AddonArgsStore) -> Result<Self> {
        Ok(Self {
            apps,
            args,
            renderer: AddonRenderer::new()?,
        })
    }

    /// Application of an enabled addon
    pub async fn application(&self, addon: &str) -> Result<Option<Application>> {
        self.apps.get_opt(oam::SYSTEM_NAMESPACE, &addon_app_name(addon)).await
    }

    pub async fn is_enabled(&self, addon: &str) -> Result<bool> {
        Ok(self.application(addon).await?.is_some())
    }

    pub async fn status(&self, addon: &str) -> Result<AddonStatus> {
        Ok(AddonStatus::from_app(addon, self.application(addon).await?.as_ref()))
    }

    /// Status of every addon with an application, by name
    pub async fn installed(&self) -> Result<BTreeMap<String, AddonStatus>> {
        let apps = self.apps.list(Some(oam::SYSTEM_NAMESPACE), Some(oam::LABEL_ADDON_NAME)).await?;
        Ok(apps
            .iter()
            .filter_map(|app| {
                let name = addon_name_from_app(app.metadata.name.as_deref()?)?;
                Some((name.to_string(), AddonStatus::from_app(name, Some(app))))
            })
            .collect())
    }

    /// Render and apply an addon, then store its arguments
    pub async fn enable(&self, package: &AddonPackage, args: &Values) -> Result<Application> {
        let app = self.renderer.render(package, args)?;
        tracing::debug!(addon = %package.meta.name, version = %package.meta.version, "enabling addon");
        let applied = self.apps.apply(&app).await?;
        self.args.save(&package.meta.name, args).await?;
        Ok(applied)
    }

    /// Re-enable an addon, starting from its stored arguments
    pub async fn upgrade(&self, package: &AddonPackage, args: &Values) -> Result<Application> {
        let name = &package.meta.name;
        if !self.is_enabled(name).await? {
            return Err(KubeError::AddonNotEnabled(name.clone()));
        }
        let mut merged = self.args.load(name).await?.unwrap_or_default();
        if merged.inner().is_null() {
            merged = Values::new();
        }
        merged.merge(args);
        self.enable(package, &merged).await
    }

    /// Delete an addon's application and arguments and wait until it is gone
    pub async fn disable(&self, addon: &str, poll: PollConfig) -> Result<()> {
        let app_name = addon_app_name(addon);
        match self.apps.delete(oam::SYSTEM_NAMESPACE, &app_name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Err(KubeError::AddonNotEnabled(addon.to_string())),
            Err(e) => return Err(e),
        }
        self.args.remove(addon).await?;

        let apps = self.apps;
        let app_name = app_name.as_str();
        poll_until(poll, &format!("waiting for addon {} to be disabled", addon), move || async move {
            Ok(!apps.exists(oam::SYSTEM_NAMESPACE, app_name).await?)
        })
        .await
    }

    /// Stored arguments of an addon
    pub async fn stored_args(&self, addon: &str) -> Result<Option<Values>> {
        self.args.load(addon).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockApplicationStore;
    use std::sync::Mutex;
    use std::time::Duration;
    use vela_core::AddonFile;
    use vela_core::addon::SystemRequirements;
    use vela_core::parse_key_values;

    #[derive(Default)]
    struct MemoryArgs {
        args: Mutex<BTreeMap<String, Values>>,
    }

    #[async_trait]
    impl AddonArgsStore for MemoryArgs {
        async fn load(&self, addon: &str) -> Result<Option<Values>> {
            Ok(self.args.lock().unwrap().get(addon).cloned())
        }

        async fn save(&self, addon: &str, args: &Values) -> Result<()> {
            self.args.lock().unwrap().insert(addon.to_string(), args.clone());
            Ok(())
        }

        async fn remove(&self, addon: &str) -> Result<()> {
            self.args.lock().unwrap().remove(addon);
            Ok(())
        }
    }

    fn package() -> AddonPackage {
        AddonPackage {
            meta: AddonMeta {
                name: "fluxcd".to_string(),
                version: "2.3.0".to_string(),
                ..Default::default()
            },
            registry: "KubeVela".to_string(),
            template: Some(AddonFile {
                path: "template.yaml".to_string(),
                content: "kind: Application\napiVersion: core.oam.dev/v1beta1\nmetadata:\n  name: flux\nspec:\n  components:\n    - name: flux\n      type: webservice\n      properties:\n        replicas: [[ args.replicas | default(1) ]]\n        image: [[ args.image | default('flux') ]]\n".to_string(),
            }),
            resources: Vec::new(),
        }
    }

    const FAST: PollConfig = PollConfig::new(Duration::from_millis(1), Duration::from_millis(50));

    #[tokio::test]
    async fn test_enable_stores_app_and_args() {
        let apps = MockApplicationStore::new();
        let args = MemoryArgs::default();
        let manager = AddonManager::new(&apps, &args).unwrap();

        let values = parse_key_values(&["replicas=2"]).unwrap();
        let app = manager.enable(&package(), &values).await.unwrap();
        assert_eq!(app.metadata.name.as_deref(), Some("addon-fluxcd"));
        assert_eq!(app.metadata.namespace.as_deref(), Some("vela-system"));

        assert!(manager.is_enabled("fluxcd").await.unwrap());
        assert_eq!(manager.stored_args("fluxcd").await.unwrap(), Some(values));

        let installed = manager.installed().await.unwrap();
        let status = &installed["fluxcd"];
        assert_eq!(status.version.as_deref(), Some("2.3.0"));
        assert_eq!(status.registry.as_deref(), Some("KubeVela"));
        assert_eq!(status.phase, AddonPhase::Enabling);
    }

    #[tokio::test]
    async fn test_upgrade_merges_stored_args() {
        let apps = MockApplicationStore::new();
        let args = MemoryArgs::default();
        let manager = AddonManager::new(&apps, &args).unwrap();

        let err = manager.upgrade(&package(), &Values::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "addon fluxcd is not enabled");

        manager
            .enable(&package(), &parse_key_values(&["replicas=2"]).unwrap())
            .await
            .unwrap();
        let app = manager
            .upgrade(&package(), &parse_key_values(&["image=flux:v2"]).unwrap())
            .await
            .unwrap();

        let props = app.spec.components[0].properties.as_ref().unwrap();
        assert_eq!(props["replicas"], 2);
        assert_eq!(props["image"], "flux:v2");
    }

    #[tokio::test]
    async fn test_disable() {
        let apps = MockApplicationStore::new();
        let args = MemoryArgs::default();
        let manager = AddonManager::new(&apps, &args).unwrap();

        let err = manager.disable("fluxcd", FAST).await.unwrap_err();
        assert!(matches!(err, KubeError::AddonNotEnabled(_)));

        manager.enable(&package(), &Values::new()).await.unwrap();
        manager.disable("fluxcd", FAST).await.unwrap();
        assert!(!manager.is_enabled("fluxcd").await.unwrap());
        assert_eq!(manager.stored_args("fluxcd").await.unwrap(), None);
    }

    #[test]
    fn test_args_secret_roundtrip() {
        let values = parse_key_values(&["replicas=2", "ha=true"]).unwrap();
        let secret = args_secret("fluxcd", &values).unwrap();
        assert_eq!(secret.metadata.name.as_deref(), Some("addon-secret-fluxcd"));
        assert_eq!(args_from_secret(&secret).unwrap(), values);
    }

    #[test]
    fn test_phase_of_app() {
        assert_eq!(AddonPhase::of(None), AddonPhase::Disabled);
        let mut app = crate::testing::app("vela-system", "addon-fluxcd");
        assert_eq!(AddonPhase::of(Some(&app)), AddonPhase::Enabling);
        app.status = Some(vela_core::ApplicationStatus {
            status: Some("running".to_string()),
            ..Default::default()
        });
        assert_eq!(AddonPhase::of(Some(&app)), AddonPhase::Enabled);
    }

    #[test]
    fn test_check_requirements() {
        let mut meta = AddonMeta {
            name: "velaux".to_string(),
            ..Default::default()
        };
        assert!(check_requirements(&meta, Some("0.3.0"), None).is_ok());

        meta.system = Some(SystemRequirements {
            vela: Some(">=0.2.0".to_string()),
            kubernetes: Some(">=1.20.0".to_string()),
        });
        assert!(check_requirements(&meta, Some("0.3.0"), Some("v1.27.3-gke.100")).is_ok());
        assert!(check_requirements(&meta, Some("0.3.0"), None).is_ok());

        let err = check_requirements(&meta, Some("0.3.0"), Some("v1.19.4")).unwrap_err();
        assert!(err.to_string().contains("requires kubernetes >=1.20.0"));
        assert!(check_requirements(&meta, None, Some("v1.20.0")).is_ok());
        assert!(check_requirements(&meta, Some("0.1.9"), None).is_err());
    }
}
