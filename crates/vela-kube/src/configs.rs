//! Configs and config templates
//!
//! A config template is a ConfigMap `config-template-<name>` holding a CUE
//! template under the `template` key. A config is a Secret holding the
//! properties it was created with under `input-properties`; both carry the
//! `config.oam.dev/catalog=velacore-config` label.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::Api;
use kube::api::{ListParams, ObjectMeta};
use serde::Serialize;
use serde_json::Value as JsonValue;
use vela_core::{Values, oam};

use crate::error::{KubeError, Result};
use crate::objects::{create_or_replace, created_at, delete_if_exists};

/// Prefix of config template ConfigMaps
pub const TEMPLATE_PREFIX: &str = "config-template-";

/// Data key of a config template source
pub const TEMPLATE_KEY: &str = "template";

/// Data key of a config's properties
pub const PROPERTIES_KEY: &str = "input-properties";

/// A stored config
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigEntry {
    pub name: String,
    pub namespace: String,
    pub template: String,
    pub properties: JsonValue,
    pub created: String,
}

/// A stored config template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigTemplateEntry {
    pub name: String,
    pub namespace: String,
    pub created: String,
}

pub fn template_object_name(name: &str) -> String {
    format!("{}{}", TEMPLATE_PREFIX, name)
}

fn catalog_labels() -> BTreeMap<String, String> {
    [(oam::LABEL_CONFIG_CATALOG.to_string(), oam::CONFIG_CATALOG.to_string())]
        .into_iter()
        .collect()
}

fn catalog_selector() -> String {
    format!("{}={}", oam::LABEL_CONFIG_CATALOG, oam::CONFIG_CATALOG)
}

/// Secret representing a config
pub fn config_secret(namespace: &str, name: &str, template: &str, properties: &Values) -> Result<Secret> {
    let mut labels = catalog_labels();
    labels.insert(oam::LABEL_CONFIG_TYPE.to_string(), template.to_string());
    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        string_data: Some(
            [(PROPERTIES_KEY.to_string(), serde_json::to_string(properties.inner())?)]
                .into_iter()
                .collect(),
        ),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    })
}

/// Decode a config Secret
pub fn config_entry(secret: &Secret) -> ConfigEntry {
    let raw = secret
        .data
        .as_ref()
        .and_then(|d| d.get(PROPERTIES_KEY))
        .map(|b| String::from_utf8_lossy(&b.0).into_owned())
        .or_else(|| secret.string_data.as_ref().and_then(|d| d.get(PROPERTIES_KEY)).cloned());
    let properties = raw
        .and_then(|r| serde_json::from_str(&r).ok())
        .unwrap_or(JsonValue::Null);

    ConfigEntry {
        name: secret.metadata.name.clone().unwrap_or_default(),
        namespace: secret.metadata.namespace.clone().unwrap_or_default(),
        template: secret
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(oam::LABEL_CONFIG_TYPE))
            .cloned()
            .unwrap_or_default(),
        properties,
        created: created_at(secret),
    }
}

/// ConfigMap representing a config template
pub fn template_config_map(namespace: &str, name: &str, source: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(template_object_name(name)),
            namespace: Some(namespace.to_string()),
            labels: Some(catalog_labels()),
            ..Default::default()
        },
        data: Some([(TEMPLATE_KEY.to_string(), source.to_string())].into_iter().collect()),
        ..Default::default()
    }
}

/// Manages configs and templates through the Kubernetes API
pub struct ConfigClient {
    client: kube::Client,
}

impl ConfigClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn config_maps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// Create or update a config from a template
    pub async fn create_config(
        &self,
        namespace: &str,
        name: &str,
        template: &str,
        properties: &Values,
    ) -> Result<()> {
        self.get_template(oam::SYSTEM_NAMESPACE, template).await?;
        let secret = config_secret(namespace, name, template, properties)?;
        tracing::debug!(%namespace, %name, %template, "writing config");
        create_or_replace(&self.secrets(namespace), secret).await?;
        Ok(())
    }

    /// Configs in a namespace, optionally of one template
    pub async fn list_configs(&self, namespace: &str, template: Option<&str>) -> Result<Vec<ConfigEntry>> {
        let mut selector = catalog_selector();
        if let Some(template) = template {
            selector.push_str(&format!(",{}={}", oam::LABEL_CONFIG_TYPE, template));
        }
        let list = self.secrets(namespace).list(&ListParams::default().labels(&selector)).await?;
        Ok(list.items.iter().map(config_entry).collect())
    }

    /// Delete a config; returns `false` when it did not exist
    pub async fn delete_config(&self, namespace: &str, name: &str) -> Result<bool> {
        delete_if_exists(&self.secrets(namespace), name).await
    }

    /// Create or update a config template
    pub async fn apply_template(&self, namespace: &str, name: &str, source: &str) -> Result<()> {
        tracing::debug!(%namespace, %name, "writing config template");
        create_or_replace(&self.config_maps(namespace), template_config_map(namespace, name, source)).await?;
        Ok(())
    }

    /// Source of a config template
    pub async fn get_template(&self, namespace: &str, name: &str) -> Result<String> {
        self.config_maps(namespace)
            .get_opt(&template_object_name(name))
            .await?
            .and_then(|cm| cm.data.and_then(|mut d| d.remove(TEMPLATE_KEY)))
            .ok_or_else(|| KubeError::ConfigTemplateNotFound(name.to_string()))
    }

    pub async fn list_templates(&self, namespace: &str) -> Result<Vec<ConfigTemplateEntry>> {
        let params = ListParams::default().labels(&catalog_selector());
        let list = self.config_maps(namespace).list(&params).await?;
        Ok(list
            .items
            .iter()
            .filter_map(|cm| {
                let name = cm.metadata.name.as_deref()?.strip_prefix(TEMPLATE_PREFIX)?;
                Some(ConfigTemplateEntry {
                    name: name.to_string(),
                    namespace: cm.metadata.namespace.clone().unwrap_or_default(),
                    created: created_at(cm),
                })
            })
            .collect())
    }

    /// Delete a config template; returns `false` when it did not exist
    pub async fn delete_template(&self, namespace: &str, name: &str) -> Result<bool> {
        delete_if_exists(&self.config_maps(namespace), &template_object_name(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use serde_json::json;
    use vela_core::parse_key_values;

    #[test]
    fn test_config_secret_labels_and_data() {
        let props = parse_key_values(&["url=https://registry.example.com", "insecure=true"]).unwrap();
        let secret = config_secret("vela-system", "my-registry", "image-registry", &props).unwrap();

        let labels = secret.metadata.labels.as_ref().unwrap();
        assert_eq!(labels["config.oam.dev/catalog"], "velacore-config");
        assert_eq!(labels["config.oam.dev/type"], "image-registry");

        let entry = config_entry(&secret);
        assert_eq!(entry.template, "image-registry");
        assert_eq!(entry.properties["insecure"], json!(true));
    }

    #[test]
    fn test_config_entry_from_cluster_data() {
        let mut secret = config_secret("default", "db", "database", &Values::new()).unwrap();
        secret.string_data = None;
        secret.data = Some(
            [(PROPERTIES_KEY.to_string(), ByteString(br#"{"host":"db.local"}"#.to_vec()))]
                .into_iter()
                .collect(),
        );
        assert_eq!(config_entry(&secret).properties["host"], "db.local");
    }

    #[test]
    fn test_template_config_map() {
        let cm = template_config_map("vela-system", "image-registry", "parameter: {}\n");
        assert_eq!(cm.metadata.name.as_deref(), Some("config-template-image-registry"));
        assert_eq!(cm.data.as_ref().unwrap()[TEMPLATE_KEY], "parameter: {}\n");
        assert_eq!(
            cm.metadata.labels.as_ref().unwrap()[oam::LABEL_CONFIG_CATALOG],
            oam::CONFIG_CATALOG
        );
    }
}
