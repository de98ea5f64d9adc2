//! VelaQL views and queries
//!
//! Views are CUE templates stored as ConfigMaps in `vela-system`. Queries on
//! stored views go through the API server proxy to the `vela-core` service;
//! a view file can also be evaluated locally with the `cue` binary.

use k8s_openapi::api::core::v1::ConfigMap;
use kube::Api;
use kube::api::{ListParams, ObjectMeta};
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use vela_core::velaql::is_valid_view_name;
use vela_core::{QueryView, oam};
use vela_engine::CueRuntime;
use vela_engine::cue::compose_source;

use crate::error::{KubeError, Result};
use crate::objects::{create_or_replace, created_at, delete_if_exists};

/// Data key of a view template
pub const VIEW_TEMPLATE_KEY: &str = "template";

/// Service answering VelaQL queries
pub const QUERY_SERVICE: &str = "vela-core:9098";

/// A stored view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEntry {
    pub name: String,
    pub created: String,
}

/// ConfigMap holding a view template
pub fn view_config_map(name: &str, template: &str) -> Result<ConfigMap> {
    if !is_valid_view_name(name) {
        return Err(KubeError::InvalidViewName(name.to_string()));
    }
    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(oam::SYSTEM_NAMESPACE.to_string()),
            labels: Some([(oam::LABEL_VELAQL_VIEW.to_string(), name.to_string())].into_iter().collect()),
            ..Default::default()
        },
        data: Some([(VIEW_TEMPLATE_KEY.to_string(), template.to_string())].into_iter().collect()),
        ..Default::default()
    })
}

/// API server proxy path answering a statement
pub fn query_path(statement: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(statement.as_bytes()).collect();
    format!(
        "/api/v1/namespaces/{}/services/{}/proxy/api/v1/query?velaql={}",
        oam::SYSTEM_NAMESPACE,
        QUERY_SERVICE,
        encoded
    )
}

/// Evaluate a view template locally and return its exported field
pub fn evaluate_locally(cue: &dyn CueRuntime, template: &str, query: &QueryView) -> Result<JsonValue> {
    let source = compose_source(template, &JsonValue::Object(query.parameter.clone()), &json!({}));
    Ok(cue.export(&source, Some(&query.export))?)
}

/// Manages views and runs queries through the Kubernetes API
pub struct ViewClient {
    client: kube::Client,
}

impl ViewClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    fn api(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), oam::SYSTEM_NAMESPACE)
    }

    /// Store a view
    pub async fn apply(&self, name: &str, template: &str) -> Result<()> {
        let cm = view_config_map(name, template)?;
        tracing::debug!(view = %name, "writing view");
        create_or_replace(&self.api(), cm).await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<ViewEntry>> {
        let list = self.api().list(&ListParams::default().labels(oam::LABEL_VELAQL_VIEW)).await?;
        let mut views: Vec<ViewEntry> = list
            .items
            .iter()
            .map(|cm| ViewEntry {
                name: cm.metadata.name.clone().unwrap_or_default(),
                created: created_at(cm),
            })
            .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(views)
    }

    /// Template of a stored view
    pub async fn get(&self, name: &str) -> Result<String> {
        self.api()
            .get_opt(name)
            .await?
            .and_then(|cm| cm.data.and_then(|mut d| d.remove(VIEW_TEMPLATE_KEY)))
            .ok_or_else(|| KubeError::ViewNotFound(name.to_string()))
    }

    /// Delete a view; returns `false` when it did not exist
    pub async fn delete(&self, name: &str) -> Result<bool> {
        delete_if_exists(&self.api(), name).await
    }

    /// Run a statement on the control plane
    pub async fn query(&self, statement: &str) -> Result<JsonValue> {
        QueryView::parse(statement)?;
        let request = http::Request::get(query_path(statement))
            .body(Vec::new())
            .map_err(|e| KubeError::Query(e.to_string()))?;
        tracing::debug!(%statement, "running query");
        let text = self.client.request_text(request).await.map_err(|e| match e {
            kube::Error::Api(resp) if resp.code == 404 => {
                KubeError::Query(format!("view or query service not found: {}", resp.message))
            }
            other => KubeError::Api(other),
        })?;
        serde_json::from_str(&text).map_err(|e| KubeError::Query(format!("invalid response: {}", e)))
    }
}
