//! Definitions installed in the cluster
//!
//! Definitions are looked up in the application namespace and in
//! `vela-system`; a namespace-local definition shadows a system one.

use std::collections::BTreeMap;
use std::fmt::Debug;

use k8s_openapi::NamespaceResourceScope;
use kube::Api;
use kube::api::ListParams;
use serde::de::DeserializeOwned;
use vela_core::{
    ComponentDefinition, Definition, DefinitionKind, PolicyDefinition, TraitDefinition, WorkflowStepDefinition,
    oam,
};
use vela_engine::DefinitionCatalog;

use crate::error::Result;

/// Reads definitions through the Kubernetes API
pub struct DefinitionClient {
    client: kube::Client,
}

impl DefinitionClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Definitions of one kind visible from `namespace`, sorted by name
    pub async fn list(&self, kind: DefinitionKind, namespace: &str) -> Result<Vec<Definition>> {
        let system = self.list_in(kind, oam::SYSTEM_NAMESPACE).await?;
        if namespace == oam::SYSTEM_NAMESPACE {
            return Ok(merge_by_name(Vec::new(), system));
        }
        let local = self.list_in(kind, namespace).await?;
        Ok(merge_by_name(local, system))
    }

    /// Find a definition by name; without a kind every kind is searched
    pub async fn get(&self, name: &str, kind: Option<DefinitionKind>, namespace: &str) -> Result<Vec<Definition>> {
        let kinds: Vec<DefinitionKind> = match kind {
            Some(kind) => vec![kind],
            None => DefinitionKind::ALL.to_vec(),
        };
        let mut found = Vec::new();
        for kind in kinds {
            found.extend(self.list(kind, namespace).await?.into_iter().filter(|d| d.name == name));
        }
        Ok(found)
    }

    /// Catalogue of every definition kind visible from `namespace`
    pub async fn catalog(&self, namespace: &str) -> Result<DefinitionCatalog> {
        let mut definitions = Vec::new();
        for kind in DefinitionKind::ALL {
            definitions.extend(self.list(kind, namespace).await?);
        }
        tracing::debug!(%namespace, count = definitions.len(), "loaded definitions from cluster");
        Ok(DefinitionCatalog::from_definitions(definitions))
    }

    async fn list_in(&self, kind: DefinitionKind, namespace: &str) -> Result<Vec<Definition>> {
        match kind {
            DefinitionKind::Component => self.list_typed::<ComponentDefinition>(namespace).await,
            DefinitionKind::Trait => self.list_typed::<TraitDefinition>(namespace).await,
            DefinitionKind::Policy => self.list_typed::<PolicyDefinition>(namespace).await,
            DefinitionKind::WorkflowStep => self.list_typed::<WorkflowStepDefinition>(namespace).await,
        }
    }

    async fn list_typed<K>(&self, namespace: &str) -> Result<Vec<Definition>>
    where
        K: kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug
            + Into<Definition>,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.list(&ListParams::default()).await {
            Ok(list) => Ok(list.items.into_iter().map(Into::into).collect()),
            Err(kube::Error::Api(resp)) if resp.code == 404 => {
                tracing::warn!(kind = %K::kind(&()), "definition resource not served by the cluster");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Merge two lists by name, entries of `preferred` winning; sorted by name
pub fn merge_by_name(preferred: Vec<Definition>, fallback: Vec<Definition>) -> Vec<Definition> {
    let mut merged: BTreeMap<String, Definition> = BTreeMap::new();
    for def in fallback.into_iter().chain(preferred) {
        merged.insert(def.name.clone(), def);
    }
    merged.into_values().collect()
}
