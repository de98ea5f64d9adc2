//! Small helpers over typed APIs

use std::fmt::Debug;

use chrono::SecondsFormat;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Create an object, or replace the existing one with the same name
pub(crate) async fn create_or_replace<K>(api: &Api<K>, mut object: K) -> Result<K>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    let name = object.name_any();
    match api.get_opt(&name).await? {
        Some(existing) => {
            object.meta_mut().resource_version = existing.resource_version();
            Ok(api.replace(&name, &PostParams::default(), &object).await?)
        }
        None => Ok(api.create(&PostParams::default(), &object).await?),
    }
}

/// Delete an object; returns `false` when it did not exist
pub(crate) async fn delete_if_exists<K>(api: &Api<K>, name: &str) -> Result<bool>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Creation time of an object as RFC 3339, empty when unknown
pub(crate) fn created_at<K: Resource>(object: &K) -> String {
    object
        .meta()
        .creation_timestamp
        .as_ref()
        .map(|t| t.0.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}
