// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DynamicObject, ListParams, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::kubevirt::VirtualMachineInstance;
use crate::settings::setting_api_resource;
use crate::store::{PodStore, SettingStore, StoreError, VmiStore, label_selector};

/// Resource stores backed by the API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect with the in-cluster or kubeconfig credentials.
    ///
    /// # Errors
    /// Returns an error if no usable configuration is found.
    pub async fn try_default() -> Result<Self, StoreError> {
        let client = Client::try_default().await?;
        info!("Connected to the API server");
        Ok(Self::new(client))
    }
}

fn map_error(err: kube::Error, kind: &'static str, key: String) -> StoreError {
    match err {
        kube::Error::Api(ref api_error) if api_error.code == 404 => {
            StoreError::NotFound { kind, key }
        }
        kube::Error::Api(ref api_error) if api_error.code == 409 => {
            StoreError::Conflict { kind, key }
        }
        err => err.into(),
    }
}

#[async_trait]
impl PodStore for KubeStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Pod, StoreError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.get(name)
            .await
            .map_err(|e| map_error(e, "Pod", format!("{namespace}/{name}")))
    }

    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, StoreError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let selector = label_selector(labels);
        debug!("Listing pods in {namespace} with selector '{selector}'");
        let list = pods.list(&ListParams::default().labels(&selector)).await?;
        Ok(list.items)
    }

    async fn update(&self, pod: &Pod) -> Result<Pod, StoreError> {
        let (Some(namespace), Some(name)) = (&pod.metadata.namespace, &pod.metadata.name) else {
            return Err(StoreError::Incomplete {
                kind: "Pod",
                key: format!("{:?}", pod.metadata.generate_name),
                what: "namespace or name",
            });
        };
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.replace(name, &PostParams::default(), pod)
            .await
            .map_err(|e| map_error(e, "Pod", format!("{namespace}/{name}")))
    }
}

#[async_trait]
impl VmiStore for KubeStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<VirtualMachineInstance, StoreError> {
        let vmis: Api<VirtualMachineInstance> = Api::namespaced(self.client.clone(), namespace);
        vmis.get(name).await.map_err(|e| {
            map_error(e, "VirtualMachineInstance", format!("{namespace}/{name}"))
        })
    }
}

#[async_trait]
impl SettingStore for KubeStore {
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let settings: Api<DynamicObject> =
            Api::all_with(self.client.clone(), &setting_api_resource());
        let Some(setting) = settings.get_opt(name).await? else {
            return Ok(None);
        };
        let value = setting
            .data
            .get("value")
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        Ok(Some(value.to_string()))
    }
}
