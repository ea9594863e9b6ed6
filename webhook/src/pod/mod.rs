// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mutation of pods on creation.

pub mod classify;
pub mod launcher;
pub mod proxy;

use async_trait::async_trait;
use k8s_intf::{SettingStore, VmiStore};
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, Operation};
use std::sync::Arc;
use tracing::debug;

use crate::admission::{AdmissionObject, Mutator, ResourceDescriptor, Scope};
use crate::error::WebhookError;
use crate::patch::PatchOp;
use classify::{PodClass, classify};

pub struct PodMutator {
    settings: Arc<dyn SettingStore>,
    vmis: Arc<dyn VmiStore>,
    helper_image: String,
}

impl PodMutator {
    pub fn new(
        settings: Arc<dyn SettingStore>,
        vmis: Arc<dyn VmiStore>,
        helper_image: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            vmis,
            helper_image: helper_image.into(),
        }
    }
}

#[async_trait]
impl Mutator for PodMutator {
    fn resource(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            names: vec!["pods"],
            group: "",
            version: "v1",
            kind: "Pod",
            scope: Scope::Namespaced,
            operations: vec![Operation::Create],
        }
    }

    async fn create(
        &self,
        request: &AdmissionRequest<DynamicObject>,
        object: &AdmissionObject,
    ) -> Result<Vec<PatchOp>, WebhookError> {
        let AdmissionObject::Pod(pod) = object else {
            return Err(WebhookError::BadRequest("expected a pod".to_string()));
        };
        // pods created by controllers carry no namespace in the object itself
        let namespace = pod
            .metadata
            .namespace
            .as_deref()
            .or(request.namespace.as_deref())
            .unwrap_or("default");

        match classify(pod.metadata.labels.as_ref()) {
            PodClass::CoreService => {
                let mut ops = proxy::http_proxy_patches(self.settings.as_ref(), pod).await?;
                ops.extend(proxy::additional_ca_patches(self.settings.as_ref(), pod).await?);
                Ok(ops)
            }
            PodClass::Launcher => {
                launcher::launcher_patches(self.vmis.as_ref(), pod, namespace, &self.helper_image)
                    .await
            }
            PodClass::Unmatched => {
                debug!("Pod in {namespace} needs no mutation");
                Ok(vec![])
            }
        }
    }
}
