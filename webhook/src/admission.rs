// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Routing of admission requests to handlers.
//!
//! The raw object of a request is decoded once, by kind, into an [`AdmissionObject`] before any
//! handler runs. Handler failures become denied responses carrying the error message and code.

use async_trait::async_trait;
use k8s_intf::kubevirt::VirtualMachineInstanceMigration;
use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::WebhookError;
use crate::patch::{PatchOp, to_json_patch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Namespaced,
    Cluster,
}

/// What a handler registers for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// plural resource names
    pub names: Vec<&'static str>,
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub scope: Scope,
    pub operations: Vec<Operation>,
}

impl ResourceDescriptor {
    #[must_use]
    pub fn matches(&self, request: &AdmissionRequest<DynamicObject>) -> bool {
        self.group == request.resource.group
            && self.version == request.resource.version
            && self.names.contains(&request.resource.resource.as_str())
            && self.operations.contains(&request.operation)
    }
}

/// The decoded object of an admission request.
#[derive(Debug, Clone)]
pub enum AdmissionObject {
    Pod(Box<Pod>),
    Migration(Box<VirtualMachineInstanceMigration>),
}

impl AdmissionObject {
    pub fn decode(kind: &str, object: &DynamicObject) -> Result<Self, WebhookError> {
        let value = serde_json::to_value(object)?;
        match kind {
            "Pod" => Ok(AdmissionObject::Pod(Box::new(serde_json::from_value(value)?))),
            "VirtualMachineInstanceMigration" => Ok(AdmissionObject::Migration(Box::new(
                serde_json::from_value(value)?,
            ))),
            other => Err(WebhookError::BadRequest(format!(
                "unsupported object kind {other}"
            ))),
        }
    }
}

#[async_trait]
pub trait Mutator: Send + Sync {
    fn resource(&self) -> ResourceDescriptor;

    async fn create(
        &self,
        request: &AdmissionRequest<DynamicObject>,
        object: &AdmissionObject,
    ) -> Result<Vec<PatchOp>, WebhookError>;
}

#[async_trait]
pub trait Validator: Send + Sync {
    fn resource(&self) -> ResourceDescriptor;

    async fn create(
        &self,
        request: &AdmissionRequest<DynamicObject>,
        object: &AdmissionObject,
    ) -> Result<(), WebhookError>;
}

fn denied(request: &AdmissionRequest<DynamicObject>, err: &WebhookError) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request).deny(err.to_string());
    response.result.code = err.code();
    response
}

fn decode_object(
    request: &AdmissionRequest<DynamicObject>,
) -> Result<AdmissionObject, WebhookError> {
    let object = request
        .object
        .as_ref()
        .ok_or_else(|| WebhookError::BadRequest("request carries no object".to_string()))?;
    AdmissionObject::decode(&request.kind.kind, object)
}

#[derive(Default, Clone)]
pub struct Dispatcher {
    mutators: Vec<Arc<dyn Mutator>>,
    validators: Vec<Arc<dyn Validator>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mutator(mut self, mutator: Arc<dyn Mutator>) -> Self {
        self.mutators.push(mutator);
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Run the first matching mutator. Requests no mutator handles are allowed unchanged.
    pub async fn mutate(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let Some(mutator) = self.mutators.iter().find(|m| m.resource().matches(request)) else {
            debug!(uid = %request.uid, "No mutator for {}", request.resource.resource);
            return AdmissionResponse::from(request);
        };
        let ops = match decode_object(request) {
            Ok(object) => mutator.create(request, &object).await,
            Err(e) => Err(e),
        };
        let ops = match ops {
            Ok(ops) => ops,
            Err(e) => {
                warn!(uid = %request.uid, name = %request.name, "Mutation denied: {e}");
                return denied(request, &e);
            }
        };
        if ops.is_empty() {
            return AdmissionResponse::from(request);
        }
        info!(uid = %request.uid, patch_ops = ops.len(), "Patching {}", request.kind.kind);
        let response = to_json_patch(&ops)
            .map_err(WebhookError::from)
            .and_then(|patch| {
                AdmissionResponse::from(request)
                    .with_patch(patch)
                    .map_err(|e| WebhookError::Internal(e.to_string()))
            });
        match response {
            Ok(response) => response,
            Err(e) => {
                error!(uid = %request.uid, "Failed to serialize patch: {e}");
                denied(request, &WebhookError::Internal(e.to_string()))
            }
        }
    }

    /// Run every matching validator. The first failure denies the request.
    pub async fn validate(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let matching: Vec<_> = self
            .validators
            .iter()
            .filter(|v| v.resource().matches(request))
            .collect();
        if matching.is_empty() {
            debug!(uid = %request.uid, "No validator for {}", request.resource.resource);
            return AdmissionResponse::from(request);
        }
        let object = match decode_object(request) {
            Ok(object) => object,
            Err(e) => return denied(request, &e),
        };
        for validator in matching {
            if let Err(e) = validator.create(request, &object).await {
                warn!(uid = %request.uid, name = %request.name, "Validation failed: {e}");
                return denied(request, &e);
            }
        }
        AdmissionResponse::from(request)
    }
}
