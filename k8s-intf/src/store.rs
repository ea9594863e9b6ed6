// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Read/write access to the cluster objects the webhooks need.
//!
//! Handlers only see these traits. [`crate::client::KubeStore`] implements them on top of the
//! API server; the `testing` feature provides an in-memory implementation.

use crate::kubevirt::VirtualMachineInstance;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },
    #[error("Conflict updating {kind} {key}")]
    Conflict { kind: &'static str, key: String },
    #[error("{kind} {key} lacks {what}")]
    Incomplete {
        kind: &'static str,
        key: String,
        what: &'static str,
    },
    #[error("Client error: {0}")]
    ClientError(#[from] kube::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Render a label set as a label selector, e.g. `a=b,c=d`.
#[must_use]
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// True if `labels` contains every pair of `selector`.
#[must_use]
pub fn labels_match(
    selector: &BTreeMap<String, String>,
    labels: Option<&BTreeMap<String, String>>,
) -> bool {
    selector.iter().all(|(key, value)| {
        labels
            .and_then(|labels| labels.get(key))
            .is_some_and(|found| found == value)
    })
}

#[async_trait]
pub trait PodStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Pod, StoreError>;

    /// Pods in `namespace` carrying all of `labels`.
    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, StoreError>;

    /// Replace a pod. Fails with [`StoreError::Conflict`] if its resource version is stale.
    async fn update(&self, pod: &Pod) -> Result<Pod, StoreError>;
}

#[async_trait]
pub trait VmiStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str)
    -> Result<VirtualMachineInstance, StoreError>;
}

#[async_trait]
pub trait SettingStore: Send + Sync {
    /// Value of a setting; `None` if the setting does not exist.
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError>;
}
