// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! In-memory stores for tests.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::kubevirt::VirtualMachineInstance;
use crate::store::{PodStore, SettingStore, StoreError, VmiStore, labels_match};

fn key_of(namespace: Option<&String>, name: Option<&String>) -> (String, String) {
    (
        namespace.cloned().unwrap_or_default(),
        name.cloned().unwrap_or_default(),
    )
}

/// Stores every object kind in memory.
///
/// Pod updates follow optimistic concurrency: an update whose resource version differs from the
/// stored one fails with [`StoreError::Conflict`]. A number of conflicts can also be injected
/// up front to exercise retries.
#[derive(Default)]
pub struct MemoryStore {
    pods: Mutex<Vec<Pod>>,
    vmis: Mutex<Vec<VirtualMachineInstance>>,
    settings: Mutex<BTreeMap<String, String>>,
    updates: AtomicUsize,
    forced_conflicts: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pod(self, pod: Pod) -> Self {
        self.pods.lock().unwrap().push(pod);
        self
    }

    #[must_use]
    pub fn with_vmi(self, vmi: VirtualMachineInstance) -> Self {
        self.vmis.lock().unwrap().push(vmi);
        self
    }

    #[must_use]
    pub fn with_setting(self, name: &str, value: &str) -> Self {
        self.settings
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Make the next `count` pod updates fail with a conflict.
    #[must_use]
    pub fn with_conflicts(self, count: usize) -> Self {
        self.forced_conflicts.store(count, Ordering::SeqCst);
        self
    }

    /// Number of pod updates that were applied.
    #[must_use]
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.pods
            .lock()
            .unwrap()
            .iter()
            .find(|pod| {
                key_of(pod.metadata.namespace.as_ref(), pod.metadata.name.as_ref())
                    == (namespace.to_string(), name.to_string())
            })
            .cloned()
    }
}

#[async_trait]
impl PodStore for MemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Pod, StoreError> {
        self.pod(namespace, name).ok_or_else(|| StoreError::NotFound {
            kind: "Pod",
            key: format!("{namespace}/{name}"),
        })
    }

    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, StoreError> {
        Ok(self
            .pods
            .lock()
            .unwrap()
            .iter()
            .filter(|pod| pod.metadata.namespace.as_deref() == Some(namespace))
            .filter(|pod| labels_match(labels, pod.metadata.labels.as_ref()))
            .cloned()
            .collect())
    }

    async fn update(&self, pod: &Pod) -> Result<Pod, StoreError> {
        let key = key_of(pod.metadata.namespace.as_ref(), pod.metadata.name.as_ref());
        let display = format!("{}/{}", key.0, key.1);
        let forced = self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let mut pods = self.pods.lock().unwrap();
        let stored = pods
            .iter_mut()
            .find(|p| key_of(p.metadata.namespace.as_ref(), p.metadata.name.as_ref()) == key)
            .ok_or_else(|| StoreError::NotFound {
                kind: "Pod",
                key: display.clone(),
            })?;

        if forced || stored.metadata.resource_version != pod.metadata.resource_version {
            // simulate a concurrent writer
            let version: u64 = stored
                .metadata
                .resource_version
                .as_deref()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            stored.metadata.resource_version = Some((version + 1).to_string());
            return Err(StoreError::Conflict {
                kind: "Pod",
                key: display,
            });
        }

        let version: u64 = pod
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let mut updated = pod.clone();
        updated.metadata.resource_version = Some((version + 1).to_string());
        *stored = updated.clone();
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }
}

#[async_trait]
impl VmiStore for MemoryStore {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<VirtualMachineInstance, StoreError> {
        self.vmis
            .lock()
            .unwrap()
            .iter()
            .find(|vmi| {
                key_of(vmi.metadata.namespace.as_ref(), vmi.metadata.name.as_ref())
                    == (namespace.to_string(), name.to_string())
            })
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "VirtualMachineInstance",
                key: format!("{namespace}/{name}"),
            })
    }
}

#[async_trait]
impl SettingStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.settings.lock().unwrap().get(name).cloned())
    }
}
