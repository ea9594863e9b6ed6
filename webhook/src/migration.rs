// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Network status rewrite on live migration.
//!
//! A launcher pod created before the naming scheme changed reports ordinal interface names in
//! its network status annotation. When a migration of its VM instance is requested, the status
//! is rewritten to the hashed names the target pod will use.

use async_trait::async_trait;
use k8s_intf::kubevirt::VM_NAME_LABEL;
use k8s_intf::multus::{NETWORK_STATUS_ANNOTATION, NetworkStatus, parse_network_status};
use k8s_intf::{PodStore, VmiStore};
use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, Operation};
use namescheme::{NetworkIdentity, is_ordinal};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::admission::{AdmissionObject, ResourceDescriptor, Scope, Validator};
use crate::error::WebhookError;

/// Attempts at updating a pod that keeps changing under us.
pub const NUM_CONFLICT_RETRIES: usize = 3;

const RUNNING: &str = "Running";

fn is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        == Some(RUNNING)
}

/// Rewrite the ordinal interfaces of a network status list. Returns `None` if nothing changed.
#[must_use]
pub fn rewrite_network_status(
    statuses: &[NetworkStatus],
    pod_namespace: &str,
    identity: &NetworkIdentity,
) -> Option<Vec<NetworkStatus>> {
    let mut changed = false;
    let rewritten: Vec<NetworkStatus> = statuses
        .iter()
        .map(|status| {
            let mut status = status.clone();
            if !status.default && is_ordinal(&status.interface) {
                let attachment = status.attachment(pod_namespace);
                if let Some(resolved) = identity.resolve(&status.interface, &attachment) {
                    debug!("{attachment}: {} -> {}", status.interface, resolved.pod_name);
                    status.interface = resolved.pod_name.to_string();
                    changed = true;
                }
            }
            status
        })
        .collect();
    changed.then_some(rewritten)
}

/// The pod with its network status annotation rewritten, or `None` if no change is needed.
pub fn rewrite_pod(pod: &Pod, identity: &NetworkIdentity) -> Result<Option<Pod>, WebhookError> {
    let Some(annotation) = pod
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(NETWORK_STATUS_ANNOTATION))
    else {
        return Ok(None);
    };
    let statuses = match parse_network_status(annotation) {
        Ok(statuses) => statuses,
        Err(e) => {
            error!("Ignoring network status of {:?}: {e}", pod.metadata.name);
            return Ok(None);
        }
    };
    let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");
    let Some(rewritten) = rewrite_network_status(&statuses, namespace, identity) else {
        return Ok(None);
    };
    let mut pod = pod.clone();
    pod.metadata.annotations.get_or_insert_with(BTreeMap::new).insert(
        NETWORK_STATUS_ANNOTATION.to_string(),
        serde_json::to_string(&rewritten)?,
    );
    Ok(Some(pod))
}

pub struct MigrationValidator {
    pods: Arc<dyn PodStore>,
    vmis: Arc<dyn VmiStore>,
}

impl MigrationValidator {
    pub fn new(pods: Arc<dyn PodStore>, vmis: Arc<dyn VmiStore>) -> Self {
        Self { pods, vmis }
    }

    /// Select the launcher pod of `vmi_name`: the running one, else the first one listed.
    async fn launcher_pod(
        &self,
        namespace: &str,
        vmi_name: &str,
    ) -> Result<Option<Pod>, WebhookError> {
        let selector = BTreeMap::from([(VM_NAME_LABEL.to_string(), vmi_name.to_string())]);
        let pods = self.pods.list(namespace, &selector).await?;
        let running = pods.iter().filter(|pod| is_running(pod)).count();
        if running > 1 {
            return Err(WebhookError::Internal(format!(
                "expected to find only 1 running pod for the vmi label but found {running}"
            )));
        }
        let target = pods
            .iter()
            .find(|pod| is_running(pod))
            .or_else(|| pods.first())
            .cloned();
        Ok(target)
    }

    /// Rewrite the network status of the launcher pod of `vmi_name`.
    pub async fn reconcile(&self, namespace: &str, vmi_name: &str) -> Result<(), WebhookError> {
        let Some(mut pod) = self.launcher_pod(namespace, vmi_name).await? else {
            debug!("No launcher pod for {namespace}/{vmi_name}");
            return Ok(());
        };
        let vmi = self.vmis.get(namespace, vmi_name).await?;
        let identity = NetworkIdentity::new(&vmi.logical_networks(), &vmi.interface_statuses());

        let mut attempt = 1;
        loop {
            let Some(updated) = rewrite_pod(&pod, &identity)? else {
                debug!("Network status of {namespace}/{vmi_name} is up to date");
                return Ok(());
            };
            match self.pods.update(&updated).await {
                Ok(_) => {
                    info!("Updated network status of launcher pod for {namespace}/{vmi_name}");
                    return Ok(());
                }
                Err(e) if e.is_conflict() && attempt < NUM_CONFLICT_RETRIES => {
                    warn!("Conflict updating launcher pod (attempt {attempt}), retrying");
                    attempt += 1;
                    let name = pod.metadata.name.clone().unwrap_or_default();
                    pod = self.pods.get(namespace, &name).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl Validator for MigrationValidator {
    fn resource(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            names: vec!["virtualmachineinstancemigrations"],
            group: "kubevirt.io",
            version: "v1",
            kind: "VirtualMachineInstanceMigration",
            scope: Scope::Namespaced,
            operations: vec![Operation::Create],
        }
    }

    async fn create(
        &self,
        request: &AdmissionRequest<DynamicObject>,
        object: &AdmissionObject,
    ) -> Result<(), WebhookError> {
        let AdmissionObject::Migration(migration) = object else {
            return Err(WebhookError::BadRequest(
                "expected a VirtualMachineInstanceMigration".to_string(),
            ));
        };
        let namespace = migration
            .metadata
            .namespace
            .as_deref()
            .or(request.namespace.as_deref())
            .unwrap_or("default");
        self.reconcile(namespace, &migration.spec.vmi_name).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_intf::kubevirt::VirtualMachineInstance;
    use k8s_intf::testing::MemoryStore;
    use namescheme::hashed_interface_name;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tracing_test::traced_test;

    const STATUS: &str = r#"[
        {"name":"k8s-pod-network","interface":"eth0","ips":["10.52.2.16"],"mac":"9e:2b:a8:a4:63:9e","default":true,"dns":{}},
        {"name":"default/workload","interface":"net1","ips":["192.168.122.85"],"mac":"7e:0e:80:20:19:f5","dns":{}}
    ]"#;

    fn vmi() -> VirtualMachineInstance {
        serde_json::from_value(json!({
            "apiVersion": "kubevirt.io/v1",
            "kind": "VirtualMachineInstance",
            "metadata": {"name": "vm2", "namespace": "default"},
            "spec": {"networks": [{"name": "default", "multus": {"networkName": "default/workload"}}]}
        }))
        .unwrap()
    }

    fn launcher(name: &str, phase: &str, status: &str) -> Pod {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": name,
                "namespace": "default",
                "resourceVersion": "1",
                "labels": {"kubevirt.io": "virt-launcher", "vm.kubevirt.io/name": "vm2"},
                "annotations": {"k8s.v1.cni.cncf.io/network-status": status}
            },
            "status": {"phase": phase}
        }))
        .unwrap()
    }

    fn statuses(pod: &Pod) -> Value {
        let annotations = pod.metadata.annotations.as_ref().unwrap();
        serde_json::from_str(&annotations[NETWORK_STATUS_ANNOTATION]).unwrap()
    }

    fn validator(store: &Arc<MemoryStore>) -> MigrationValidator {
        MigrationValidator::new(store.clone(), store.clone())
    }

    #[tokio::test]
    #[traced_test]
    async fn test_reconcile_rewrites_status() {
        let store = Arc::new(
            MemoryStore::new()
                .with_vmi(vmi())
                .with_pod(launcher("virt-launcher-vm2-abcde", "Running", STATUS)),
        );
        validator(&store).reconcile("default", "vm2").await.unwrap();
        assert_eq!(store.updates(), 1);

        let pod = store.pod("default", "virt-launcher-vm2-abcde").unwrap();
        let status = statuses(&pod);
        // order and untouched fields are kept
        assert_eq!(status[0]["interface"], "eth0");
        assert_eq!(status[0]["default"], true);
        assert_eq!(status[1]["interface"], "pod37a8eec1ce1");
        assert_eq!(status[1]["mac"], "7e:0e:80:20:19:f5");
        assert_eq!(status[1]["dns"], json!({}));

        // a second run finds nothing to do
        validator(&store).reconcile("default", "vm2").await.unwrap();
        assert_eq!(store.updates(), 1);
        assert!(logs_contain("is up to date"));
    }

    #[tokio::test]
    async fn test_no_pods() {
        let store = Arc::new(MemoryStore::new().with_vmi(vmi()));
        validator(&store).reconcile("default", "vm2").await.unwrap();
        assert_eq!(store.updates(), 0);
    }

    #[tokio::test]
    async fn test_multiple_running_pods() {
        let store = Arc::new(
            MemoryStore::new()
                .with_vmi(vmi())
                .with_pod(launcher("virt-launcher-vm2-aaaaa", "Running", STATUS))
                .with_pod(launcher("virt-launcher-vm2-bbbbb", "Running", STATUS)),
        );
        let err = validator(&store).reconcile("default", "vm2").await.unwrap_err();
        assert_eq!(err.code(), 500);
        assert!(err.to_string().contains("found 2"));
        assert_eq!(store.updates(), 0);
    }

    #[tokio::test]
    async fn test_running_pod_is_targeted() {
        let store = Arc::new(
            MemoryStore::new()
                .with_vmi(vmi())
                .with_pod(launcher("virt-launcher-vm2-aaaaa", "Succeeded", STATUS))
                .with_pod(launcher("virt-launcher-vm2-bbbbb", "Running", STATUS)),
        );
        validator(&store).reconcile("default", "vm2").await.unwrap();
        let done = store.pod("default", "virt-launcher-vm2-aaaaa").unwrap();
        let target = store.pod("default", "virt-launcher-vm2-bbbbb").unwrap();
        assert_eq!(statuses(&done)[1]["interface"], "net1");
        assert_eq!(statuses(&target)[1]["interface"], "pod37a8eec1ce1");
    }

    #[tokio::test]
    async fn test_missing_vmi() {
        let store = Arc::new(
            MemoryStore::new().with_pod(launcher("virt-launcher-vm2-abcde", "Running", STATUS)),
        );
        let err = validator(&store).reconcile("default", "vm2").await.unwrap_err();
        assert_eq!(err.code(), 404);
    }

    #[tokio::test]
    async fn test_conflict_is_retried() {
        let store = Arc::new(
            MemoryStore::new()
                .with_vmi(vmi())
                .with_pod(launcher("virt-launcher-vm2-abcde", "Running", STATUS))
                .with_conflicts(2),
        );
        validator(&store).reconcile("default", "vm2").await.unwrap();
        assert_eq!(store.updates(), 1);

        let store = Arc::new(
            MemoryStore::new()
                .with_vmi(vmi())
                .with_pod(launcher("virt-launcher-vm2-abcde", "Running", STATUS))
                .with_conflicts(NUM_CONFLICT_RETRIES),
        );
        let err = validator(&store).reconcile("default", "vm2").await.unwrap_err();
        assert!(matches!(err, WebhookError::Store(e) if e.is_conflict()));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_malformed_status_is_ignored() {
        let store = Arc::new(
            MemoryStore::new()
                .with_vmi(vmi())
                .with_pod(launcher("virt-launcher-vm2-abcde", "Running", "{oops")),
        );
        validator(&store).reconcile("default", "vm2").await.unwrap();
        assert_eq!(store.updates(), 0);
        assert!(logs_contain("Ignoring network status"));
    }

    #[test]
    fn test_rewrite_network_status_keeps_unresolvable() {
        let statuses = parse_network_status(
            r#"[{"name":"default/other","interface":"net1"},{"name":"default/workload","interface":"net2"}]"#,
        )
        .unwrap();
        let vmi = vmi();
        let identity = NetworkIdentity::new(&vmi.logical_networks(), &[]);
        let rewritten = rewrite_network_status(&statuses, "default", &identity).unwrap();
        assert_eq!(rewritten[0].interface, "net1");
        assert_eq!(rewritten[1].interface, hashed_interface_name("default").as_str());

        let rewritten_again = rewrite_network_status(&rewritten, "default", &identity);
        assert_eq!(rewritten_again, None);
    }
}
