// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The subset of the `kubevirt.io/v1` API the webhooks read.
//!
//! Only the fields that take part in network naming are modelled; everything else in the
//! objects is ignored on deserialization.

use kube::CustomResource;
use namescheme::{AttachmentRef, InstanceInterfaceStatus, LogicalNetwork};
use serde::{Deserialize, Serialize};

/// Label kubevirt puts on launcher pods, holding the name of the VM instance.
pub const VM_NAME_LABEL: &str = "vm.kubevirt.io/name";

/// API group of kubevirt owner references.
pub const KUBEVIRT_GROUP: &str = "kubevirt.io";

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachineInstance",
    plural = "virtualmachineinstances",
    namespaced,
    status = "VirtualMachineInstanceStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<Network>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<PodNetwork>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multus: Option<MultusNetwork>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_network_cidr: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultusNetwork {
    /// `namespace/name` or `name` of the network attachment definition
    pub network_name: String,
    #[serde(default)]
    pub default: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<VirtualMachineInstanceNetworkInterface>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceNetworkInterface {
    /// logical network name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_source: Option<String>,
}

impl VirtualMachineInstance {
    /// Declared networks, with attachment references resolved against the VMI namespace.
    #[must_use]
    pub fn logical_networks(&self) -> Vec<LogicalNetwork> {
        let namespace = self.metadata.namespace.as_deref().unwrap_or("default");
        self.spec
            .networks
            .iter()
            .map(|network| match &network.multus {
                Some(multus) => LogicalNetwork::multus(
                    &network.name,
                    AttachmentRef::parse(&multus.network_name, namespace),
                    multus.default,
                ),
                None => LogicalNetwork::pod(&network.name),
            })
            .collect()
    }

    /// Interfaces reported by the running instance, keyed by logical network name.
    #[must_use]
    pub fn interface_statuses(&self) -> Vec<InstanceInterfaceStatus> {
        let Some(status) = &self.status else {
            return vec![];
        };
        status
            .interfaces
            .iter()
            .filter_map(|iface| {
                let mut ips = iface.ip_addresses.clone();
                if ips.is_empty()
                    && let Some(ip) = &iface.ip_address
                {
                    ips.push(ip.clone());
                }
                Some(InstanceInterfaceStatus {
                    logical_name: iface.name.clone()?,
                    mac: iface.mac.clone(),
                    ips,
                })
            })
            .collect()
    }
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachineInstanceMigration",
    plural = "virtualmachineinstancemigrations",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceMigrationSpec {
    pub vmi_name: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const VMI: &str = r#"{
        "apiVersion": "kubevirt.io/v1",
        "kind": "VirtualMachineInstance",
        "metadata": {"name": "vm2", "namespace": "default"},
        "spec": {
            "domain": {"devices": {"interfaces": [{"bridge": {}, "model": "virtio", "name": "default"}]}},
            "evictionStrategy": "LiveMigrate",
            "networks": [
                {"name": "mgmt", "pod": {}},
                {"multus": {"networkName": "default/workload"}, "name": "default"},
                {"multus": {"networkName": "storage"}, "name": "nic-2"}
            ]
        },
        "status": {
            "phase": "Running",
            "interfaces": [
                {
                    "infoSource": "domain, guest-agent, multus-status",
                    "interfaceName": "enp1s0",
                    "ipAddress": "192.168.122.85",
                    "ipAddresses": ["192.168.122.85", "fe80::7c0e:80ff:fe20:19f5"],
                    "mac": "7e:0e:80:20:19:f5",
                    "name": "default",
                    "queueCount": 1
                },
                {"interfaceName": "enp2s0", "ipAddress": "10.0.0.4", "mac": "7e:0e:80:20:19:f6", "name": "nic-2"},
                {"interfaceName": "lo"}
            ]
        }
    }"#;

    #[test]
    fn test_decode_vmi() {
        let vmi: VirtualMachineInstance = serde_json::from_str(VMI).unwrap();
        assert_eq!(vmi.spec.networks.len(), 3);
        assert_eq!(
            vmi.logical_networks(),
            vec![
                LogicalNetwork::pod("mgmt"),
                LogicalNetwork::multus("default", AttachmentRef::new("default", "workload"), false),
                LogicalNetwork::multus("nic-2", AttachmentRef::new("default", "storage"), false),
            ]
        );
        let statuses = vmi.interface_statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].mac.as_deref(), Some("7e:0e:80:20:19:f5"));
        assert_eq!(statuses[0].ips.len(), 2);
        assert_eq!(statuses[1].ips, vec!["10.0.0.4".to_string()]);
    }

    #[test]
    fn test_decode_migration() {
        let vmim: VirtualMachineInstanceMigration = serde_json::from_str(
            r#"{
                "apiVersion": "kubevirt.io/v1",
                "kind": "VirtualMachineInstanceMigration",
                "metadata": {"name": "vm2-migration", "namespace": "default"},
                "spec": {"vmiName": "vm2"}
            }"#,
        )
        .unwrap();
        assert_eq!(vmim.spec.vmi_name, "vm2");
    }
}
