// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Correlate the networks of a VM instance with pod interface names.
//!
//! The same secondary network is known by its logical name (VM spec and status), by its
//! attachment reference (pod annotations) and by its pod interface name (kernel). The maps below
//! join these keys.

use crate::ifname::InterfaceName;
use crate::network::{AttachmentRef, InstanceInterfaceStatus, LogicalNetwork};
use crate::scheme::{NamingScheme, PRIMARY_POD_INTERFACE, hashed_interface_name, naming_scheme};
use std::collections::BTreeMap;

/// Non-default multus networks, in declaration order.
pub fn secondary_networks(networks: &[LogicalNetwork]) -> impl Iterator<Item = &LogicalNetwork> {
    networks.iter().filter(|network| network.is_secondary())
}

/// The network an ordinal interface `net<index>` was created for. Indices start at 1.
#[must_use]
pub fn ordinal_network(networks: &[LogicalNetwork], index: u32) -> Option<&LogicalNetwork> {
    let position = usize::try_from(index.checked_sub(1)?).ok()?;
    secondary_networks(networks).nth(position)
}

/// Map logical network names to their hashed pod interface name.
///
/// The default network, be it the pod network or a default multus network, is the primary pod
/// interface. The first one declared wins.
#[must_use]
pub fn logical_to_pod_name_map(networks: &[LogicalNetwork]) -> BTreeMap<String, InterfaceName> {
    let mut map: BTreeMap<String, InterfaceName> = secondary_networks(networks)
        .map(|network| (network.name.clone(), hashed_interface_name(&network.name)))
        .collect();
    if let Some(default) = networks.iter().find(|network| network.is_default) {
        map.insert(
            default.name.clone(),
            InterfaceName::new_unchecked(PRIMARY_POD_INTERFACE.to_string()),
        );
    }
    map
}

/// Map attachment references of secondary networks to their hashed pod interface name.
///
/// If several networks use the same attachment, the first one declared wins.
#[must_use]
pub fn attachment_to_pod_name_map(
    networks: &[LogicalNetwork],
) -> BTreeMap<AttachmentRef, InterfaceName> {
    let by_logical = logical_to_pod_name_map(networks);
    let mut map = BTreeMap::new();
    for network in secondary_networks(networks) {
        if let (Some(attachment), Some(pod_name)) =
            (&network.attachment, by_logical.get(&network.name))
        {
            map.entry(attachment.clone())
                .or_insert_with(|| pod_name.clone());
        }
    }
    map
}

/// Map attachment references to the MAC address the running instance reports for them.
#[must_use]
pub fn attachment_to_mac_map(
    interfaces: &[InstanceInterfaceStatus],
    networks: &[LogicalNetwork],
) -> BTreeMap<AttachmentRef, String> {
    let macs = logical_to_mac_map(interfaces);
    let mut map = BTreeMap::new();
    for network in networks {
        if let (Some(attachment), Some(mac)) = (&network.attachment, macs.get(&network.name)) {
            map.entry(attachment.clone()).or_insert_with(|| mac.clone());
        }
    }
    map
}

fn logical_to_mac_map(interfaces: &[InstanceInterfaceStatus]) -> BTreeMap<String, String> {
    interfaces
        .iter()
        .filter_map(|iface| {
            let mac = iface.mac.as_ref().filter(|mac| !mac.is_empty())?;
            Some((iface.logical_name.clone(), mac.clone()))
        })
        .collect()
}

/// Canonical identity of a secondary interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<'a> {
    pub pod_name: &'a InterfaceName,
    pub mac: Option<&'a str>,
}

/// Everything needed to rename the ordinal pod interfaces of one VM instance.
#[derive(Debug, Clone, Default)]
pub struct NetworkIdentity {
    ordered: Vec<(String, AttachmentRef)>,
    by_logical: BTreeMap<String, InterfaceName>,
    by_attachment: BTreeMap<AttachmentRef, InterfaceName>,
    macs_by_logical: BTreeMap<String, String>,
    macs_by_attachment: BTreeMap<AttachmentRef, String>,
}

impl NetworkIdentity {
    #[must_use]
    pub fn new(networks: &[LogicalNetwork], interfaces: &[InstanceInterfaceStatus]) -> Self {
        Self {
            ordered: secondary_networks(networks)
                .filter_map(|n| Some((n.name.clone(), n.attachment.clone()?)))
                .collect(),
            by_logical: logical_to_pod_name_map(networks),
            by_attachment: attachment_to_pod_name_map(networks),
            macs_by_logical: logical_to_mac_map(interfaces),
            macs_by_attachment: attachment_to_mac_map(interfaces, networks),
        }
    }

    /// Resolve the canonical name of a pod interface currently called `current` and attached to
    /// `attachment`.
    ///
    /// Returns `None` if `current` is already hashed or no network matches. The ordinal index
    /// is tried first so that several interfaces on one attachment stay distinct; the attachment
    /// reference is the fallback.
    #[must_use]
    pub fn resolve(&self, current: &str, attachment: &AttachmentRef) -> Option<Resolved<'_>> {
        let NamingScheme::Ordinal(index) = naming_scheme(current) else {
            return None;
        };
        let by_position = usize::try_from(index)
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|position| self.ordered.get(position))
            .filter(|(_, declared)| declared == attachment)
            .and_then(|(logical, _)| {
                Some(Resolved {
                    pod_name: self.by_logical.get(logical)?,
                    mac: self.macs_by_logical.get(logical).map(String::as_str),
                })
            });
        by_position.or_else(|| {
            Some(Resolved {
                pod_name: self.by_attachment.get(attachment)?,
                mac: self.macs_by_attachment.get(attachment).map(String::as_str),
            })
        })
    }

    /// Number of secondary networks.
    #[must_use]
    pub fn secondary_count(&self) -> usize {
        self.ordered.len()
    }
}
