// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Networks as declared on a VM instance and as reported in its status.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Reference to a network attachment definition, `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub namespace: String,
    pub name: String,
}

impl AttachmentRef {
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Parse `namespace/name` or a bare `name`, which lives in `default_namespace`.
    #[must_use]
    pub fn parse(reference: &str, default_namespace: &str) -> Self {
        match reference.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() => Self::new(namespace, name),
            Some((_, name)) => Self::new(default_namespace, name),
            None => Self::new(default_namespace, reference),
        }
    }
}

impl Display for AttachmentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A network declared on a VM instance. Declaration order is significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalNetwork {
    pub name: String,
    /// `None` for the pod network
    pub attachment: Option<AttachmentRef>,
    pub is_default: bool,
}

impl LogicalNetwork {
    #[must_use]
    pub fn pod(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attachment: None,
            is_default: true,
        }
    }

    #[must_use]
    pub fn multus(name: &str, attachment: AttachmentRef, is_default: bool) -> Self {
        Self {
            name: name.to_string(),
            attachment: Some(attachment),
            is_default,
        }
    }

    /// A non-default multus network, i.e. one that gets a secondary pod interface.
    #[must_use]
    pub fn is_secondary(&self) -> bool {
        self.attachment.is_some() && !self.is_default
    }
}

/// An interface as reported in the status of a running VM instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceInterfaceStatus {
    pub logical_name: String,
    pub mac: Option<String>,
    pub ips: Vec<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_attachment_ref_parse() {
        assert_eq!(
            AttachmentRef::parse("default/workload", "vms"),
            AttachmentRef::new("default", "workload")
        );
        assert_eq!(
            AttachmentRef::parse("workload", "vms"),
            AttachmentRef::new("vms", "workload")
        );
        assert_eq!(
            AttachmentRef::parse("/workload", "vms"),
            AttachmentRef::new("vms", "workload")
        );
        assert_eq!(
            AttachmentRef::new("default", "workload").to_string(),
            "default/workload"
        );
    }

    #[test]
    fn test_secondary() {
        let attachment = AttachmentRef::new("default", "workload");
        assert!(!LogicalNetwork::pod("default").is_secondary());
        assert!(!LogicalNetwork::multus("default", attachment.clone(), true).is_secondary());
        assert!(LogicalNetwork::multus("nic-1", attachment, false).is_secondary());
    }
}
