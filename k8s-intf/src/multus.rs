// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Multus pod annotations.
//!
//! `k8s.v1.cni.cncf.io/networks` is the ordered list of networks a pod asks for,
//! `k8s.v1.cni.cncf.io/network-status` is what multus reports back once the pod is running.
//! Both are JSON documents stored as strings. Fields not modelled here are kept in `extra` so
//! that rewriting an annotation does not drop them.

use namescheme::AttachmentRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const NETWORK_ATTACHMENT_ANNOTATION: &str = "k8s.v1.cni.cncf.io/networks";
pub const NETWORK_STATUS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/network-status";

#[derive(Debug, thiserror::Error)]
pub enum MultusError {
    #[error("Malformed annotation {annotation}: {source}")]
    Malformed {
        annotation: &'static str,
        source: serde_json::Error,
    },
    #[error("Malformed network selection '{0}'")]
    MalformedSelection(String),
}

/// One entry of the networks annotation.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct NetworkSelectionElement {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(rename = "mac", default, skip_serializing_if = "Option::is_none")]
    pub mac_request: Option<String>,
    #[serde(rename = "interface", default, skip_serializing_if = "Option::is_none")]
    pub interface_request: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NetworkSelectionElement {
    /// The attachment requested. An empty namespace means the pod namespace.
    #[must_use]
    pub fn attachment(&self, pod_namespace: &str) -> AttachmentRef {
        if self.namespace.is_empty() {
            AttachmentRef::parse(&self.name, pod_namespace)
        } else {
            AttachmentRef::new(&self.namespace, &self.name)
        }
    }

    /// Parse the short form `[namespace/]name[@interface]`.
    fn parse_short(selection: &str) -> Result<Self, MultusError> {
        let (reference, interface) = match selection.split_once('@') {
            Some((reference, interface)) if !interface.is_empty() => {
                (reference, Some(interface.to_string()))
            }
            Some(_) => return Err(MultusError::MalformedSelection(selection.to_string())),
            None => (selection, None),
        };
        let (namespace, name) = match reference.split_once('/') {
            Some((namespace, name)) => (namespace.to_string(), name.to_string()),
            None => (String::new(), reference.to_string()),
        };
        if name.is_empty() || name.contains('/') {
            return Err(MultusError::MalformedSelection(selection.to_string()));
        }
        Ok(Self {
            name,
            namespace,
            interface_request: interface,
            ..Default::default()
        })
    }
}

/// Parse the networks annotation, in either its JSON or its comma-separated short form.
pub fn parse_network_selection(
    annotation: &str,
) -> Result<Vec<NetworkSelectionElement>, MultusError> {
    let annotation = annotation.trim();
    if annotation.is_empty() {
        return Ok(vec![]);
    }
    if annotation.starts_with('[') {
        return serde_json::from_str(annotation).map_err(|source| MultusError::Malformed {
            annotation: NETWORK_ATTACHMENT_ANNOTATION,
            source,
        });
    }
    annotation
        .split(',')
        .map(str::trim)
        .filter(|selection| !selection.is_empty())
        .map(NetworkSelectionElement::parse_short)
        .collect()
}

/// Networks annotation entries from a pod's annotations, if any.
pub fn pod_network_selection(
    annotations: Option<&BTreeMap<String, String>>,
) -> Result<Option<Vec<NetworkSelectionElement>>, MultusError> {
    annotations
        .and_then(|annotations| annotations.get(NETWORK_ATTACHMENT_ANNOTATION))
        .map(|annotation| parse_network_selection(annotation))
        .transpose()
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// One entry of the network status annotation.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct NetworkStatus {
    /// `namespace/name` of the attachment
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub interface: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub default: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NetworkStatus {
    #[must_use]
    pub fn attachment(&self, pod_namespace: &str) -> AttachmentRef {
        AttachmentRef::parse(&self.name, pod_namespace)
    }
}

pub fn parse_network_status(annotation: &str) -> Result<Vec<NetworkStatus>, MultusError> {
    serde_json::from_str(annotation).map_err(|source| MultusError::Malformed {
        annotation: NETWORK_STATUS_ANNOTATION,
        source,
    })
}
