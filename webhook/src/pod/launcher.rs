// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Rename ordinal secondary interfaces of VM launcher pods.
//!
//! The networks annotation of the pod is rewritten to request the hashed interface names. The
//! tap devices backing those interfaces keep their ordinal names, so a helper sidecar is added
//! to alias them to their hashed names.

use k8s_intf::VmiStore;
use k8s_intf::kubevirt::{KUBEVIRT_GROUP, VirtualMachineInstance};
use k8s_intf::multus::{
    NETWORK_ATTACHMENT_ANNOTATION, NetworkSelectionElement, pod_network_selection,
};
use k8s_openapi::api::core::v1::{Capabilities, Container, EnvVar, Pod, SecurityContext};
use namescheme::{AliasMappingRequest, NameError, NetworkIdentity, is_ordinal};
use tracing::{debug, info};

use crate::error::WebhookError;
use crate::patch::{PatchOp, annotations_patch, container_patch};

pub const HELPER_CONTAINER_NAME: &str = "network-migration-helper";
pub const MAPPING_REQUEST_FLAG: &str = "--network-mapping-request";
pub const MAPPING_REQUEST_ENV: &str = "NETWORK_MAPPING_REQUEST";
const VMI_KIND: &str = "VirtualMachineInstance";

/// Name of the VM instance owning the pod, if any.
#[must_use]
pub fn owner_vmi(pod: &Pod) -> Option<&str> {
    pod.metadata
        .owner_references
        .as_ref()?
        .iter()
        .find(|owner| {
            owner.kind == VMI_KIND && owner.api_version.split('/').next() == Some(KUBEVIRT_GROUP)
        })
        .map(|owner| owner.name.as_str())
}

fn is_ordinal_request(element: &NetworkSelectionElement) -> bool {
    element.interface_request.as_deref().is_some_and(is_ordinal)
}

/// Rewrite the ordinal interface requests of `selection` in place.
///
/// Returns the alias requests for the renamed interfaces; entries that cannot be resolved are
/// left untouched.
pub fn rewrite_selection(
    selection: &mut [NetworkSelectionElement],
    pod_namespace: &str,
    identity: &NetworkIdentity,
) -> Result<Vec<AliasMappingRequest>, NameError> {
    let mut requests = vec![];
    for element in selection.iter_mut().filter(|e| is_ordinal_request(e)) {
        let attachment = element.attachment(pod_namespace);
        let Some(current) = element.interface_request.clone() else {
            continue;
        };
        let Some(resolved) = identity.resolve(&current, &attachment) else {
            debug!("No network for interface {current} on {attachment}");
            continue;
        };
        requests.push(AliasMappingRequest::for_rename(
            &current,
            resolved.pod_name.as_str(),
        )?);
        element.interface_request = Some(resolved.pod_name.to_string());
        if let Some(mac) = resolved.mac {
            element.mac_request = Some(mac.to_string());
        }
    }
    Ok(requests)
}

/// The sidecar that aliases tap devices. The request list is passed both as an argument and
/// in the environment.
pub fn helper_container(
    image: &str,
    requests: &[AliasMappingRequest],
) -> Result<Container, serde_json::Error> {
    let json = serde_json::to_string(requests)?;
    Ok(Container {
        name: HELPER_CONTAINER_NAME.to_string(),
        image: Some(image.to_string()),
        args: Some(vec![MAPPING_REQUEST_FLAG.to_string(), json.clone()]),
        env: Some(vec![EnvVar {
            name: MAPPING_REQUEST_ENV.to_string(),
            value: Some(json),
            ..Default::default()
        }]),
        security_context: Some(SecurityContext {
            capabilities: Some(Capabilities {
                add: Some(vec!["NET_ADMIN".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Patches for a launcher pod, given the VM instance it runs.
pub fn launcher_patches_for(
    pod: &Pod,
    namespace: &str,
    vmi: &VirtualMachineInstance,
    helper_image: &str,
) -> Result<Vec<PatchOp>, WebhookError> {
    let Some(mut selection) = pod_network_selection(pod.metadata.annotations.as_ref())? else {
        return Ok(vec![]);
    };
    let identity = NetworkIdentity::new(&vmi.logical_networks(), &vmi.interface_statuses());
    let requests = rewrite_selection(&mut selection, namespace, &identity)?;
    if requests.is_empty() {
        return Ok(vec![]);
    }

    let mut annotations = pod.metadata.annotations.clone().unwrap_or_default();
    annotations.insert(
        NETWORK_ATTACHMENT_ANNOTATION.to_string(),
        serde_json::to_string(&selection)?,
    );
    info!(
        "Renaming {} interface(s) of pod {namespace}/{}",
        requests.len(),
        pod.metadata
            .name
            .as_deref()
            .or(pod.metadata.generate_name.as_deref())
            .unwrap_or_default()
    );
    Ok(vec![
        annotations_patch(&annotations)?,
        container_patch(&helper_container(helper_image, &requests)?)?,
    ])
}

/// Patches for a launcher pod. Pods without ordinal interface requests or without an owning
/// VM instance are left alone.
pub async fn launcher_patches(
    vmis: &dyn VmiStore,
    pod: &Pod,
    namespace: &str,
    helper_image: &str,
) -> Result<Vec<PatchOp>, WebhookError> {
    let Some(selection) = pod_network_selection(pod.metadata.annotations.as_ref())? else {
        return Ok(vec![]);
    };
    if !selection.iter().any(is_ordinal_request) {
        return Ok(vec![]);
    }
    let Some(vmi_name) = owner_vmi(pod) else {
        debug!("Launcher pod in {namespace} has no owning VM instance");
        return Ok(vec![]);
    };
    let vmi = vmis.get(namespace, vmi_name).await?;
    launcher_patches_for(pod, namespace, &vmi, helper_image)
}
