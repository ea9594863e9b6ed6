// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::ifname::{InterfaceName, NameError};
use crate::scheme::tap_name;
use serde::{Deserialize, Serialize};

/// Request to give the tap device `source_interface` the alias `alias_name`.
///
/// This is what the admission webhook hands to the alias helper sidecar, JSON encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasMappingRequest {
    pub source_interface: InterfaceName,
    pub alias_name: InterfaceName,
}

impl AliasMappingRequest {
    /// Build the request for a pod interface renamed from `old` to `new`.
    pub fn for_rename(old: &str, new: &str) -> Result<Self, NameError> {
        Ok(Self {
            source_interface: tap_name(old)?,
            alias_name: tap_name(new)?,
        })
    }
}
