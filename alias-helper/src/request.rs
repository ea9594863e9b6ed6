// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use namescheme::AliasMappingRequest;

use crate::error::AliasError;

/// Parse the JSON list of mapping requests handed over by the webhook.
pub fn parse_requests(json: &str) -> Result<Vec<AliasMappingRequest>, AliasError> {
    Ok(serde_json::from_str(json)?)
}
