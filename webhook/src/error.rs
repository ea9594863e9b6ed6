// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use k8s_intf::StoreError;
use k8s_intf::multus::MultusError;
use namescheme::NameError;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Malformed request: {0}")]
    BadRequest(String),
    #[error("Failed to decode object: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Multus(#[from] MultusError),
    #[error("Invalid interface name: {0}")]
    InterfaceName(#[from] NameError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebhookError {
    /// HTTP code reported in the admission response.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            WebhookError::BadRequest(_)
            | WebhookError::Decode(_)
            | WebhookError::Multus(_)
            | WebhookError::InterfaceName(_) => 400,
            WebhookError::Store(e) if e.is_not_found() => 404,
            WebhookError::Store(_) | WebhookError::Internal(_) => 500,
        }
    }
}
