// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Platform settings (`harvesterhci.io/v1beta1` `Setting` objects) read by the pod mutator.

use kube::core::{ApiResource, GroupVersionKind};
use serde::{Deserialize, Serialize};

pub const HTTP_PROXY_SETTING: &str = "http-proxy";
pub const ADDITIONAL_CA_SETTING: &str = "additional-ca";

pub const SETTING_GROUP: &str = "harvesterhci.io";
pub const SETTING_VERSION: &str = "v1beta1";
pub const SETTING_KIND: &str = "Setting";
pub const SETTING_PLURAL: &str = "settings";

/// Settings are cluster scoped and keep their payload in a top-level `value` field, so they are
/// accessed as dynamic objects.
#[must_use]
pub fn setting_api_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(SETTING_GROUP, SETTING_VERSION, SETTING_KIND),
        SETTING_PLURAL,
    )
}

/// Value of the `http-proxy` setting.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HttpProxyConfig {
    #[serde(default)]
    pub http_proxy: String,
    #[serde(default)]
    pub https_proxy: String,
    #[serde(default)]
    pub no_proxy: String,
}

impl HttpProxyConfig {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.http_proxy.is_empty() && self.https_proxy.is_empty() && self.no_proxy.is_empty()
    }
}
