// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use k8s_intf::store::labels_match;
use std::collections::BTreeMap;

type Selector = &'static [(&'static str, &'static str)];

/// Pods started by kubevirt to run a VM instance.
pub const LAUNCHER_SELECTORS: &[Selector] = &[&[("kubevirt.io", "virt-launcher")]];

/// Platform pods that reach external services and need the proxy and CA settings.
pub const CORE_SERVICE_SELECTORS: &[Selector] = &[
    &[("longhorn.io/component", "backing-image-data-source")],
    &[
        ("app.kubernetes.io/name", "harvester"),
        ("app.kubernetes.io/component", "apiserver"),
    ],
    &[("app", "rancher")],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodClass {
    Launcher,
    CoreService,
    Unmatched,
}

fn any_match(selectors: &[Selector], labels: Option<&BTreeMap<String, String>>) -> bool {
    selectors.iter().any(|selector| {
        let selector: BTreeMap<String, String> = selector
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        labels_match(&selector, labels)
    })
}

/// Classify a pod by its labels. Core service selectors are checked first.
#[must_use]
pub fn classify(labels: Option<&BTreeMap<String, String>>) -> PodClass {
    if any_match(CORE_SERVICE_SELECTORS, labels) {
        PodClass::CoreService
    } else if any_match(LAUNCHER_SELECTORS, labels) {
        PodClass::Launcher
    } else {
        PodClass::Unmatched
    }
}
