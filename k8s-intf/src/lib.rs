// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Kubernetes objects and clients for VM network identity handling

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod client;
pub mod kubevirt;
pub mod multus;
pub mod settings;
pub mod store;

#[cfg(any(test, feature = "testing"))]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used)]
pub mod testing;

pub use client::KubeStore;
pub use store::{PodStore, SettingStore, StoreError, VmiStore};
