// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Admission webhooks that move VM launcher pods to hashed secondary interface names

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod admission;
pub mod error;
pub mod migration;
pub mod patch;
pub mod pod;
pub mod server;

pub use admission::{AdmissionObject, Dispatcher, Mutator, ResourceDescriptor, Validator};
pub use error::WebhookError;
pub use migration::MigrationValidator;
pub use pod::PodMutator;
