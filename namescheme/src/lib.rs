// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Pod interface naming for VM secondary networks.
//!
//! The virtualization stack names the pod interface of every non-default multus network in one of
//! two ways: by attachment order (`net1`, `net2`, ...) or by a hash of the VM's logical network
//! name (`pod` + 11 hex digits). This crate predicts both names and correlates the different
//! keys under which a network shows up (logical name, attachment reference, pod interface).

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod alias;
pub mod ifname;
pub mod mapper;
pub mod network;
pub mod scheme;

pub use alias::AliasMappingRequest;
pub use ifname::{InterfaceName, NameError};
pub use mapper::{NetworkIdentity, Resolved};
pub use network::{AttachmentRef, InstanceInterfaceStatus, LogicalNetwork};
pub use scheme::{NamingScheme, hashed_interface_name, is_ordinal, naming_scheme, tap_name};
