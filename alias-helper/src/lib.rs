// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Sidecar that aliases the tap devices of renamed VM interfaces

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod applier;
pub mod error;
pub mod links;
pub mod reconcile;
pub mod request;
pub mod watch;

pub use applier::AliasApplier;
pub use error::AliasError;
pub use links::{Link, LinkTable, NetlinkLinkTable};
pub use reconcile::{PassReport, reconcile_pass};
pub use request::parse_requests;
pub use watch::{DEFAULT_WATCH_DIR, LinkEvent, watch_links};
