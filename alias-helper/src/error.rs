// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum AliasError {
    #[error("Malformed network mapping request: {0}")]
    Request(#[from] serde_json::Error),
    #[error("Failed to watch {path}: {source}")]
    Watch { path: String, source: io::Error },
    #[error("Watcher stopped")]
    WatchClosed,
    #[error("System error: {0}")]
    Io(#[from] io::Error),
    #[error("Netlink error: {0}")]
    Netlink(#[from] rtnetlink::Error),
    #[error("Failed to set alias of link {index}: {reason}")]
    SetAlias { index: u32, reason: String },
}
