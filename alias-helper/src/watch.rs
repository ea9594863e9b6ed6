// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Watch the directory where the kernel lists network devices.

use inotify::{Inotify, WatchMask};
use std::os::fd::AsRawFd;
use std::path::Path;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::error::AliasError;

pub const DEFAULT_WATCH_DIR: &str = "/sys/devices/virtual/net";

/// A batch of changes in the watched directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkEvent;

fn watch_mask() -> WatchMask {
    WatchMask::CREATE
        | WatchMask::DELETE
        | WatchMask::MOVED_FROM
        | WatchMask::MOVED_TO
        | WatchMask::ATTRIB
        | WatchMask::MODIFY
}

/// Start watching `dir`, forwarding one [`LinkEvent`] per batch of inotify events to `tx`.
///
/// The watch is set up before returning, so a missing directory is reported right away. The
/// spawned task ends when the receiving side is dropped.
pub fn watch_links(dir: &Path, tx: Sender<LinkEvent>) -> Result<JoinHandle<()>, AliasError> {
    let watch_error = |source| AliasError::Watch {
        path: dir.display().to_string(),
        source,
    };
    let mut inotify = Inotify::init().map_err(watch_error)?;
    inotify
        .watches()
        .add(dir, watch_mask())
        .map_err(watch_error)?;
    let async_fd = AsyncFd::new(inotify.as_raw_fd()).map_err(watch_error)?;
    debug!("Watching {}", dir.display());

    Ok(tokio::spawn(async move {
        let mut buffer = [0u8; 4096];
        loop {
            trace!("Waiting for link changes...");
            let Ok(mut guard) = async_fd.readable().await else {
                error!("Failure checking async fd readiness");
                continue;
            };
            match inotify.read_events(&mut buffer) {
                Ok(events) => {
                    let count = events.count();
                    if count > 0 {
                        trace!("{count} inotify event(s)");
                        if tx.send(LinkEvent).await.is_err() {
                            debug!("Event receiver gone, stopping watcher");
                            return;
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => error!("Failed to read inotify events: {e}"),
            }
            guard.clear_ready();
        }
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::channel;

    #[tokio::test]
    async fn test_missing_dir_is_fatal() {
        let (tx, _rx) = channel(1);
        let err = watch_links(Path::new("/nonexistent/netmig-watch"), tx).unwrap_err();
        assert!(matches!(err, AliasError::Watch { .. }));
    }

    #[tokio::test]
    async fn test_changes_are_forwarded() {
        let dir = std::env::temp_dir().join(format!("netmig-watch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let (tx, mut rx) = channel(4);
        let watcher = watch_links(&dir, tx).unwrap();

        std::fs::write(dir.join("tap1"), b"").unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(LinkEvent));

        watcher.abort();
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
