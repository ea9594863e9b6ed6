// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use namescheme::AliasMappingRequest;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::AliasError;
use crate::links::LinkTable;
use crate::reconcile::reconcile_pass;
use crate::watch::LinkEvent;

/// Keeps the aliases of a fixed set of links in place while links come and go.
pub struct AliasApplier {
    table: Arc<dyn LinkTable>,
    requests: Vec<AliasMappingRequest>,
}

impl AliasApplier {
    pub fn new(table: Arc<dyn LinkTable>, requests: Vec<AliasMappingRequest>) -> Self {
        Self { table, requests }
    }

    async fn pass(&self) {
        match reconcile_pass(self.table.as_ref(), &self.requests).await {
            Ok(report) => debug!("Pass done: {report:?}"),
            Err(e) => error!("Failed to reconcile link aliases: {e}"),
        }
    }

    /// Reconcile once, then again after every batch of link events, until `cancel` fires.
    ///
    /// Events queued while a pass runs are collapsed into a single following pass. Cancellation
    /// is only observed between passes.
    pub async fn run(
        &self,
        mut events: Receiver<LinkEvent>,
        cancel: CancellationToken,
    ) -> Result<(), AliasError> {
        info!("Reconciling {} alias request(s)", self.requests.len());
        self.pass().await;
        loop {
            tokio::select! {
                biased;
                event = events.recv() => {
                    if event.is_none() {
                        return Err(AliasError::WatchClosed);
                    }
                    let mut collapsed = 0;
                    while events.try_recv().is_ok() {
                        collapsed += 1;
                    }
                    if collapsed > 0 {
                        debug!("Collapsed {collapsed} queued event(s)");
                    }
                    self.pass().await;
                }
                () = cancel.cancelled() => {
                    info!("Stopping alias reconciliation");
                    return Ok(());
                }
            }
        }
    }
}
