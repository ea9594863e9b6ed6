// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]

use clap::Parser;
use netmig_alias_helper::{
    AliasApplier, AliasError, DEFAULT_WATCH_DIR, NetlinkLinkTable, parse_requests, watch_links,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc::channel;
use tokio_util::sync::CancellationToken;
use tracectl::{LevelFilter, get_trace_ctl};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "netmig-alias-helper",
    about = "Alias tap devices to their hashed interface names"
)]
struct CmdArgs {
    /// JSON list of {sourceInterface, aliasName} requests
    #[arg(long, env = "NETWORK_MAPPING_REQUEST")]
    network_mapping_request: String,

    /// Directory watched for network device changes
    #[arg(long, default_value = DEFAULT_WATCH_DIR)]
    watch_dir: PathBuf,

    /// Link events buffered while a pass runs
    #[arg(long, default_value_t = 64)]
    queue_depth: usize,

    /// Tracing configuration, e.g. `netmig_alias_helper=debug`
    #[arg(long)]
    tracing: Option<String>,
}

fn init_logging(args: &CmdArgs) {
    let tctl = get_trace_ctl();
    if let Err(e) = tctl.set_default_level(LevelFilter::INFO) {
        eprintln!("Setting default loglevel failed: {e}");
    }
    if let Some(tracing) = &args.tracing
        && let Err(e) = tctl.setup_from_string(tracing)
    {
        error!("Invalid tracing configuration: {e}");
        std::process::exit(1);
    }
}

/// Cancel `token` on SIGINT or SIGTERM.
fn cancel_on_signals(token: CancellationToken) -> Result<(), AliasError> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Got SIGINT"),
            _ = sigterm.recv() => info!("Got SIGTERM"),
        }
        token.cancel();
    });
    Ok(())
}

async fn run(args: CmdArgs) -> Result<(), AliasError> {
    let requests = parse_requests(&args.network_mapping_request)?;
    let table = Arc::new(NetlinkLinkTable::new()?);
    let (tx, rx) = channel(args.queue_depth.max(1));
    let _watcher = watch_links(&args.watch_dir, tx)?;

    let cancel = CancellationToken::new();
    cancel_on_signals(cancel.clone())?;
    AliasApplier::new(table, requests).run(rx, cancel).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = CmdArgs::parse();
    init_logging(&args);
    info!(" ━━━━━━ netmig alias helper started ━━━━━━");

    if let Err(e) = run(args).await {
        error!("{e}");
        std::process::exit(1);
    }
}
