// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use k8s_intf::KubeStore;
use netmig_webhook::server::router;
use netmig_webhook::{Dispatcher, MigrationValidator, PodMutator};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracectl::{LevelFilter, get_trace_ctl};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "netmig-webhook", about = "VM network identity admission webhook")]
struct CmdArgs {
    /// Address to serve admission requests on
    #[arg(long, default_value = "0.0.0.0:9443")]
    bind: SocketAddr,

    /// PEM certificate; plain HTTP is served without one
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Image of the sidecar that aliases tap devices
    #[arg(long, env = "NETWORK_HELPER_IMAGE")]
    helper_image: String,

    /// Tracing configuration, e.g. `netmig_webhook=debug,kube=info`
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

async fn run(args: CmdArgs) -> Result<(), String> {
    let store = Arc::new(
        KubeStore::try_default()
            .await
            .map_err(|e| format!("Failed to connect to the API server: {e}"))?,
    );
    let dispatcher = Dispatcher::new()
        .with_mutator(Arc::new(PodMutator::new(
            store.clone(),
            store.clone(),
            args.helper_image,
        )))
        .with_validator(Arc::new(MigrationValidator::new(store.clone(), store)));
    let app = router(Arc::new(dispatcher));

    let handle = axum_server::Handle::new();
    let shutdown = handle.clone();
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| format!("Failed to install SIGINT handler: {e}"))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| format!("Failed to install SIGTERM handler: {e}"))?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Got SIGINT"),
            _ = sigterm.recv() => info!("Got SIGTERM"),
        }
        info!("Shutting down");
        shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
    });

    let served = if let (Some(cert), Some(key)) = (args.tls_cert, args.tls_key) {
        let config = RustlsConfig::from_pem_file(&cert, &key)
            .await
            .map_err(|e| format!("Failed to load TLS material: {e}"))?;
        info!("Serving admission requests on https://{}", args.bind);
        axum_server::bind_rustls(args.bind, config)
            .handle(handle)
            .serve(app.into_make_service())
            .await
    } else {
        info!("Serving admission requests on http://{}", args.bind);
        axum_server::bind(args.bind)
            .handle(handle)
            .serve(app.into_make_service())
            .await
    };
    served.map_err(|e| format!("Server failed: {e}"))
}

#[tokio::main]
async fn main() {
    let args = CmdArgs::parse();
    init_logging(&args);
    info!(" ━━━━━━ netmig webhook started ━━━━━━");

    if let Err(e) = run(args).await {
        error!("{e}");
        std::process::exit(1);
    }
}
