// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use clap::Parser;
use kube::Client;
use std::future::Future;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use configmap_controller::config::{Backend, Config};
use configmap_controller::constants::{EVENT_CHANNEL_CAPACITY, OPERATOR_NAME};
use configmap_controller::kubernetes::{
    detect_flavor, ApiDirectory, EventSource, KubectlDirectory, WorkloadDirectory,
};
use configmap_controller::reconcilers::{Controller, Reconciler};
use configmap_controller::server;
use configmap_controller::sync::PatchExecutor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    info!("Starting {} {}", OPERATOR_NAME, env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {:?}", config);

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let flavor = detect_flavor(&client).await?;

    let directory: Arc<dyn WorkloadDirectory> = match config.backend {
        Backend::Api => Arc::new(ApiDirectory::new(client.clone())),
        Backend::Kubectl => Arc::new(KubectlDirectory::new(config.kubectl_path.clone())),
    };
    let executor = PatchExecutor::new(directory.clone(), config.retry_policy());
    let reconciler = Reconciler::new(directory, executor, flavor.workload_kinds())
        .with_fingerprint_mode(config.fingerprint)
        .with_strategy(config.marker)
        .with_transport(config.transport);

    // A single stop flag shared by the server, the event source and the controller
    let (stop_tx, stop_rx) = watch::channel(false);
    let stopped = move || {
        let mut rx = stop_rx.clone();
        async move {
            let _ = rx.wait_for(|stop| *stop).await;
        }
    };

    let signals = shutdown_signal()?;
    tokio::spawn(async move {
        signals.await;
        let _ = stop_tx.send(true);
    });

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let source = EventSource::new(client, config.namespace.clone(), config.sync_period);
    let controller = Controller::new(reconciler);

    info!("Starting event source and controller...");

    tokio::try_join!(
        server::serve(config.healthz_port, stopped()),
        source.run(event_tx, stopped()),
        controller.run(event_rx, stopped())
    )?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received SIGINT, shutting down"),
                Err(e) => {
                    error!("Failed to listen for SIGINT: {}", e);
                    terminate.recv().await;
                    info!("Received SIGTERM, shutting down");
                }
            },
            _ = terminate.recv() => info!("Received SIGTERM, shutting down"),
        }
    })
}
