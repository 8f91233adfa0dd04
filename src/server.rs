// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Liveness endpoint.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

pub fn router() -> Router {
    Router::new().route("/healthz", get(healthz_handler))
}

/// Serve `/healthz` on `port` until `shutdown` resolves.
pub async fn serve(
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Health server listening on {}", addr);

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}
