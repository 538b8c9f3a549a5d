//! `/healthz` surface: health state is exposed only via this endpoint and
//! log lines, no metrics exporter.

use std::net::SocketAddr;

use axum::{routing::get, Json, Router};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state_store::StateStore;

#[derive(Serialize)]
struct Health {
    ok: bool,
    tickers_tracked: usize,
}

async fn healthz(store: StateStore) -> Json<Health> {
    let symbols: std::collections::HashSet<String> = store.get("tickers:all_symbols").unwrap_or_default();
    Json(Health {
        ok: true,
        tickers_tracked: symbols.len(),
    })
}

/// Serve `/healthz` on `addr` until `shutdown` fires.
pub async fn serve(addr: SocketAddr, store: StateStore, mut shutdown: watch::Receiver<bool>) {
    let app = Router::new()
        .route("/healthz", get(move || healthz(store.clone())))
        .layer(TraceLayer::new_for_http());

    info!(%addr, "health server listening");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, "health server failed to bind, continuing without it");
            return;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .ok();
}
