//! Full pipeline entry point: ticker discovery, price collection, spread
//! scanning, validation, and alert dispatch, all under one shutdown signal.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use venue_scanner_backend::notifier::LoggingTransport;
use venue_scanner_backend::{build_default_registry, Orchestrator, Settings};

/// No positional arguments; all tuning lives in the environment.
#[derive(Parser, Debug)]
#[command(name = "scanner", about = "Run the full cross-venue arbitrage pipeline")]
struct Args {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = Args::parse();
    venue_scanner_backend::init_tracing();

    let settings = Arc::new(Settings::from_env());
    let store = venue_scanner_backend::StateStore::new();
    let venues = Arc::new(build_default_registry());
    let transport = Arc::new(LoggingTransport);

    let orchestrator = Arc::new(Orchestrator::new(venues, store.clone(), settings, transport, None));

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("scanner: SIGINT received, signalling shutdown");
        let _ = tx.send(true);
    });

    // A malformed HEALTH_ADDR is a boot-time configuration error: the
    // process refuses to start rather than limping along without health.
    let health_addr: std::net::SocketAddr = std::env::var("HEALTH_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .context("HEALTH_ADDR is not a valid socket address")?;
    let health_rx = rx.clone();
    tokio::spawn(venue_scanner_backend::health::serve(health_addr, store, health_rx));

    orchestrator.run(rx).await;
    std::process::exit(0);
}
