//! Standalone scan/validate/alert-gate entry point: assumes ticker
//! discovery and price collection are kept warm elsewhere sharing the same
//! state store.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use venue_scanner_backend::build_default_registry;
use venue_scanner_backend::notifier::LoggingTransport;
use venue_scanner_backend::{Orchestrator, Settings};

#[derive(Parser, Debug)]
#[command(name = "alert_worker", about = "Run only the spread-scan, validation, and alert-gate loop")]
struct Args {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = Args::parse();
    venue_scanner_backend::init_tracing();

    let settings = Arc::new(Settings::from_env());
    let store = venue_scanner_backend::StateStore::new();
    let venues = Arc::new(build_default_registry());
    let transport = Arc::new(LoggingTransport);
    let orchestrator = Arc::new(Orchestrator::new(venues, store, settings, transport, None));

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("alert_worker: SIGINT received, signalling shutdown");
        let _ = tx.send(true);
    });

    orchestrator.run_scan_only(rx).await;
    std::process::exit(0);
}
