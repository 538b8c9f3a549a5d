//! Standalone price-collector entry point: keeps `prices:latest` fresh
//! without running discovery or the scan/alert loop.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use venue_scanner_backend::build_default_registry;
use venue_scanner_backend::price_collector::PriceCollector;
use venue_scanner_backend::state_store::StateStore;
use venue_scanner_backend::Settings;

#[derive(Parser, Debug)]
#[command(name = "price_monitor", about = "Run only the per-venue price collection loop")]
struct Args {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = Args::parse();
    venue_scanner_backend::init_tracing();

    let settings = Arc::new(Settings::from_env());
    let store = StateStore::new();
    let venues = Arc::new(build_default_registry());
    let collector = Arc::new(PriceCollector::new(venues, store, settings.clone(), None));

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("price_monitor: SIGINT received, signalling shutdown");
        let _ = tx.send(true);
    });

    let interval = std::time::Duration::from_secs(settings.price_update_interval_sec.max(1));
    collector.run_periodic(interval, rx).await;
    std::process::exit(0);
}
