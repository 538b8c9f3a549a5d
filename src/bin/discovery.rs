//! One-shot ticker registry rebuild: runs the full discovery protocol once
//! and exits.

use std::sync::Arc;

use clap::Parser;
use venue_scanner_backend::build_default_registry;
use venue_scanner_backend::state_store::StateStore;
use venue_scanner_backend::ticker_registry::TickerRegistry;

#[derive(Parser, Debug)]
#[command(name = "discovery", about = "Rebuild the unified ticker registry once and exit")]
struct Args {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = Args::parse();
    venue_scanner_backend::init_tracing();

    let store = StateStore::new();
    let venues = Arc::new(build_default_registry());
    let registry = TickerRegistry::new(venues, store);

    registry.discover().await;
    std::process::exit(0);
}
