//! Cross-venue arbitrage scanner core.
//!
//! The on-line analysis pipeline: venue ingestion, the unified ticker
//! registry, on-demand order-book assembly, spread/slippage computation,
//! the safety validator, and the alert gate. Everything outside this core
//! (chat UI, analytics sink, side-monitors, deployment glue) is an external
//! collaborator, not a module here.

pub mod alert_gate;
pub mod calculator;
pub mod config;
pub mod depth_baseline;
pub mod error;
pub mod health;
pub mod notifier;
pub mod orchestrator;
pub mod orderbook_fetcher;
pub mod price_collector;
pub mod signal_builder;
pub mod state_store;
pub mod ticker_registry;
pub mod validator;
pub mod venue;

pub use config::Settings;
pub use error::ScannerError;
pub use orchestrator::Orchestrator;
pub use state_store::StateStore;

/// Install the process-wide tracing subscriber, honoring `RUST_LOG`
/// (defaults to `info`) the way every binary in this crate expects.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Build the venue registry from configuration. Wired up here rather than
/// in each binary so `scanner`, `price_monitor`, and `discovery` share one
/// source of truth for which venues exist.
pub fn build_default_registry() -> venue::VenueRegistry {
    use venue::cex::{CexAdapter, CexEndpoints};
    use venue::dex::{DexAdapter, DexEndpoints};
    use venue::types::VenueKind;
    use venue::AnyVenueAdapter;

    let mut registry = venue::VenueRegistry::new();

    let binance_spot = CexAdapter::new(
        "binance_spot",
        VenueKind::CexSpot,
        CexEndpoints {
            base_url: "https://api.binance.com".into(),
            symbols_path: "/api/v3/exchangeInfo".into(),
            ticker_path: "/api/v3/ticker/bookTicker".into(),
            orderbook_path: "/api/v3/depth".into(),
            asset_details_path: "/sapi/v1/capital/config/getall".into(),
            funding_rate_path: None,
        },
    );
    registry.register("binance_spot", AnyVenueAdapter::Cex(std::sync::Arc::new(binance_spot)));

    let binance_futures = CexAdapter::new(
        "binance_futures",
        VenueKind::CexFutures,
        CexEndpoints {
            base_url: "https://fapi.binance.com".into(),
            symbols_path: "/fapi/v1/exchangeInfo".into(),
            ticker_path: "/fapi/v1/ticker/bookTicker".into(),
            orderbook_path: "/fapi/v1/depth".into(),
            asset_details_path: "/sapi/v1/capital/config/getall".into(),
            funding_rate_path: Some("/fapi/v1/premiumIndex".into()),
        },
    );
    registry.register("binance_futures", AnyVenueAdapter::Cex(std::sync::Arc::new(binance_futures)));

    let kraken_spot = CexAdapter::new(
        "kraken_spot",
        VenueKind::CexSpot,
        CexEndpoints {
            base_url: "https://api.kraken.com".into(),
            symbols_path: "/0/public/AssetPairs".into(),
            ticker_path: "/0/public/Ticker".into(),
            orderbook_path: "/0/public/Depth".into(),
            asset_details_path: "/0/public/DepositMethods".into(),
            funding_rate_path: None,
        },
    );
    registry.register("kraken_spot", AnyVenueAdapter::Cex(std::sync::Arc::new(kraken_spot)));

    let uniswap_ethereum = DexAdapter::new(
        "uniswap_ethereum",
        "ethereum",
        DexEndpoints {
            quote_base_url: "https://quote-api.jup-style.invalid".into(),
            pools_base_url: "https://pools-api.jup-style.invalid".into(),
        },
        rust_decimal_macros::dec!(10_000.0),
    );
    registry.register("uniswap_ethereum", AnyVenueAdapter::Dex(std::sync::Arc::new(uniswap_ethereum)));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_both_cex_and_dex_venues() {
        let registry = build_default_registry();
        assert!(registry.len() >= 4);
        assert!(registry.dex_adapters().count() >= 1);
    }
}
