//! Orchestrator: worker lifecycle, health checks, and the periodic
//! re-discovery trigger. Ties every other component together behind one
//! shutdown signal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::alert_gate::{AlertGate, GateOutcome};
use crate::calculator::{detect_lagging, measure_opportunity};
use crate::config::Settings;
use crate::depth_baseline::{DepthBaselineStore, Side};
use crate::notifier::NotificationTransport;
use crate::orderbook_fetcher::OrderBookFetcher;
use crate::price_collector::PriceCollector;
use crate::signal_builder::build_signal;
use crate::state_store::StateStore;
use crate::ticker_registry::{generate_pairs, TickerRegistry};
use crate::validator::{validate, ValidatorContext};
use crate::venue::VenueRegistry;

/// A worker that dies is restarted within this ceiling.
const SUPERVISOR_RESTART_CEILING: Duration = Duration::from_secs(5);

pub struct Orchestrator {
    venues: Arc<VenueRegistry>,
    store: StateStore,
    settings: Arc<Settings>,
    ticker_registry: Arc<TickerRegistry>,
    price_collector: Arc<PriceCollector>,
    orderbook_fetcher: Arc<OrderBookFetcher>,
    depth_history: Arc<DepthBaselineStore>,
    alert_gate: Arc<AlertGate>,
}

impl Orchestrator {
    pub fn new(
        venues: Arc<VenueRegistry>,
        store: StateStore,
        settings: Arc<Settings>,
        transport: Arc<dyn NotificationTransport>,
        dex_fetcher: Option<crate::venue::dex::BulkDexFetcher>,
    ) -> Self {
        let ticker_registry = Arc::new(TickerRegistry::new(venues.clone(), store.clone()));
        let price_collector = Arc::new(PriceCollector::new(venues.clone(), store.clone(), settings.clone(), dex_fetcher));
        let orderbook_fetcher = Arc::new(OrderBookFetcher::new(venues.clone(), store.clone(), settings.clone()));
        let alert_gate = Arc::new(AlertGate::new(store.clone(), settings.clone(), transport));

        Self {
            venues,
            store,
            settings,
            ticker_registry,
            price_collector,
            orderbook_fetcher,
            depth_history: Arc::new(DepthBaselineStore::new()),
            alert_gate,
        }
    }

    /// Start discovery once, then run the price-collector, scanner, and
    /// ticker-registry workers until `shutdown` fires. A worker that panics
    /// is restarted within [`SUPERVISOR_RESTART_CEILING`].
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        self.ticker_registry.discover().await;

        let discovery_interval = Duration::from_secs(self.settings.ticker_discovery_interval_hours * 3600);
        let price_interval = Duration::from_secs(self.settings.price_update_interval_sec);

        let registry = self.ticker_registry.clone();
        let registry_shutdown = shutdown.clone();
        let registry_task = tokio::spawn(supervised(
            "ticker_registry",
            move || {
                let registry = registry.clone();
                let shutdown = registry_shutdown.clone();
                async move { registry.run_periodic(discovery_interval, shutdown).await }
            },
            shutdown.clone(),
        ));

        let collector = self.price_collector.clone();
        let collector_shutdown = shutdown.clone();
        let collector_task = tokio::spawn(supervised(
            "price_collector",
            move || {
                let collector = collector.clone();
                let shutdown = collector_shutdown.clone();
                async move { collector.clone().run_periodic(price_interval, shutdown).await }
            },
            shutdown.clone(),
        ));

        let scanner_self = self.clone();
        let scanner_shutdown = shutdown.clone();
        let scanner_task = tokio::spawn(async move {
            scanner_self.run_scan_loop(scanner_shutdown).await;
        });

        let _ = shutdown.changed().await;
        info!("orchestrator: shutdown signal received, waiting for workers");
        let _ = tokio::join!(registry_task, collector_task, scanner_task);
        info!("orchestrator: all workers exited cleanly");
    }

    /// Run only the scan/validate/gate loop, assuming ticker discovery and
    /// price collection are kept warm by other processes sharing the state
    /// store (the `alert_worker` entry point in a split deployment).
    pub async fn run_scan_only(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        self.run_scan_loop(shutdown).await;
    }

    /// One scan tick: for every discovered ticker, build pairs, pick the
    /// orientation that's actually cheap-to-expensive this tick, measure,
    /// validate, build, and gate a signal.
    async fn run_scan_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.settings.price_update_interval_sec.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = timeout(Duration::from_secs(self.settings.worker_tick_budget_sec), self.scan_once()).await {
                        warn!(error = %e, "scan tick exceeded its budget");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scanner: shutdown received");
                        break;
                    }
                }
            }
        }
    }

    async fn scan_once(&self) {
        let symbols = self.ticker_registry.all_symbols();
        let latest_prices = self.price_collector.latest_prices();

        for symbol in symbols {
            let Some(ticker_record) = self.ticker_registry.get_ticker(&symbol) else {
                continue;
            };
            if ticker_record.venues.len() < 2 {
                continue;
            }

            let lagging = {
                let mut by_venue = std::collections::BTreeMap::new();
                for v in &ticker_record.venues {
                    if let Some(p) = latest_prices.get(&format!("{}:{}", v.venue_id, symbol)) {
                        by_venue.insert(v.venue_id.clone(), p.last);
                    }
                }
                detect_lagging(
                    &by_venue,
                    self.settings.lagging_min_exchanges,
                    Decimal::try_from(self.settings.lagging_min_deviation_pct).unwrap_or_default(),
                    Decimal::try_from(self.settings.lagging_max_other_deviation_pct).unwrap_or_default(),
                )
            };

            for pair in generate_pairs(&ticker_record) {
                let low_key = format!("{}:{symbol}", pair.low_venue.venue_id);
                let high_key = format!("{}:{symbol}", pair.high_venue.venue_id);
                let (Some(low_price), Some(high_price)) = (latest_prices.get(&low_key), latest_prices.get(&high_key)) else {
                    continue;
                };

                // Orientation check: this pair only makes sense this tick if
                // the designated low venue is actually the cheap side.
                if low_price.ask > high_price.bid {
                    continue;
                }

                let nominal = match crate::calculator::nominal_spread_pct(low_price.ask, high_price.bid) {
                    Some(v) => v,
                    None => continue,
                };
                let floor = Decimal::try_from(self.settings.min_spread_pct).unwrap_or_default();
                if nominal < floor {
                    continue;
                }

                let depth = self.settings.orderbook_depth;
                let (low_book, high_book) = tokio::join!(
                    self.orderbook_fetcher.fetch(&pair.low_venue.venue_id, &symbol, depth),
                    self.orderbook_fetcher.fetch(&pair.high_venue.venue_id, &symbol, depth),
                );
                let (Some(low_book), Some(high_book)) = (low_book, high_book) else {
                    continue;
                };

                let pair_id = pair.pair_id();
                let position_usd = Decimal::try_from(self.settings.suggested_position_usd).unwrap_or_default();
                let max_slippage = Decimal::try_from(self.settings.max_slippage_pct).unwrap_or_default();

                self.depth_history.record(&pair_id, &pair.low_venue.venue_id, Side::Bids, crate::calculator::depth_within_slippage(&low_book.bids, max_slippage));
                self.depth_history.record(&pair_id, &pair.high_venue.venue_id, Side::Asks, crate::calculator::depth_within_slippage(&high_book.asks, max_slippage));

                let Some(mut opp) = measure_opportunity(
                    pair_id.clone(),
                    symbol.clone(),
                    pair.low_venue.venue_id.clone(),
                    pair.high_venue.venue_id.clone(),
                    low_price.clone(),
                    high_price.clone(),
                    low_book,
                    high_book,
                    position_usd,
                    max_slippage,
                ) else {
                    continue;
                };
                opp.lagging = lagging.clone();

                let spread_age_sec = self.track_spread_age(&pair_id, opp.nominal_spread_pct >= floor);
                let ctx = ValidatorContext {
                    pair: &pair,
                    spread_age_sec,
                    signal_age_sec: (Utc::now() - opp.created_at).num_seconds().max(0) as u64,
                    low_withdraw_enabled: true,
                    high_deposit_enabled: true,
                    transfer_time_min: rust_decimal_macros::dec!(12.0),
                    symbol_sigma_per_min_pct: rust_decimal_macros::dec!(0.20),
                };
                let validation = validate(&opp, &ctx, &self.settings, &self.depth_history);

                let signal = build_signal(&opp, &pair, validation, ticker_record.contract_conflict, &HashMap::new(), Utc::now().timestamp_millis());

                if signal.status != crate::signal_builder::SignalStatus::Valid {
                    continue;
                }

                let alert_text = format!(
                    "{} {} {:.2}% net, {} -> {}",
                    signal.strategy_id, signal.symbol, signal.net_spread_pct, signal.low_venue_id, signal.high_venue_id
                );
                let (_, outcome) = self.alert_gate.process(signal, &alert_text).await;
                match outcome {
                    GateOutcome::Dispatched { .. } => info!(pair_id, "signal dispatched"),
                    GateOutcome::Rejected(reason) => info!(pair_id, %reason, "signal suppressed"),
                    GateOutcome::DispatchFailed => warn!(pair_id, "signal dispatch failed after retries"),
                }
            }
        }
    }

    /// Rolling per-pair "continuously above threshold" tracker backing the
    /// `spread_age` check.
    fn track_spread_age(&self, pair_id: &str, above_threshold: bool) -> u64 {
        let key = format!("spread_age:{pair_id}");
        if !above_threshold {
            self.store.delete(&key);
            return 0;
        }
        let first_seen: chrono::DateTime<Utc> = self.store.get(&key).unwrap_or_else(Utc::now);
        let _ = self.store.set(&key, &first_seen, Some(Duration::from_secs(self.settings.max_spread_age_hours * 3600)));
        (Utc::now() - first_seen).num_seconds().max(0) as u64
    }
}

/// Run `make_fut` in a loop, restarting within [`SUPERVISOR_RESTART_CEILING`]
/// if the inner future's task panics, until shutdown fires.
async fn supervised<F, Fut>(name: &'static str, make_fut: F, mut shutdown: watch::Receiver<bool>)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    loop {
        if *shutdown.borrow() {
            return;
        }
        let handle = tokio::spawn(make_fut());
        tokio::select! {
            res = handle => {
                if let Err(e) = res {
                    error!(worker = name, error = %e, "worker panicked, restarting");
                    tokio::time::sleep(SUPERVISOR_RESTART_CEILING).await;
                    continue;
                }
                return;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
