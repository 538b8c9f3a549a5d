//! Ticker Registry: maintains the unified symbol inventory and
//! contract mapping via a seven-step discovery protocol, and generates
//! oriented arbitrage pairs from the resulting tickers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::state_store::StateStore;
use crate::venue::types::{Ticker, Venue, VenueKind};
use crate::venue::VenueRegistry;

/// Transfer-network tie-break priority.
pub const TRANSFER_NETWORK_PRIORITY: &[&str] = &["solana", "arbitrum", "bsc", "avalanche", "ethereum"];

/// Bounded concurrency for `asset_details` fan-out.
const ASSET_DETAILS_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairType {
    Auto,
    Manual,
}

#[derive(Debug, Clone)]
pub struct ArbitragePair {
    pub symbol: String,
    pub low_venue: Venue,
    pub high_venue: Venue,
    pub pair_type: PairType,
    pub requires_transfer: bool,
    pub transfer_network: Option<String>,
}

impl ArbitragePair {
    pub fn pair_id(&self) -> String {
        format!("{}:{}:{}", self.symbol, self.low_venue.venue_id, self.high_venue.venue_id)
    }
}

/// Same-exchange pairs (or spot+futures on one exchange) never require a
/// physical transfer.
fn requires_transfer(low: &Venue, high: &Venue) -> bool {
    if low.venue_id == high.venue_id {
        return false;
    }
    base_exchange(&low.venue_id) != base_exchange(&high.venue_id)
}

fn base_exchange(venue_id: &str) -> &str {
    venue_id.split('_').next().unwrap_or(venue_id)
}

fn choose_transfer_network(low: &Venue, high: &Venue) -> Option<String> {
    let low_set: HashSet<&str> = low.networks.iter().map(String::as_str).collect();
    TRANSFER_NETWORK_PRIORITY
        .iter()
        .find(|chain| low_set.contains(*chain) && high.networks.iter().any(|n| n == *chain))
        .map(|s| s.to_string())
}

/// Generate every unordered unique-venue_id pair for a ticker, oriented as
/// (low, high) -pair enumeration only;
/// which side is actually cheaper is decided per-tick by the Price
/// Collector's latest quotes, not at generation time.
pub fn generate_pairs(ticker: &Ticker) -> Vec<ArbitragePair> {
    let mut pairs = Vec::new();
    if ticker.venues.len() < 2 {
        return pairs;
    }

    let mut seen = HashSet::new();
    for i in 0..ticker.venues.len() {
        for j in 0..ticker.venues.len() {
            if i == j {
                continue;
            }
            let (a, b) = (&ticker.venues[i], &ticker.venues[j]);
            let key = if a.venue_id < b.venue_id {
                (a.venue_id.clone(), b.venue_id.clone())
            } else {
                (b.venue_id.clone(), a.venue_id.clone())
            };
            if !seen.insert(key) {
                continue;
            }

            // Emit both orientations; the Spread Calculator picks the one
            // whose current quotes actually form low < high.
            for (low, high) in [(a, b), (b, a)] {
                let pair_type = if high.shortable() {
                    PairType::Auto
                } else {
                    PairType::Manual
                };
                let needs_transfer = requires_transfer(low, high);
                let transfer_network = if needs_transfer {
                    choose_transfer_network(low, high)
                } else {
                    None
                };

                pairs.push(ArbitragePair {
                    symbol: ticker.symbol.clone(),
                    low_venue: low.clone(),
                    high_venue: high.clone(),
                    pair_type,
                    requires_transfer: needs_transfer,
                    transfer_network,
                });
            }
        }
    }

    pairs
}

pub struct TickerRegistry {
    venues: Arc<VenueRegistry>,
    store: StateStore,
}

impl TickerRegistry {
    pub fn new(venues: Arc<VenueRegistry>, store: StateStore) -> Self {
        Self { venues, store }
    }

    /// Run the full discovery protocol once.
    pub async fn discover(&self) {
        info!("ticker discovery: starting cycle");
        let mut tickers: HashMap<String, Ticker> = HashMap::new();

        // Steps 1-3: fetch symbol listings from every adapter in parallel.
        let mut listing_tasks = Vec::new();
        for (venue_id, adapter) in self.venues.all() {
            let venue_id = venue_id.clone();
            let adapter = adapter.clone();
            listing_tasks.push(tokio::spawn(async move {
                let kind = adapter.kind();
                let symbols = match kind {
                    VenueKind::CexFutures => adapter.futures_symbols().await,
                    VenueKind::CexSpot => adapter.spot_symbols().await,
                    VenueKind::DexSpot | VenueKind::PerpDex => adapter.spot_symbols().await,
                };
                (venue_id, kind, symbols)
            }));
        }

        for task in listing_tasks {
            let (venue_id, kind, result) = match task.await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "discovery listing task panicked");
                    continue;
                }
            };
            match result {
                Ok(symbols) => {
                    let Some(venue) = self.venue_record(&venue_id, kind) else {
                        continue;
                    };
                    for s in symbols {
                        let base = crate::venue::types::normalize_symbol(&s.base_asset);
                        let ticker = tickers.entry(base.clone()).or_insert_with(|| Ticker::new(base));
                        if !ticker.venues.iter().any(|v| v.venue_id == venue.venue_id) {
                            ticker.venues.push(venue.clone());
                        }
                    }
                }
                Err(e) => {
                    // Partial failure policy: discard only this adapter's
                    // contribution this cycle; never overwrite existing data.
                    warn!(venue_id, error = %e, "discovery: listing fetch failed, skipping venue this cycle");
                }
            }
        }

        // Step 5: merge asset_details (networks/contracts) with bounded concurrency.
        let semaphore = Arc::new(Semaphore::new(ASSET_DETAILS_CONCURRENCY));
        let mut detail_tasks = Vec::new();
        for ticker in tickers.values() {
            let cex_venues: Vec<_> = ticker
                .venues
                .iter()
                .filter(|v| matches!(v.kind, VenueKind::CexSpot | VenueKind::CexFutures))
                .cloned()
                .collect();
            for venue in cex_venues {
                let Some(adapter) = self.venues.get(&venue.venue_id) else {
                    continue;
                };
                let sem = semaphore.clone();
                let symbol = ticker.symbol.clone();
                detail_tasks.push(tokio::spawn(async move {
                    let _permit = sem.acquire().await;
                    (symbol, adapter.asset_details(&venue.venue_id).await)
                }));
            }
        }

        for task in detail_tasks {
            if let Ok((symbol, Ok(details))) = task.await {
                if let Some(ticker) = tickers.get_mut(&symbol) {
                    for net in details.networks {
                        if let Some(contract) = net.contract {
                            ticker.observe_contract(&net.chain, &contract);
                        }
                    }
                    if ticker.contract_conflict {
                        warn!(symbol = %ticker.symbol, "ticker-level contract_conflict raised");
                    }
                }
            }
        }

        // Step 6: ask DEX adapters whether each (ticker, chain) contract has
        // non-trivial liquidity; each hit contributes a dex_spot venue.
        for dex in self.venues.dex_adapters() {
            let chain = dex.chain().to_string();
            let candidates: Vec<(String, String)> = tickers
                .values()
                .filter_map(|t| t.contracts.get(&chain).map(|c| (t.symbol.clone(), c.clone())))
                .collect();

            for (symbol, contract) in candidates {
                match dex.has_liquid_pool(&contract).await {
                    Ok(true) => {
                        if let Some(ticker) = tickers.get_mut(&symbol) {
                            let venue = Venue::new(dex.venue_id(), VenueKind::DexSpot, Vec::new());
                            if !ticker.venues.iter().any(|v| v.venue_id == venue.venue_id) {
                                ticker.venues.push(venue);
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        debug!(symbol, chain, error = %e, "dex liquidity probe failed");
                    }
                }
            }
        }

        // Step 7: persist atomically, never clobbering an existing ticker
        // with an empty discovery result.
        let mut count = 0usize;
        for (symbol, mut ticker) in tickers {
            if ticker.venues.is_empty() {
                continue;
            }
            ticker.last_update = Utc::now();
            let _ = self
                .store
                .set(format!("tickers:master:{symbol}"), &ticker, None);
            self.store
                .add_to_set("tickers:all_symbols", symbol.clone())
                .ok();
            for venue in &ticker.venues {
                let kind_key = match venue.kind {
                    VenueKind::CexFutures => "futures",
                    VenueKind::CexSpot => "spot",
                    _ => continue,
                };
                self.store
                    .add_to_set(
                        format!("tickers:by_exchange:{}:{kind_key}", venue.venue_id),
                        symbol.clone(),
                    )
                    .ok();
            }
            count += 1;
        }

        let _ = self
            .store
            .set("tickers:last_update", &Utc::now(), None);
        info!(tickers = count, "ticker discovery: cycle complete");
    }

    pub fn get_ticker(&self, symbol: &str) -> Option<Ticker> {
        self.store.get(&format!("tickers:master:{symbol}"))
    }

    pub fn all_symbols(&self) -> HashSet<String> {
        self.store.get("tickers:all_symbols").unwrap_or_default()
    }

    fn venue_record(&self, venue_id: &str, kind: VenueKind) -> Option<Venue> {
        // Networks are populated later via asset_details; start empty.
        Some(Venue::new(venue_id, kind, Vec::new()))
    }

    /// Run discovery once, then on a fixed interval.
    pub async fn run_periodic(self: Arc<Self>, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        self.discover().await;
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // consume the immediate first tick
        loop {
            tokio::select! {
                _ = ticker.tick() => self.discover().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("ticker registry: shutdown received");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue(id: &str, kind: VenueKind, networks: &[&str]) -> Venue {
        Venue::new(id, kind, networks.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn auto_pair_requires_shortable_high_venue() {
        let mut ticker = Ticker::new("BTC");
        ticker.venues.push(venue("okx_spot", VenueKind::CexSpot, &[]));
        ticker.venues.push(venue("okx_futures", VenueKind::CexFutures, &[]));

        let pairs = generate_pairs(&ticker);
        let auto = pairs
            .iter()
            .find(|p| p.low_venue.venue_id == "okx_spot" && p.high_venue.venue_id == "okx_futures")
            .unwrap();
        assert_eq!(auto.pair_type, PairType::Auto);
        // same base exchange -> no transfer needed
        assert!(!auto.requires_transfer);
    }

    #[test]
    fn manual_pair_when_high_venue_not_shortable() {
        let mut ticker = Ticker::new("BTC");
        ticker.venues.push(venue("binance_spot", VenueKind::CexSpot, &["ethereum"]));
        ticker.venues.push(venue("kraken_spot", VenueKind::CexSpot, &["ethereum", "solana"]));

        let pairs = generate_pairs(&ticker);
        let manual = pairs
            .iter()
            .find(|p| p.low_venue.venue_id == "binance_spot" && p.high_venue.venue_id == "kraken_spot")
            .unwrap();
        assert_eq!(manual.pair_type, PairType::Manual);
        assert!(manual.requires_transfer);
        assert_eq!(manual.transfer_network.as_deref(), Some("ethereum"));
    }

    #[test]
    fn transfer_network_prefers_solana_over_ethereum() {
        let low = venue("a_spot", VenueKind::CexSpot, &["ethereum", "solana", "bsc"]);
        let high = venue("b_spot", VenueKind::CexSpot, &["ethereum", "solana"]);
        assert_eq!(choose_transfer_network(&low, &high).as_deref(), Some("solana"));
    }

    #[test]
    fn direction_rule_high_venue_dex_spot_never_auto() {
        let mut ticker = Ticker::new("PEPE");
        ticker.venues.push(venue("uniswap", VenueKind::DexSpot, &[]));
        ticker.venues.push(venue("binance_spot", VenueKind::CexSpot, &[]));

        for pair in generate_pairs(&ticker) {
            if matches!(pair.high_venue.kind, VenueKind::DexSpot) {
                assert_eq!(pair.pair_type, PairType::Manual);
            }
        }
    }
}
