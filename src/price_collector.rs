//! Price Collector: fans out ticker polls across every
//! (venue, market_kind) each tick and keeps `prices:latest` fresh in the
//! state store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::Settings;
use crate::state_store::StateStore;
use crate::venue::dex::BulkDexFetcher;
use crate::venue::types::{PriceRecord, VenueKind};
use crate::venue::VenueRegistry;

const PRICES_LATEST_KEY: &str = "prices:latest";
const PRICES_LAST_UPDATE_KEY: &str = "prices:last_update";

pub struct PriceCollector {
    venues: Arc<VenueRegistry>,
    store: StateStore,
    settings: Arc<Settings>,
    dex_fetcher: Option<BulkDexFetcher>,
}

impl PriceCollector {
    pub fn new(
        venues: Arc<VenueRegistry>,
        store: StateStore,
        settings: Arc<Settings>,
        dex_fetcher: Option<BulkDexFetcher>,
    ) -> Self {
        Self {
            venues,
            store,
            settings,
            dex_fetcher,
        }
    }

    /// One fan-out tick: poll every venue in parallel under a hard per-worker
    /// budget, merge successful results, and publish under `prices:latest`.
    pub async fn tick(&self) {
        let worker_budget = Duration::from_secs(self.settings.worker_tick_budget_sec);
        let mut tasks = Vec::new();

        for (venue_id, adapter) in self.venues.all() {
            let venue_id = venue_id.clone();
            let kind = adapter.kind();
            tasks.push(tokio::spawn(async move {
                let result = timeout(worker_budget, adapter.tickers(None)).await;
                (venue_id, kind, result)
            }));
        }

        let mut merged: HashMap<String, PriceRecord> = self
            .store
            .get(PRICES_LATEST_KEY)
            .unwrap_or_default();
        let now = Utc::now();

        for task in tasks {
            let (venue_id, kind, outcome) = match task.await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "price collector worker panicked");
                    continue;
                }
            };

            match outcome {
                Ok(Ok(raw_tickers)) => {
                    let mut accepted = 0usize;
                    for raw in raw_tickers {
                        let record = PriceRecord {
                            venue_id: venue_id.clone(),
                            symbol: raw.symbol.clone(),
                            kind,
                            bid: raw.bid,
                            ask: raw.ask,
                            last: raw.last,
                            venue_timestamp: raw.venue_timestamp,
                            received_at: now,
                        };
                        if record.is_valid() {
                            merged.insert(format!("{venue_id}:{}", raw.symbol), record);
                            accepted += 1;
                        }
                    }
                    info!(venue_id, accepted, "price collector: venue tick complete");
                }
                Ok(Err(e)) => {
                    warn!(venue_id, error = %e, "price collector: venue adapter failed this tick");
                }
                Err(_) => {
                    warn!(venue_id, "price collector: venue worker exceeded tick budget, killed");
                }
            }
        }

        let ttl = Duration::from_secs(self.settings.price_ttl_sec.max(self.settings.price_update_interval_sec * 2));
        if let Err(e) = self.store.set(PRICES_LATEST_KEY, &merged, Some(ttl)) {
            warn!(error = %e, "price collector: failed to publish prices:latest");
        }
        let _ = self.store.set(PRICES_LAST_UPDATE_KEY, &now, None);
    }

    /// Poll DEX prices for one chain explicitly (invoked by the orchestrator
    /// once per chain per tick, since contract lists come from the ticker
    /// registry rather than the adapters themselves).
    pub async fn poll_dex_chain(
        &self,
        chain: &str,
        contracts: &[String],
        cex_reference_prices: &HashMap<String, Decimal>,
    ) {
        let Some(fetcher) = &self.dex_fetcher else {
            return;
        };
        match fetcher.fetch_chain(chain, contracts, cex_reference_prices).await {
            Ok(prices) => {
                let mut merged: HashMap<String, PriceRecord> =
                    self.store.get(PRICES_LATEST_KEY).unwrap_or_default();
                let now = Utc::now();
                for (contract, price) in prices {
                    let record = PriceRecord {
                        venue_id: format!("dex_{chain}"),
                        symbol: contract.clone(),
                        kind: VenueKind::DexSpot,
                        bid: price,
                        ask: price,
                        last: price,
                        venue_timestamp: now,
                        received_at: now,
                    };
                    merged.insert(format!("dex_{chain}:{contract}"), record);
                }
                let ttl = Duration::from_secs(self.settings.price_ttl_sec);
                let _ = self.store.set(PRICES_LATEST_KEY, &merged, Some(ttl));
            }
            Err(e) => warn!(chain, error = %e, "bulk dex fetch failed"),
        }
    }

    pub fn latest_prices(&self) -> HashMap<String, PriceRecord> {
        self.store.get(PRICES_LATEST_KEY).unwrap_or_default()
    }

    /// Run forever on `interval`, polling until shutdown is signalled.
    pub async fn run_periodic(self: Arc<Self>, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("price collector: shutdown received");
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
    use crate::venue::types::VenueKind;

    #[test]
    fn invalid_records_are_filtered_out_before_merge() {
        let record = PriceRecord {
            venue_id: "x".into(),
            symbol: "BTC".into(),
            kind: VenueKind::CexSpot,
            bid: Decimal::new(-1, 0),
            ask: Decimal::new(1, 0),
            venue_timestamp: Utc::now(),
            received_at: Utc::now(),
        };
        assert!(!record.is_valid());
    }
}
