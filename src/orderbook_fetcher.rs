//! Order-Book Fetcher: on-demand depth retrieval with a
//! short-TTL cache and graceful stale fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::config::Settings;
use crate::state_store::StateStore;
use crate::venue::types::OrderBookSnapshot;
use crate::venue::VenueRegistry;

pub struct OrderBookRequest {
    pub venue_id: String,
    pub symbol: String,
    pub depth: usize,
}

pub struct OrderBookFetcher {
    venues: Arc<VenueRegistry>,
    store: StateStore,
    settings: Arc<Settings>,
}

fn cache_key(venue_id: &str, symbol: &str) -> String {
    format!("orderbook:cache:{venue_id}:{symbol}")
}

impl OrderBookFetcher {
    pub fn new(venues: Arc<VenueRegistry>, store: StateStore, settings: Arc<Settings>) -> Self {
        Self {
            venues,
            store,
            settings,
        }
    }

    /// Fetch one book: cache hit -> fresh data; miss -> live adapter call,
    /// cached on success; adapter failure -> stale fallback up to 2x TTL,
    /// else `None`.
    pub async fn fetch(&self, venue_id: &str, symbol: &str, depth: usize) -> Option<OrderBookSnapshot> {
        let key = cache_key(venue_id, symbol);
        let ttl = self.settings.orderbook_cache_ttl();

        if let Some(mut cached) = self.store.get::<OrderBookSnapshot>(&key) {
            cached.cached = true;
            return Some(cached);
        }

        let Some(adapter) = self.venues.get(venue_id) else {
            warn!(venue_id, "order book fetch: unknown venue");
            return None;
        };

        match adapter.orderbook(symbol, depth).await {
            Ok(snapshot) => {
                let _ = self.store.set(&key, &snapshot, Some(ttl));
                Some(snapshot)
            }
            Err(e) => {
                warn!(venue_id, symbol, error = %e, "order book fetch failed, trying stale fallback");
                let fallback = self.store.get_stale::<OrderBookSnapshot>(&key, ttl);
                match fallback {
                    Some(mut snapshot) => {
                        snapshot.cached = true;
                        Some(snapshot)
                    }
                    None => None,
                }
            }
        }
    }

    /// Fetch many books concurrently, each on its own worker, never waiting
    /// past `parallel_fetch_ceiling_sec` for the slowest.
    pub async fn fetch_parallel(
        &self,
        requests: Vec<OrderBookRequest>,
    ) -> HashMap<(String, String), Option<OrderBookSnapshot>> {
        let ceiling = Duration::from_secs(self.settings.parallel_fetch_ceiling_sec);
        let mut tasks = Vec::with_capacity(requests.len());

        for req in requests {
            let venues = self.venues.clone();
            let store = self.store.clone();
            let settings = self.settings.clone();
            tasks.push(tokio::spawn(async move {
                let fetcher = OrderBookFetcher::new(venues, store, settings);
                let key = (req.venue_id.clone(), req.symbol.clone());
                let result = timeout(ceiling, fetcher.fetch(&req.venue_id, &req.symbol, req.depth)).await;
                (key, result.ok().flatten())
            }));
        }

        let mut out = HashMap::with_capacity(tasks.len());
        for task in tasks {
            if let Ok((key, snapshot)) = task.await {
                out.insert(key, snapshot);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::types::BookLevel;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_snapshot(cached: bool) -> OrderBookSnapshot {
        OrderBookSnapshot {
            venue_id: "binance_spot".into(),
            symbol: "BTC".into(),
            bids: vec![BookLevel { price: dec!(100), quantity: dec!(1) }],
            asks: vec![BookLevel { price: dec!(101), quantity: dec!(1) }],
            venue_timestamp: Utc::now(),
            requested_at: Utc::now(),
            received_at: Utc::now(),
            cached,
        }
    }

    #[test]
    fn stale_fallback_preserves_cached_contents() {
        let store = StateStore::new();
        let key = cache_key("binance_spot", "BTC");
        let snapshot = sample_snapshot(false);
        store
            .set(&key, &snapshot, Some(Duration::from_millis(5)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let fallback = store
            .get_stale::<OrderBookSnapshot>(&key, Duration::from_secs(60))
            .unwrap();
        assert_eq!(fallback.symbol, snapshot.symbol);
        assert_eq!(fallback.bids.len(), snapshot.bids.len());
    }

    #[test]
    fn cached_snapshot_reports_zero_latency() {
        let snapshot = sample_snapshot(true);
        assert_eq!(snapshot.latency_ms(), 0);
    }
}
