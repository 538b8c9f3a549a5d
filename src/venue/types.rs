//! Venue, symbol, and record types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One of the four market kinds the system understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
    CexSpot,
    CexFutures,
    DexSpot,
    PerpDex,
}

impl VenueKind {
    /// Only cex_futures and perp_dex can go short.
    pub fn shortable(self) -> bool {
        matches!(self, VenueKind::CexFutures | VenueKind::PerpDex)
    }

    pub fn funding_rate_supported(self) -> bool {
        matches!(self, VenueKind::CexFutures | VenueKind::PerpDex)
    }

    /// All four kinds support order books.
    pub fn orderbook_supported(self) -> bool {
        true
    }

    pub fn is_dex(self) -> bool {
        matches!(self, VenueKind::DexSpot | VenueKind::PerpDex)
    }
}

/// A single remote marketplace reachable via one adapter. Created at process
/// start from configuration and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub venue_id: String,
    pub kind: VenueKind,
    /// Transfer networks this venue supports for deposit/withdraw (cex only).
    pub networks: Vec<String>,
}

impl Venue {
    pub fn new(venue_id: impl Into<String>, kind: VenueKind, networks: Vec<String>) -> Self {
        Self {
            venue_id: venue_id.into(),
            kind,
            networks,
        }
    }

    pub fn shortable(&self) -> bool {
        self.kind.shortable()
    }
}

/// One listed instrument as reported by `futures_symbols`/`spot_symbols`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueSymbol {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub status: String,
}

impl VenueSymbol {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("trading") || self.status.eq_ignore_ascii_case("active")
    }
}

/// Per-network transfer capability for one asset, from CEX deposit/withdraw metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub chain: String,
    pub contract: Option<String>,
    pub deposit_enabled: bool,
    pub withdraw_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDetails {
    pub coin: String,
    pub networks: Vec<NetworkInfo>,
}

/// Best bid/ask/last for one symbol on one venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub venue_id: String,
    pub symbol: String,
    pub kind: VenueKind,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub venue_timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl PriceRecord {
    /// bid > 0, ask > 0, bid <= ask; any record violating this is discarded
    /// at ingest.
    pub fn is_valid(&self) -> bool {
        self.bid > Decimal::ZERO && self.ask > Decimal::ZERO && self.bid <= self.ask
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.received_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        self.age(now) <= ttl
    }
}

/// One (price, quantity) level of an order book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Full depth snapshot for one (venue, symbol).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub venue_id: String,
    pub symbol: String,
    /// Descending by price.
    pub bids: Vec<BookLevel>,
    /// Ascending by price.
    pub asks: Vec<BookLevel>,
    pub venue_timestamp: DateTime<Utc>,
    pub requested_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub cached: bool,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    pub fn latency_ms(&self) -> i64 {
        if self.cached {
            0
        } else {
            (self.received_at - self.requested_at).num_milliseconds().max(0)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRate {
    pub rate: Decimal,
    pub next_funding_time: DateTime<Utc>,
    pub period_hours: u32,
}

/// Unified symbol record: which venues list it, and its chain contract map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub venues: Vec<Venue>,
    /// chain -> canonicalized contract address.
    pub contracts: BTreeMap<String, String>,
    pub contract_conflict: bool,
    pub last_update: DateTime<Utc>,
}

impl Ticker {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            venues: Vec::new(),
            contracts: BTreeMap::new(),
            contract_conflict: false,
            last_update: Utc::now(),
        }
    }

    /// Record a chain/contract observation, flagging disagreement but
    /// keeping the first-seen canonical address.
    pub fn observe_contract(&mut self, chain: &str, contract: &str) {
        let canonical = canonicalize_contract(chain, contract);
        match self.contracts.get(chain) {
            None => {
                self.contracts.insert(chain.to_string(), canonical);
            }
            Some(existing) if existing != &canonical => {
                self.contract_conflict = true;
            }
            _ => {}
        }
    }
}

/// Canonicalize to lowercase hex (EVM-style chains) or leave as-is for
/// base58 chains (e.g. solana).
pub fn canonicalize_contract(chain: &str, contract: &str) -> String {
    if chain.eq_ignore_ascii_case("solana") {
        contract.to_string()
    } else {
        contract.to_ascii_lowercase()
    }
}

/// Normalize a venue-native symbol to its base asset: uppercase, with
/// quote/currency/"PERP" suffixes stripped.
pub fn normalize_symbol(raw: &str) -> String {
    const QUOTE_SUFFIXES: &[&str] = &[
        "USDT", "USDC", "USD", "BUSD", "FDUSD", "PERP", "-PERP", "_PERP", "/USDT", "/USD",
    ];
    let mut s = raw.trim().to_ascii_uppercase();
    s.retain(|c| c.is_ascii_alphanumeric());

    loop {
        let mut stripped = false;
        for suffix in QUOTE_SUFFIXES {
            let suffix = suffix.trim_start_matches(['-', '_', '/']);
            if s.len() > suffix.len() && s.ends_with(suffix) {
                s.truncate(s.len() - suffix.len());
                stripped = true;
            }
        }
        if !stripped {
            break;
        }
    }
    s
}
