//! Decentralized-exchange adapter.
//!
//! DEXes have no true order book, so the "orderbook" is synthesized by
//! probing a sequence of notional sizes against an aggregator's quote
//! endpoint and turning the resulting price-impact curve into an ask
//! ladder, mirrored into a synthetic bid side.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::VenueError;
use crate::venue::adapter::{RawTicker, VenueAdapter};
use crate::venue::http::get_json;
use crate::venue::types::{AssetDetails, BookLevel, FundingRate, OrderBookSnapshot, VenueKind, VenueSymbol};

/// Fixed preset of notional USD probe sizes used to build the price-impact
/// curve.
pub const PROBE_SIZES_USD: &[u32] = &[100, 500, 1_000, 5_000, 10_000, 25_000, 50_000];

/// Synthetic half-spread applied to derive the mirrored bid side.
const SYNTHETIC_HALF_SPREAD: Decimal = dec!(0.005);

#[derive(Debug, Clone)]
pub struct DexEndpoints {
    pub quote_base_url: String,
    pub pools_base_url: String,
}

pub struct DexAdapter {
    venue_id: String,
    chain: String,
    client: Client,
    endpoints: DexEndpoints,
    min_liquidity_usd: Decimal,
}

impl DexAdapter {
    pub fn new(
        venue_id: impl Into<String>,
        chain: impl Into<String>,
        endpoints: DexEndpoints,
        min_liquidity_usd: Decimal,
    ) -> Self {
        Self {
            venue_id: venue_id.into(),
            chain: chain.into(),
            client: crate::venue::http::build_client(&[], ""),
            endpoints,
            min_liquidity_usd,
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Does `contract` exist on this chain with non-trivial liquidity?
    /// Used by the Ticker Registry's discovery step 6.
    pub async fn has_liquid_pool(&self, contract: &str) -> Result<bool, VenueError> {
        let url = format!("{}/pools/{}", self.endpoints.pools_base_url, contract);
        let resp: PoolLookupResponse = get_json(&self.client, &url, &[]).await?;
        Ok(resp.liquidity_usd >= self.min_liquidity_usd)
    }
}

#[derive(Debug, Deserialize)]
struct PoolLookupResponse {
    #[serde(with = "rust_decimal::serde::str")]
    liquidity_usd: Decimal,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(with = "rust_decimal::serde::str")]
    out_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    effective_price: Decimal,
}

#[async_trait]
impl VenueAdapter for DexAdapter {
    fn venue_id(&self) -> &str {
        &self.venue_id
    }

    fn kind(&self) -> VenueKind {
        VenueKind::DexSpot
    }

    async fn asset_details(&self, _asset: &str) -> Result<AssetDetails, VenueError> {
        Err(VenueError::transport("DEX adapters do not expose CEX asset metadata"))
    }

    async fn spot_symbols(&self) -> Result<Vec<VenueSymbol>, VenueError> {
        Ok(Vec::new())
    }

    async fn tickers(&self, _symbols: Option<&[String]>) -> Result<Vec<RawTicker>, VenueError> {
        // DEX ticks are produced by the bulk per-chain aggregator fetcher,
        // not by this per-symbol adapter.
        Ok(Vec::new())
    }

    async fn orderbook(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot, VenueError> {
        let requested_at = Utc::now();
        let mut asks = Vec::with_capacity(depth.min(PROBE_SIZES_USD.len()));

        for &notional in PROBE_SIZES_USD.iter().take(depth.max(1)) {
            let url = format!(
                "{}/quote?token={}&notional_usd={}",
                self.endpoints.quote_base_url, symbol, notional
            );
            let quote: QuoteResponse = get_json(&self.client, &url, &[]).await?;
            if quote.effective_price <= Decimal::ZERO || quote.out_amount <= Decimal::ZERO {
                continue;
            }
            asks.push(BookLevel {
                price: quote.effective_price,
                quantity: quote.out_amount,
            });
        }

        asks.sort_by(|a, b| a.price.cmp(&b.price));

        let bids = asks
            .iter()
            .map(|level| BookLevel {
                price: level.price * (Decimal::ONE - SYNTHETIC_HALF_SPREAD),
                quantity: level.quantity,
            })
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let received_at = Utc::now();
        Ok(OrderBookSnapshot {
            venue_id: self.venue_id.clone(),
            symbol: symbol.to_string(),
            bids,
            asks,
            venue_timestamp: received_at,
            requested_at,
            received_at,
            cached: false,
        })
    }
}

/// Bulk per-chain DEX price fetcher: one request per chain
/// listing every tracked contract, with liquidity-floor and
/// wrapped-asset-ratio cross-validation against the best CEX price.
pub struct BulkDexFetcher {
    client: Client,
    endpoints: DexEndpoints,
    min_liquidity_usd: Decimal,
    /// DEX/CEX ratio beyond which a DEX quote is dropped as likely noise.
    max_cross_validation_ratio: Decimal,
}

#[derive(Debug, Deserialize)]
struct BulkPriceEntry {
    contract: String,
    #[serde(with = "rust_decimal::serde::str")]
    price_usd: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    liquidity_usd: Decimal,
}

impl BulkDexFetcher {
    pub fn new(endpoints: DexEndpoints, min_liquidity_usd: Decimal) -> Self {
        Self {
            client: crate::venue::http::build_client(&[], ""),
            endpoints,
            min_liquidity_usd,
            max_cross_validation_ratio: Decimal::from_u32(10).unwrap(),
        }
    }

    /// Fetch all tracked-contract prices on `chain` in one request, dropping
    /// low-liquidity entries and likely-wrapped-asset noise relative to
    /// `cex_reference_prices` (keyed by contract address).
    pub async fn fetch_chain(
        &self,
        chain: &str,
        contracts: &[String],
        cex_reference_prices: &std::collections::HashMap<String, Decimal>,
    ) -> Result<Vec<(String, Decimal)>, VenueError> {
        let url = format!(
            "{}/bulk/{}?contracts={}",
            self.endpoints.quote_base_url,
            chain,
            contracts.join(",")
        );
        let entries: Vec<BulkPriceEntry> = get_json(&self.client, &url, &[]).await?;

        Ok(entries
            .into_iter()
            .filter(|e| e.liquidity_usd >= self.min_liquidity_usd)
            .filter(|e| {
                match cex_reference_prices.get(&e.contract) {
                    Some(cex_price) if *cex_price > Decimal::ZERO => {
                        let ratio = (e.price_usd / cex_price).abs();
                        let inv_ratio = if ratio > Decimal::ZERO {
                            Decimal::ONE / ratio
                        } else {
                            Decimal::MAX
                        };
                        ratio.max(inv_ratio) <= self.max_cross_validation_ratio
                    }
                    _ => true,
                }
            })
            .map(|e| (e.contract, e.price_usd))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_presets_are_ascending() {
        let mut sorted = PROBE_SIZES_USD.to_vec();
        sorted.sort();
        assert_eq!(sorted, PROBE_SIZES_USD);
    }

    #[test]
    fn canonicalize_contract_lowercases_evm_addresses() {
        assert_eq!(
            crate::venue::types::canonicalize_contract("ethereum", "0xABCDEF"),
            "0xabcdef"
        );
        assert_eq!(
            crate::venue::types::canonicalize_contract("solana", "AbCdEf"),
            "AbCdEf"
        );
    }
}
