//! Generic centralized-exchange adapter.
//!
//! Per-exchange HTTP quirks are treated abstractly as "a venue adapter
//! producing normalized records"; one generic REST-shaped adapter models
//! every CEX, and the quirks of any one real exchange's endpoints are a
//! deployment concern, not part of this core. Instantiated once per
//! configured venue with that venue's endpoint templates.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::VenueError;
use crate::venue::adapter::{RawTicker, VenueAdapter};
use crate::venue::http::get_json;
use crate::venue::types::{AssetDetails, BookLevel, FundingRate, NetworkInfo, OrderBookSnapshot, VenueKind, VenueSymbol};

/// Endpoint templates for one CEX. `{symbol}` is substituted by callers.
#[derive(Debug, Clone)]
pub struct CexEndpoints {
    pub base_url: String,
    pub symbols_path: String,
    pub ticker_path: String,
    pub orderbook_path: String,
    pub asset_details_path: String,
    pub funding_rate_path: Option<String>,
}

pub struct CexAdapter {
    venue_id: String,
    kind: VenueKind,
    client: Client,
    endpoints: CexEndpoints,
}

impl CexAdapter {
    pub fn new(venue_id: impl Into<String>, kind: VenueKind, endpoints: CexEndpoints) -> Self {
        Self {
            venue_id: venue_id.into(),
            kind,
            client: crate::venue::http::build_client(&[], ""),
            endpoints,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.base_url, path)
    }
}

#[derive(Debug, Deserialize)]
struct RawSymbolsResponse {
    symbols: Vec<RawSymbolEntry>,
}

#[derive(Debug, Deserialize)]
struct RawSymbolEntry {
    symbol: String,
    #[serde(rename = "baseAsset")]
    base_asset: String,
    #[serde(rename = "quoteAsset")]
    quote_asset: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct RawTickerEntry {
    symbol: String,
    #[serde(rename = "bidPrice")]
    bid_price: String,
    #[serde(rename = "askPrice")]
    ask_price: String,
    #[serde(rename = "lastPrice")]
    last_price: String,
    #[serde(rename = "closeTime")]
    close_time: i64,
}

#[derive(Debug, Deserialize)]
struct RawDepthResponse {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
struct RawAssetDetailsResponse {
    coin: String,
    #[serde(rename = "networkList")]
    network_list: Vec<RawNetworkEntry>,
}

#[derive(Debug, Deserialize)]
struct RawNetworkEntry {
    network: String,
    #[serde(rename = "contractAddress")]
    contract_address: Option<String>,
    #[serde(rename = "depositEnable")]
    deposit_enable: bool,
    #[serde(rename = "withdrawEnable")]
    withdraw_enable: bool,
}

#[derive(Debug, Deserialize)]
struct RawFundingResponse {
    #[serde(rename = "lastFundingRate")]
    last_funding_rate: String,
    #[serde(rename = "nextFundingTime")]
    next_funding_time: i64,
}

fn parse_decimal(s: &str, field: &str) -> Result<Decimal, VenueError> {
    Decimal::from_str(s).map_err(|e| VenueError::parse(format!("{field}={s}: {e}")))
}

#[async_trait]
impl VenueAdapter for CexAdapter {
    fn venue_id(&self) -> &str {
        &self.venue_id
    }

    fn kind(&self) -> VenueKind {
        self.kind
    }

    async fn futures_symbols(&self) -> Result<Vec<VenueSymbol>, VenueError> {
        if self.kind != VenueKind::CexFutures {
            return Ok(Vec::new());
        }
        let resp: RawSymbolsResponse =
            get_json(&self.client, &self.url(&self.endpoints.symbols_path), &[]).await?;
        Ok(resp
            .symbols
            .into_iter()
            .filter(|s| s.quote_asset.eq_ignore_ascii_case("USDT"))
            .map(|s| VenueSymbol {
                symbol: s.symbol,
                base_asset: s.base_asset,
                quote_asset: s.quote_asset,
                status: s.status,
            })
            .filter(VenueSymbol::is_active)
            .collect())
    }

    async fn spot_symbols(&self) -> Result<Vec<VenueSymbol>, VenueError> {
        if self.kind != VenueKind::CexSpot {
            return Ok(Vec::new());
        }
        let resp: RawSymbolsResponse =
            get_json(&self.client, &self.url(&self.endpoints.symbols_path), &[]).await?;
        Ok(resp
            .symbols
            .into_iter()
            .filter(|s| s.quote_asset.eq_ignore_ascii_case("USDT"))
            .map(|s| VenueSymbol {
                symbol: s.symbol,
                base_asset: s.base_asset,
                quote_asset: s.quote_asset,
                status: s.status,
            })
            .filter(VenueSymbol::is_active)
            .collect())
    }

    async fn asset_details(&self, asset: &str) -> Result<AssetDetails, VenueError> {
        let url = self
            .url(&self.endpoints.asset_details_path)
            .replace("{asset}", asset);
        let resp: Vec<RawAssetDetailsResponse> = get_json(&self.client, &url, &[]).await?;
        let entry = resp
            .into_iter()
            .find(|e| e.coin.eq_ignore_ascii_case(asset))
            .ok_or_else(|| VenueError::parse(format!("asset {asset} not found")))?;

        Ok(AssetDetails {
            coin: entry.coin,
            networks: entry
                .network_list
                .into_iter()
                .map(|n| NetworkInfo {
                    chain: n.network.to_ascii_lowercase(),
                    contract: n.contract_address,
                    deposit_enabled: n.deposit_enable,
                    withdraw_enabled: n.withdraw_enable,
                })
                .collect(),
        })
    }

    async fn tickers(&self, symbols: Option<&[String]>) -> Result<Vec<RawTicker>, VenueError> {
        let resp: Vec<RawTickerEntry> =
            get_json(&self.client, &self.url(&self.endpoints.ticker_path), &[]).await?;

        resp.into_iter()
            .filter(|t| symbols.map_or(true, |syms| syms.iter().any(|s| s == &t.symbol)))
            .map(|t| {
                Ok(RawTicker {
                    symbol: t.symbol,
                    bid: parse_decimal(&t.bid_price, "bid")?,
                    ask: parse_decimal(&t.ask_price, "ask")?,
                    last: parse_decimal(&t.last_price, "last")?,
                    venue_timestamp: chrono::DateTime::from_timestamp_millis(t.close_time)
                        .unwrap_or_else(Utc::now),
                })
            })
            .collect()
    }

    async fn orderbook(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot, VenueError> {
        let url = format!(
            "{}?symbol={}&limit={}",
            self.url(&self.endpoints.orderbook_path),
            symbol,
            depth
        );
        let requested_at = Utc::now();
        let resp: RawDepthResponse = get_json(&self.client, &url, &[]).await?;
        let received_at = Utc::now();

        let to_levels = |raw: Vec<[String; 2]>| -> Result<Vec<BookLevel>, VenueError> {
            raw.into_iter()
                .take(depth)
                .map(|[p, q]| {
                    Ok(BookLevel {
                        price: parse_decimal(&p, "level price")?,
                        quantity: parse_decimal(&q, "level quantity")?,
                    })
                })
                .collect()
        };

        Ok(OrderBookSnapshot {
            venue_id: self.venue_id.clone(),
            symbol: symbol.to_string(),
            bids: to_levels(resp.bids)?,
            asks: to_levels(resp.asks)?,
            venue_timestamp: received_at,
            requested_at,
            received_at,
            cached: false,
        })
    }

    async fn funding_rate(&self, symbol: &str) -> Result<FundingRate, VenueError> {
        let path = self
            .endpoints
            .funding_rate_path
            .as_ref()
            .ok_or_else(|| VenueError::transport("funding rate not supported by this venue"))?;
        let url = format!("{}?symbol={}", self.url(path), symbol);
        let resp: RawFundingResponse = get_json(&self.client, &url, &[]).await?;
        Ok(FundingRate {
            rate: parse_decimal(&resp.last_funding_rate, "funding rate")?,
            next_funding_time: chrono::DateTime::from_timestamp_millis(resp.next_funding_time)
                .unwrap_or_else(Utc::now),
            period_hours: 8,
        })
    }
}
