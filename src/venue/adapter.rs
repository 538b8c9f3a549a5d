//! Uniform read-only interface to one remote trading venue.
//!
//! Concrete venues are a small enumerated registry of variants rather than
//! dynamic dispatch by class name.

use async_trait::async_trait;

use crate::error::VenueError;
use crate::venue::types::{AssetDetails, FundingRate, OrderBookSnapshot, VenueKind, VenueSymbol};

#[async_trait]
pub trait VenueAdapter: Send + Sync {
    fn venue_id(&self) -> &str;
    fn kind(&self) -> VenueKind;

    /// Active, USDT-quoted (or venue-equivalent) futures instruments.
    async fn futures_symbols(&self) -> Result<Vec<VenueSymbol>, VenueError> {
        Ok(Vec::new())
    }

    /// Active, USDT-quoted (or venue-equivalent) spot instruments.
    async fn spot_symbols(&self) -> Result<Vec<VenueSymbol>, VenueError> {
        Ok(Vec::new())
    }

    /// Deposit/withdraw network metadata for one asset.
    async fn asset_details(&self, asset: &str) -> Result<AssetDetails, VenueError>;

    /// Batch ticker fetch for the given symbols (or all symbols if `None`).
    /// Implementers must prefer a single batch endpoint where available.
    async fn tickers(
        &self,
        symbols: Option<&[String]>,
    ) -> Result<Vec<RawTicker>, VenueError>;

    /// Order book to `depth` levels per side.
    async fn orderbook(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot, VenueError>;

    /// Only meaningful for perp venues.
    async fn funding_rate(&self, _symbol: &str) -> Result<FundingRate, VenueError> {
        Err(VenueError::transport("funding rate not supported by this venue"))
    }
}

/// Raw per-symbol quote as returned by `tickers()`, before TTL/invariant
/// filtering turns it into a [`crate::venue::types::PriceRecord`].
#[derive(Debug, Clone)]
pub struct RawTicker {
    pub symbol: String,
    pub bid: rust_decimal::Decimal,
    pub ask: rust_decimal::Decimal,
    pub last: rust_decimal::Decimal,
    pub venue_timestamp: chrono::DateTime<chrono::Utc>,
}
