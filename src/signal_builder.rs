//! Signal Builder: turns a validated opportunity into the
//! transport-ready record. Every step here is pure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::calculator::Opportunity;
use crate::ticker_registry::{ArbitragePair, PairType};
use crate::validator::ValidationResult;
use crate::venue::types::VenueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Auto,
    Manual,
    Lagging,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyType {
    /// spot -> futures
    Sf,
    /// dex_spot -> cex_futures
    Df,
    /// cex_futures -> cex_futures
    Ff,
    /// perp_dex -> cex_futures (or vice versa)
    Pf,
    /// dex_spot -> perp_dex
    Dp,
    /// perp_dex -> perp_dex
    Pp,
}

impl StrategyType {
    fn code(self) -> &'static str {
        match self {
            StrategyType::Sf => "SF",
            StrategyType::Df => "DF",
            StrategyType::Ff => "FF",
            StrategyType::Pf => "PF",
            StrategyType::Dp => "DP",
            StrategyType::Pp => "PP",
        }
    }
}

/// Fixed (low_kind, high_kind) -> strategy_type table.
pub fn strategy_type(low_kind: VenueKind, high_kind: VenueKind) -> Option<StrategyType> {
    use VenueKind::*;
    match (low_kind, high_kind) {
        (CexSpot, CexFutures) => Some(StrategyType::Sf),
        (DexSpot, CexFutures) => Some(StrategyType::Df),
        (CexFutures, CexFutures) => Some(StrategyType::Ff),
        (PerpDex, CexFutures) | (CexFutures, PerpDex) => Some(StrategyType::Pf),
        (DexSpot, PerpDex) => Some(StrategyType::Dp),
        (PerpDex, PerpDex) => Some(StrategyType::Pp),
        _ => None,
    }
}

/// Per-side fee percentage table, applied twice
/// (entry + exit) for a total of 2*low + 2*high.
fn fee_pct(kind: VenueKind) -> Decimal {
    match kind {
        VenueKind::DexSpot => dec!(0.3),
        VenueKind::CexSpot => dec!(0.1),
        VenueKind::CexFutures => dec!(0.06),
        VenueKind::PerpDex => dec!(0.1),
    }
}

pub fn total_fees_pct(low_kind: VenueKind, high_kind: VenueKind) -> Decimal {
    dec!(2.0) * fee_pct(low_kind) + dec!(2.0) * fee_pct(high_kind)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeesBreakdown {
    pub entry_pct: Decimal,
    pub exit_pct: Decimal,
    pub total_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLinks {
    pub buy_url: String,
    pub sell_url: String,
    pub chart_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStatus {
    Valid,
    Failed,
    BlockedCooldown,
    BlockedBlacklist,
    Dispatched,
    DispatchFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub strategy_id: String,
    pub signal_type: SignalType,
    pub strategy_type: Option<StrategyType>,
    pub symbol: String,
    pub pair_id: String,
    pub low_venue_id: String,
    pub high_venue_id: String,
    pub nominal_spread_pct: Decimal,
    pub real_spread_pct: Decimal,
    pub fees: FeesBreakdown,
    pub net_spread_pct: Decimal,
    pub action_lines: Vec<String>,
    pub links: ExternalLinks,
    pub validation: ValidationResult,
    pub status: SignalStatus,
    pub created_at: chrono::DateTime<Utc>,
}

/// Per-process monotonic counter, widening the strategy_id's timestamp slice
/// so bursty emission in the same millisecond cannot collide.
static STRATEGY_COUNTER: AtomicU32 = AtomicU32::new(0);

fn next_strategy_id(strategy: Option<StrategyType>, symbol: &str, spread_pct: Decimal, now_ms: i64) -> String {
    let counter = STRATEGY_COUNTER.fetch_add(1, Ordering::Relaxed) % 1000;
    let ts_slice = now_ms % 100_000;
    let spread_tag = spread_pct.round_dp(2);
    // "XX" marks a (low_kind, high_kind) shape absent from the strategy_type
    // table rather than mislabeling it as one of the six known strategies.
    let code = strategy.map(StrategyType::code).unwrap_or("XX");
    format!("{code}-{symbol}-S{spread_tag}-{ts_slice:05}{counter:03}")
}

/// URL templates keyed by venue_id; DEX venues fall back to a screener link.
pub fn build_links(venue_urls: &HashMap<String, String>, symbol: &str, low_venue_id: &str, high_venue_id: &str, low_is_dex: bool, high_is_dex: bool) -> ExternalLinks {
    let buy_url = venue_urls
        .get(low_venue_id)
        .cloned()
        .unwrap_or_else(|| format!("https://example-venue.invalid/{low_venue_id}/{symbol}"));
    let sell_url = venue_urls
        .get(high_venue_id)
        .cloned()
        .unwrap_or_else(|| format!("https://example-venue.invalid/{high_venue_id}/{symbol}"));
    let chart_url = if low_is_dex || high_is_dex {
        format!("https://dexscreener.invalid/search?q={symbol}")
    } else {
        format!("https://tradingview.invalid/symbols/{symbol}")
    };
    ExternalLinks {
        buy_url,
        sell_url,
        chart_url,
    }
}

fn action_lines(symbol: &str, low_venue_id: &str, high_venue_id: &str, shortable_high: bool) -> Vec<String> {
    let short_or_sell = if shortable_high { "SHORT" } else { "SELL" };
    vec![
        format!("BUY {symbol} on {low_venue_id}"),
        format!("{short_or_sell} {symbol} on {high_venue_id}"),
        "Enter in parts, match sizes".to_string(),
        "Wait for convergence".to_string(),
    ]
}

/// Build the final signal from a validated (or failed) opportunity. Per
///  `contract_conflict` suppresses auto signal emission outright
/// and only warns for manual signals.
pub fn build_signal(
    opp: &Opportunity,
    pair: &ArbitragePair,
    validation: ValidationResult,
    contract_conflict: bool,
    venue_urls: &HashMap<String, String>,
    now_ms: i64,
) -> Signal {
    let signal_type = if opp.lagging.is_some() {
        SignalType::Lagging
    } else if !validation.valid() {
        SignalType::Invalid
    } else {
        match pair.pair_type {
            PairType::Auto => {
                if contract_conflict {
                    SignalType::Invalid
                } else {
                    SignalType::Auto
                }
            }
            PairType::Manual => SignalType::Manual,
        }
    };

    let strategy = strategy_type(pair.low_venue.kind, pair.high_venue.kind);
    let total_fees = total_fees_pct(pair.low_venue.kind, pair.high_venue.kind);
    let fees = FeesBreakdown {
        entry_pct: fee_pct(pair.low_venue.kind) + fee_pct(pair.high_venue.kind),
        exit_pct: fee_pct(pair.low_venue.kind) + fee_pct(pair.high_venue.kind),
        total_pct: total_fees,
    };
    let net_spread_pct = opp.real_spread_pct - total_fees;

    let strategy_id = next_strategy_id(strategy, &opp.symbol, opp.real_spread_pct, now_ms);

    let status = if signal_type == SignalType::Invalid {
        SignalStatus::Failed
    } else {
        SignalStatus::Valid
    };

    Signal {
        strategy_id,
        signal_type,
        strategy_type: strategy,
        symbol: opp.symbol.clone(),
        pair_id: opp.pair_id.clone(),
        low_venue_id: opp.low_venue_id.clone(),
        high_venue_id: opp.high_venue_id.clone(),
        nominal_spread_pct: opp.nominal_spread_pct,
        real_spread_pct: opp.real_spread_pct,
        fees,
        net_spread_pct,
        action_lines: action_lines(&opp.symbol, &opp.low_venue_id, &opp.high_venue_id, pair.high_venue.shortable()),
        links: build_links(
            venue_urls,
            &opp.symbol,
            &opp.low_venue_id,
            &opp.high_venue_id,
            pair.low_venue.kind.is_dex(),
            pair.high_venue.kind.is_dex(),
        ),
        validation,
        status,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_type_table_matches_direction_rule() {
        assert_eq!(strategy_type(VenueKind::DexSpot, VenueKind::CexFutures), Some(StrategyType::Df));
        assert_eq!(strategy_type(VenueKind::CexSpot, VenueKind::DexSpot), None);
    }

    #[test]
    fn net_spread_equals_real_minus_total_fees_exact() {
        let total = total_fees_pct(VenueKind::DexSpot, VenueKind::CexFutures);
        assert_eq!(total, dec!(2.0) * dec!(0.3) + dec!(2.0) * dec!(0.06));
        let real = dec!(5.18);
        let net = real - total;
        assert_eq!(net, real - total);
    }

    #[test]
    fn strategy_ids_do_not_collide_within_the_same_millisecond() {
        let a = next_strategy_id(Some(StrategyType::Df), "BTC", dec!(5.18), 1_700_000_000_000);
        let b = next_strategy_id(Some(StrategyType::Df), "BTC", dec!(5.18), 1_700_000_000_000);
        assert_ne!(a, b);
    }

    #[test]
    fn strategy_id_marks_unmapped_venue_kind_pairs_as_xx() {
        assert_eq!(strategy_type(VenueKind::CexSpot, VenueKind::CexSpot), None);
        let id = next_strategy_id(None, "BTC", dec!(5.18), 1_700_000_000_000);
        assert!(id.starts_with("XX-"));
    }

    #[test]
    fn dex_involvement_routes_chart_to_screener() {
        let links = build_links(&HashMap::new(), "BTC", "uniswap", "binance_futures", true, false);
        assert!(links.chart_url.contains("dexscreener"));
    }
}
