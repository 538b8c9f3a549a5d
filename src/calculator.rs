//! Spread/Depth Calculator: executable-price walking, nominal
//! and real spread, depth-within-slippage, suggested position size, and
//! lagging-venue detection. Every computation here is decimal; floats never
//! appear.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::venue::types::{BookLevel, OrderBookSnapshot, PriceRecord};

/// Nominal spread above this is treated as a likely symbol collision rather
/// than a real opportunity.
pub const UNREALISTIC_SPREAD_CEILING_PCT: Decimal = dec!(50.0);

/// Result of walking one side of a book to fill a target notional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionResult {
    pub avg_price: Decimal,
    pub best_price: Decimal,
    pub slippage_pct: Decimal,
    pub levels_consumed: usize,
    pub fully_filled: bool,
    pub unfilled_usd: Decimal,
}

impl ExecutionResult {
    fn zero() -> Self {
        Self {
            avg_price: Decimal::ZERO,
            best_price: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
            levels_consumed: 0,
            fully_filled: false,
            unfilled_usd: Decimal::ZERO,
        }
    }
}

/// Walk `levels` from the top, accumulating quantity until cumulative
/// level-value reaches `notional_usd`; the last level is partially consumed.
pub fn walk_book(levels: &[BookLevel], notional_usd: Decimal) -> ExecutionResult {
    let Some(best) = levels.first() else {
        return ExecutionResult::zero();
    };
    if notional_usd <= Decimal::ZERO {
        return ExecutionResult::zero();
    }

    let best_price = best.price;
    let mut remaining = notional_usd;
    let mut total_usd = Decimal::ZERO;
    let mut total_qty = Decimal::ZERO;
    let mut levels_consumed = 0usize;

    for level in levels {
        if remaining <= Decimal::ZERO {
            break;
        }
        let level_value = level.price * level.quantity;
        levels_consumed += 1;

        if level_value >= remaining {
            let qty_taken = remaining / level.price;
            total_usd += remaining;
            total_qty += qty_taken;
            remaining = Decimal::ZERO;
        } else {
            total_usd += level_value;
            total_qty += level.quantity;
            remaining -= level_value;
        }
    }

    let fully_filled = remaining <= Decimal::ZERO;
    if total_qty <= Decimal::ZERO || best_price <= Decimal::ZERO {
        return ExecutionResult::zero();
    }

    let avg_price = total_usd / total_qty;
    let slippage_pct = ((avg_price - best_price).abs() / best_price) * dec!(100.0);

    ExecutionResult {
        avg_price,
        best_price,
        slippage_pct,
        levels_consumed,
        fully_filled,
        unfilled_usd: remaining,
    }
}

/// `(best_bid(high) - best_ask(low)) / best_ask(low) * 100`.
/// Returns `None` if either side is empty or the low ask is non-positive
/// (division-by-zero guard).
pub fn nominal_spread_pct(low_ask: Decimal, high_bid: Decimal) -> Option<Decimal> {
    if low_ask <= Decimal::ZERO {
        return None;
    }
    Some((high_bid - low_ask) / low_ask * dec!(100.0))
}

/// `(exec_sell - exec_buy) / exec_buy * 100` at the walked notional.
pub fn real_spread_pct(exec_buy: Decimal, exec_sell: Decimal) -> Option<Decimal> {
    if exec_buy <= Decimal::ZERO {
        return None;
    }
    Some((exec_sell - exec_buy) / exec_buy * dec!(100.0))
}

/// Sum `price * qty` for every level whose cumulative slippage from the top
/// stays within `max_slippage_pct`.
pub fn depth_within_slippage(levels: &[BookLevel], max_slippage_pct: Decimal) -> Decimal {
    let Some(best) = levels.first() else {
        return Decimal::ZERO;
    };
    if best.price <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut depth_usd = Decimal::ZERO;
    for level in levels {
        let deviation = (level.price - best.price).abs() / best.price * dec!(100.0);
        if deviation > max_slippage_pct {
            break;
        }
        depth_usd += level.price * level.quantity;
    }
    depth_usd
}

/// Half of the min of low-side-bids depth and high-side-asks depth, capped
/// at $50K, rounded to the nearest $500.
pub fn suggested_position_size(low_bids_depth_usd: Decimal, high_asks_depth_usd: Decimal) -> Decimal {
    const CAP: Decimal = dec!(50_000.0);
    const ROUND_STEP: Decimal = dec!(500.0);

    let raw = low_bids_depth_usd.min(high_asks_depth_usd) / dec!(2.0);
    let capped = raw.min(CAP);
    if capped <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (capped / ROUND_STEP).round() * ROUND_STEP
}

#[derive(Debug, Clone)]
pub struct LaggingInfo {
    pub venue_id: String,
    pub price: Decimal,
    pub median: Decimal,
    pub deviation_pct: Decimal,
}

/// Flag a single outlier venue among `prices` when at least
/// `min_venues` report, exactly one deviates from the median by
/// `>= min_deviation_pct`, and every other venue is within
/// `max_other_deviation_pct` of the median.
pub fn detect_lagging(
    prices: &BTreeMap<String, Decimal>,
    min_venues: usize,
    min_deviation_pct: Decimal,
    max_other_deviation_pct: Decimal,
) -> Option<LaggingInfo> {
    if prices.len() < min_venues {
        return None;
    }

    let mut values: Vec<Decimal> = prices.values().copied().collect();
    values.sort();
    let median = median_of(&values)?;
    if median <= Decimal::ZERO {
        return None;
    }

    let mut outliers = Vec::new();
    let mut all_others_agree = true;
    for (venue_id, price) in prices {
        let deviation = (*price - median).abs() / median * dec!(100.0);
        if deviation >= min_deviation_pct {
            outliers.push((venue_id.clone(), *price, deviation));
        } else if deviation > max_other_deviation_pct {
            all_others_agree = false;
        }
    }

    if outliers.len() == 1 && all_others_agree {
        let (venue_id, price, deviation_pct) = outliers.into_iter().next().unwrap();
        Some(LaggingInfo {
            venue_id,
            price,
            median,
            deviation_pct,
        })
    } else {
        None
    }
}

fn median_of(sorted: &[Decimal]) -> Option<Decimal> {
    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / dec!(2.0))
    } else {
        Some(sorted[mid])
    }
}

/// A fully-measured, not-yet-validated candidate.
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub pair_id: String,
    pub symbol: String,
    pub low_venue_id: String,
    pub high_venue_id: String,
    pub low_price: PriceRecord,
    pub high_price: PriceRecord,
    pub low_book: OrderBookSnapshot,
    pub high_book: OrderBookSnapshot,
    pub nominal_spread_pct: Decimal,
    pub real_spread_pct: Decimal,
    pub exec_buy: ExecutionResult,
    pub exec_sell: ExecutionResult,
    pub depth_low_bids_usd: Decimal,
    pub depth_high_asks_usd: Decimal,
    pub suggested_position_usd: Decimal,
    pub lagging: Option<LaggingInfo>,
    pub non_finite: bool,
    pub created_at: DateTime<Utc>,
}

/// Measure one candidate at `position_usd` of target notional. Returns
/// `None` when the nominal spread exceeds the unrealistic ceiling (likely
/// symbol collision, ) or either side lacks a positive ask/bid.
pub fn measure_opportunity(
    pair_id: String,
    symbol: String,
    low_venue_id: String,
    high_venue_id: String,
    low_price: PriceRecord,
    high_price: PriceRecord,
    low_book: OrderBookSnapshot,
    high_book: OrderBookSnapshot,
    position_usd: Decimal,
    max_slippage_pct: Decimal,
) -> Option<Opportunity> {
    let low_ask = low_book.best_ask()?;
    let high_bid = high_book.best_bid()?;

    let nominal = nominal_spread_pct(low_ask, high_bid)?;
    if nominal > UNREALISTIC_SPREAD_CEILING_PCT {
        return None;
    }

    let exec_buy = walk_book(&low_book.asks, position_usd);
    let exec_sell = walk_book(&high_book.bids, position_usd);

    let (real, non_finite) = match real_spread_pct(exec_buy.avg_price, exec_sell.avg_price) {
        Some(v) => (v, false),
        None => (Decimal::ZERO, true),
    };

    let depth_low_bids_usd = depth_within_slippage(&low_book.bids, max_slippage_pct);
    let depth_high_asks_usd = depth_within_slippage(&high_book.asks, max_slippage_pct);
    let suggested_position_usd = suggested_position_size(depth_low_bids_usd, depth_high_asks_usd);

    Some(Opportunity {
        pair_id,
        symbol,
        low_venue_id,
        high_venue_id,
        low_price,
        high_price,
        low_book,
        high_book,
        nominal_spread_pct: nominal,
        real_spread_pct: real,
        exec_buy,
        exec_sell,
        depth_low_bids_usd,
        depth_high_asks_usd,
        suggested_position_usd,
        lagging: None,
        non_finite,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: f64, qty: f64) -> BookLevel {
        BookLevel {
            price: Decimal::try_from(price).unwrap(),
            quantity: Decimal::try_from(qty).unwrap(),
        }
    }

    #[test]
    fn executable_slippage_is_non_decreasing_in_notional() {
        let book = vec![level(100.0, 1.0), level(101.0, 1.0), level(105.0, 10.0)];
        let small = walk_book(&book, dec!(50.0));
        let medium = walk_book(&book, dec!(150.0));
        let large = walk_book(&book, dec!(300.0));
        assert!(small.slippage_pct <= medium.slippage_pct);
        assert!(medium.slippage_pct <= large.slippage_pct);
    }

    #[test]
    fn depth_within_slippage_is_non_decreasing_in_cap() {
        let book = vec![level(100.0, 1.0), level(102.0, 1.0), level(110.0, 1.0)];
        let tight = depth_within_slippage(&book, dec!(1.0));
        let loose = depth_within_slippage(&book, dec!(15.0));
        assert!(tight <= loose);
    }

    #[test]
    fn nominal_real_and_net_spread_are_exact_in_decimal() {
        let nominal = nominal_spread_pct(dec!(100.0), dec!(105.0)).unwrap();
        let real = real_spread_pct(dec!(100.0), dec!(104.0)).unwrap();
        assert!(nominal >= real);
        let fees_total = dec!(0.72);
        let net = real - fees_total;
        assert_eq!(net, dec!(3.28));
    }

    #[test]
    fn lagging_flags_the_sole_outlier_among_four() {
        let mut prices = BTreeMap::new();
        prices.insert("a".to_string(), dec!(100.05));
        prices.insert("b".to_string(), dec!(100.02));
        prices.insert("c".to_string(), dec!(100.08));
        prices.insert("d".to_string(), dec!(106.30));

        let result = detect_lagging(&prices, 4, dec!(5.0), dec!(2.0)).unwrap();
        assert_eq!(result.venue_id, "d");
    }

    #[test]
    fn lagging_is_silent_with_only_three_venues() {
        let mut prices = BTreeMap::new();
        prices.insert("a".to_string(), dec!(100.0));
        prices.insert("b".to_string(), dec!(100.0));
        prices.insert("c".to_string(), dec!(110.0));
        assert!(detect_lagging(&prices, 4, dec!(5.0), dec!(2.0)).is_none());
    }

    #[test]
    fn zero_notional_yields_zero_execution_not_a_panic() {
        let book = vec![level(100.0, 1.0)];
        let result = walk_book(&book, Decimal::ZERO);
        assert_eq!(result.avg_price, Decimal::ZERO);
    }

    #[test]
    fn suggested_position_is_capped_and_rounded() {
        let size = suggested_position_size(dec!(500_000.0), dec!(500_000.0));
        assert_eq!(size, dec!(50_000.0));
        let small = suggested_position_size(dec!(900.0), dec!(900.0));
        assert_eq!(small, dec!(500.0));
    }
}
