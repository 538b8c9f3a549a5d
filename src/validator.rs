//! Safety Validator: runs all twelve checks (no short-circuit)
//! and aggregates pass/fail with per-check rationale.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::calculator::Opportunity;
use crate::config::Settings;
use crate::depth_baseline::{DepthBaselineStore, Side};
use crate::ticker_registry::{ArbitragePair, PairType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub message: String,
    pub value: Decimal,
    pub threshold: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub checks: Vec<CheckResult>,
    pub failed_checks: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn valid(&self) -> bool {
        self.failed_checks.is_empty()
    }
}

fn check(name: &'static str, passed: bool, message: impl Into<String>, value: Decimal, threshold: Decimal) -> CheckResult {
    CheckResult {
        name,
        passed,
        message: message.into(),
        value,
        threshold,
    }
}

/// Extra context the validator needs beyond the opportunity itself: the
/// generating pair (for direction/manual-only checks), the spread-age
/// duration already tracked by the caller, the per-symbol transfer-buffer
/// statistic, and deposit/withdraw capability on the chosen network.
pub struct ValidatorContext<'a> {
    pub pair: &'a ArbitragePair,
    pub spread_age_sec: u64,
    pub signal_age_sec: u64,
    pub low_withdraw_enabled: bool,
    pub high_deposit_enabled: bool,
    pub transfer_time_min: Decimal,
    pub symbol_sigma_per_min_pct: Decimal,
}

/// Run every check against `opp`, never short-circuiting.
pub fn validate(opp: &Opportunity, ctx: &ValidatorContext, settings: &Settings, depth_history: &DepthBaselineStore) -> ValidationResult {
    let mut result = ValidationResult::default();

    let min_exit_liquidity = Decimal::try_from(settings.min_exit_liquidity_usd).unwrap_or(dec!(5_000.0));
    let exit_liquidity = opp.depth_low_bids_usd.min(opp.depth_high_asks_usd);
    result.checks.push(check(
        "exit_liquidity",
        exit_liquidity >= min_exit_liquidity,
        format!("exit liquidity ${exit_liquidity} vs floor ${min_exit_liquidity}"),
        exit_liquidity,
        min_exit_liquidity,
    ));

    let max_ratio = Decimal::try_from(settings.max_position_to_exit_ratio).unwrap_or(dec!(0.5));
    let position_ratio = if exit_liquidity > Decimal::ZERO {
        opp.suggested_position_usd / exit_liquidity
    } else {
        Decimal::MAX
    };
    result.checks.push(check(
        "position_ratio",
        position_ratio <= max_ratio,
        format!("position/exit ratio {position_ratio} vs ceiling {max_ratio}"),
        position_ratio,
        max_ratio,
    ));

    let max_slippage = Decimal::try_from(settings.max_slippage_pct).unwrap_or(dec!(2.0));
    let total_slippage = opp.exec_buy.slippage_pct + opp.exec_sell.slippage_pct;
    result.checks.push(check(
        "max_slippage",
        total_slippage <= max_slippage,
        format!("combined slippage {total_slippage}% vs ceiling {max_slippage}%"),
        total_slippage,
        max_slippage,
    ));

    let max_latency = Decimal::from(settings.max_latency_ms);
    let latency = opp.low_book.latency_ms().max(opp.high_book.latency_ms());
    let latency_dec = Decimal::from(latency);
    result.checks.push(check(
        "latency",
        latency_dec <= max_latency,
        format!("max book latency {latency}ms vs ceiling {}ms", settings.max_latency_ms),
        latency_dec,
        max_latency,
    ));

    let min_depth_ratio = Decimal::try_from(settings.min_depth_vs_history_ratio).unwrap_or(dec!(0.30));
    let warning_depth_ratio = Decimal::try_from(settings.warning_depth_ratio).unwrap_or(dec!(0.50));
    let depth_ratio = depth_history.ratio(&opp.pair_id, &opp.low_venue_id, Side::Bids, opp.depth_low_bids_usd);
    match depth_ratio {
        Some(ratio) => {
            let passed = ratio >= min_depth_ratio;
            if passed && ratio < warning_depth_ratio {
                result
                    .warnings
                    .push(format!("depth_vs_history at {ratio}, below warning band {warning_depth_ratio}"));
            }
            result.checks.push(check(
                "depth_vs_history",
                passed,
                format!("depth ratio {ratio} vs floor {min_depth_ratio}"),
                ratio,
                min_depth_ratio,
            ));
        }
        None => {
            // Bypass on empty history.
            result.checks.push(check(
                "depth_vs_history",
                true,
                "no depth history yet, check bypassed",
                Decimal::ZERO,
                min_depth_ratio,
            ));
        }
    }

    let max_spread_age_hours = Decimal::from(settings.max_spread_age_hours);
    let spread_age_hours = Decimal::from(ctx.spread_age_sec) / dec!(3600.0);
    result.checks.push(check(
        "spread_age",
        spread_age_hours <= max_spread_age_hours,
        format!("spread has held for {spread_age_hours}h vs ceiling {max_spread_age_hours}h"),
        spread_age_hours,
        max_spread_age_hours,
    ));

    let max_spread_freshness = Decimal::from(settings.max_spread_age_sec);
    let signal_age = Decimal::from(ctx.signal_age_sec);
    result.checks.push(check(
        "spread_freshness",
        signal_age <= max_spread_freshness,
        format!("signal age {signal_age}s vs ceiling {max_spread_freshness}s"),
        signal_age,
        max_spread_freshness,
    ));

    let max_bid_ask_spread = Decimal::try_from(settings.max_bid_ask_spread_pct).unwrap_or(dec!(1.0));
    let low_spread_pct = bid_ask_spread_pct(opp.low_price.bid, opp.low_price.ask);
    let high_spread_pct = bid_ask_spread_pct(opp.high_price.bid, opp.high_price.ask);
    let worst_bid_ask = low_spread_pct.max(high_spread_pct);
    result.checks.push(check(
        "bid_ask_spread",
        worst_bid_ask <= max_bid_ask_spread,
        format!("worst venue bid/ask spread {worst_bid_ask}% vs ceiling {max_bid_ask_spread}%"),
        worst_bid_ask,
        max_bid_ask_spread,
    ));

    let sell_top = opp.high_book.best_bid().unwrap_or(Decimal::ZERO);
    let buy_top = opp.low_book.best_ask().unwrap_or(Decimal::ZERO);
    let bid_top = opp.low_book.best_bid().unwrap_or(Decimal::ZERO);
    let ask_top = opp.high_book.best_ask().unwrap_or(Decimal::ZERO);
    let instant_exit_margin = (sell_top - buy_top) + (bid_top - ask_top);
    result.checks.push(check(
        "instant_exit",
        instant_exit_margin > Decimal::ZERO,
        format!("instant exit margin {instant_exit_margin}"),
        instant_exit_margin,
        Decimal::ZERO,
    ));

    let direction_ok = ctx.pair.high_venue.shortable();
    result.checks.push(check(
        "direction_validity",
        direction_ok,
        format!("high venue {} shortable: {direction_ok}", ctx.pair.high_venue.venue_id),
        if direction_ok { Decimal::ONE } else { Decimal::ZERO },
        Decimal::ONE,
    ));

    if ctx.pair.pair_type == PairType::Manual {
        let deposit_withdraw_ok = ctx.low_withdraw_enabled && ctx.high_deposit_enabled;
        result.checks.push(check(
            "deposit_withdraw",
            deposit_withdraw_ok,
            format!(
                "low withdraw={} high deposit={}",
                ctx.low_withdraw_enabled, ctx.high_deposit_enabled
            ),
            if deposit_withdraw_ok { Decimal::ONE } else { Decimal::ZERO },
            Decimal::ONE,
        ));

        let required_buffer_pct = dec!(3.0) * sqrt_decimal(ctx.transfer_time_min) * ctx.symbol_sigma_per_min_pct;
        let buffer_ok = opp.nominal_spread_pct >= required_buffer_pct;
        result.checks.push(check(
            "transfer_buffer",
            buffer_ok,
            format!("nominal spread {}% vs required buffer {required_buffer_pct}%", opp.nominal_spread_pct),
            opp.nominal_spread_pct,
            required_buffer_pct,
        ));
    }

    for c in &result.checks {
        if !c.passed {
            result.failed_checks.push(c.name.to_string());
        }
    }

    result
}

fn bid_ask_spread_pct(bid: Decimal, ask: Decimal) -> Decimal {
    if ask <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (ask - bid) / ask * dec!(100.0)
}

/// Decimal has no built-in sqrt; Newton's method to a fixed tolerance is
/// sufficient for the transfer-buffer statistic (values are small, O(1-60)).
fn sqrt_decimal(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let mut guess = value;
    for _ in 0..50 {
        let next = (guess + value / guess) / dec!(2.0);
        if (next - guess).abs() < dec!(0.0000001) {
            return next;
        }
        guess = next;
    }
    guess
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::types::{BookLevel, OrderBookSnapshot, PriceRecord, Venue, VenueKind};
    use chrono::Utc;

    fn book(venue_id: &str, symbol: &str, bid: Decimal, ask: Decimal) -> OrderBookSnapshot {
        OrderBookSnapshot {
            venue_id: venue_id.into(),
            symbol: symbol.into(),
            bids: vec![BookLevel { price: bid, quantity: dec!(100) }],
            asks: vec![BookLevel { price: ask, quantity: dec!(100) }],
            venue_timestamp: Utc::now(),
            requested_at: Utc::now(),
            received_at: Utc::now(),
            cached: false,
        }
    }

    fn price(venue_id: &str, symbol: &str, bid: Decimal, ask: Decimal) -> PriceRecord {
        PriceRecord {
            venue_id: venue_id.into(),
            symbol: symbol.into(),
            kind: VenueKind::CexSpot,
            bid,
            ask,
            last: (bid + ask) / dec!(2.0),
            venue_timestamp: Utc::now(),
            received_at: Utc::now(),
        }
    }

    fn sample_opportunity() -> Opportunity {
        crate::calculator::measure_opportunity(
            "BTC:low:high".into(),
            "BTC".into(),
            "low".into(),
            "high".into(),
            price("low", "BTC", dec!(99.9), dec!(100.0)),
            price("high", "BTC", dec!(105.0), dec!(105.1)),
            book("low", "BTC", dec!(99.9), dec!(100.0)),
            book("high", "BTC", dec!(105.0), dec!(105.1)),
            dec!(1_000.0),
            dec!(2.0),
        )
        .unwrap()
    }

    fn sample_pair(pair_type: PairType) -> ArbitragePair {
        ArbitragePair {
            symbol: "BTC".into(),
            low_venue: Venue::new("low", VenueKind::CexSpot, vec!["ethereum".into()]),
            high_venue: Venue::new(
                "high",
                if pair_type == PairType::Auto { VenueKind::CexFutures } else { VenueKind::CexSpot },
                vec!["ethereum".into()],
            ),
            pair_type,
            requires_transfer: pair_type == PairType::Manual,
            transfer_network: if pair_type == PairType::Manual { Some("ethereum".into()) } else { None },
        }
    }

    #[test]
    fn every_check_name_matches_the_catalogue() {
        let opp = sample_opportunity();
        let pair = sample_pair(PairType::Auto);
        let ctx = ValidatorContext {
            pair: &pair,
            spread_age_sec: 10,
            signal_age_sec: 1,
            low_withdraw_enabled: true,
            high_deposit_enabled: true,
            transfer_time_min: dec!(12.0),
            symbol_sigma_per_min_pct: dec!(0.20),
        };
        let settings = Settings::default();
        let store = DepthBaselineStore::new();
        let result = validate(&opp, &ctx, &settings, &store);

        const CATALOGUE: &[&str] = &[
            "exit_liquidity",
            "position_ratio",
            "max_slippage",
            "latency",
            "depth_vs_history",
            "spread_age",
            "spread_freshness",
            "bid_ask_spread",
            "instant_exit",
            "direction_validity",
        ];
        for c in &result.checks {
            assert!(CATALOGUE.contains(&c.name), "unexpected check name {}", c.name);
        }
    }

    #[test]
    fn manual_pairs_add_transfer_checks() {
        let opp = sample_opportunity();
        let pair = sample_pair(PairType::Manual);
        let ctx = ValidatorContext {
            pair: &pair,
            spread_age_sec: 10,
            signal_age_sec: 1,
            low_withdraw_enabled: true,
            high_deposit_enabled: true,
            transfer_time_min: dec!(12.0),
            symbol_sigma_per_min_pct: dec!(0.20),
        };
        let settings = Settings::default();
        let store = DepthBaselineStore::new();
        let result = validate(&opp, &ctx, &settings, &store);
        assert!(result.checks.iter().any(|c| c.name == "deposit_withdraw"));
        assert!(result.checks.iter().any(|c| c.name == "transfer_buffer"));
    }

    #[test]
    fn insufficient_spread_fails_transfer_buffer() {
        let low_book = book("binance_spot", "BTC", dec!(98.9), dec!(99.0));
        let high_book = book("kraken_spot", "BTC", dec!(100.2), dec!(100.3));
        let opp = crate::calculator::measure_opportunity(
            "BTC:binance_spot:kraken_spot".into(),
            "BTC".into(),
            "binance_spot".into(),
            "kraken_spot".into(),
            price("binance_spot", "BTC", dec!(98.9), dec!(99.0)),
            price("kraken_spot", "BTC", dec!(100.2), dec!(100.3)),
            low_book,
            high_book,
            dec!(1_000.0),
            dec!(2.0),
        )
        .unwrap();
        let pair = sample_pair(PairType::Manual);
        let ctx = ValidatorContext {
            pair: &pair,
            spread_age_sec: 10,
            signal_age_sec: 1,
            low_withdraw_enabled: true,
            high_deposit_enabled: true,
            transfer_time_min: dec!(12.0),
            symbol_sigma_per_min_pct: dec!(0.20),
        };
        let settings = Settings::default();
        let store = DepthBaselineStore::new();
        let result = validate(&opp, &ctx, &settings, &store);
        assert!(result.failed_checks.contains(&"transfer_buffer".to_string()));
    }

    #[test]
    fn depth_vs_history_bypasses_on_empty_history() {
        let opp = sample_opportunity();
        let pair = sample_pair(PairType::Auto);
        let ctx = ValidatorContext {
            pair: &pair,
            spread_age_sec: 10,
            signal_age_sec: 1,
            low_withdraw_enabled: true,
            high_deposit_enabled: true,
            transfer_time_min: dec!(12.0),
            symbol_sigma_per_min_pct: dec!(0.20),
        };
        let settings = Settings::default();
        let store = DepthBaselineStore::new();
        let result = validate(&opp, &ctx, &settings, &store);
        let depth_check = result.checks.iter().find(|c| c.name == "depth_vs_history").unwrap();
        assert!(depth_check.passed);
    }
}
