//! End-to-end scenario tests: a two-venue auto pass, a lagging-venue flag,
//! a direction-invalidity rejection, and an order-book stale fallback.
//! Cooldown blocking and the transfer-buffer check are covered by unit
//! tests in `alert_gate` and `validator` respectively, since they don't
//! need cross-module wiring.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use venue_scanner_backend::calculator::{detect_lagging, measure_opportunity};
use venue_scanner_backend::config::Settings;
use venue_scanner_backend::depth_baseline::DepthBaselineStore;
use venue_scanner_backend::signal_builder::{build_signal, SignalStatus, SignalType, StrategyType};
use venue_scanner_backend::state_store::StateStore;
use venue_scanner_backend::ticker_registry::{ArbitragePair, PairType};
use venue_scanner_backend::validator::{validate, ValidatorContext};
use venue_scanner_backend::venue::types::{BookLevel, OrderBookSnapshot, PriceRecord, Venue, VenueKind};

fn deep_book(venue_id: &str, symbol: &str, top_price: Decimal, depth_usd: Decimal) -> OrderBookSnapshot {
    let qty = depth_usd / top_price;
    OrderBookSnapshot {
        venue_id: venue_id.into(),
        symbol: symbol.into(),
        bids: vec![BookLevel { price: top_price, quantity: qty }],
        asks: vec![BookLevel { price: top_price, quantity: qty }],
        venue_timestamp: Utc::now(),
        requested_at: Utc::now(),
        received_at: Utc::now(),
        cached: false,
    }
}

fn price_record(venue_id: &str, symbol: &str, bid: Decimal, ask: Decimal) -> PriceRecord {
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

/// S1: two-venue auto, passes. Nominal 5.18%, fees 0.72%, net 4.46%, type DF.
#[test]
fn s1_two_venue_auto_passes_with_expected_numbers() {
    let low_ask = dec!(0.00001100);
    let high_bid = dec!(0.00001157);

    let low_book = deep_book("dex_ethereum", "PEPE", low_ask, dec!(50_000));
    let mut high_book = deep_book("binance_futures", "PEPE", high_bid, dec!(50_000));
    high_book.bids[0].price = high_bid;

    let opp = measure_opportunity(
        "PEPE:dex_ethereum:binance_futures".into(),
        "PEPE".into(),
        "dex_ethereum".into(),
        "binance_futures".into(),
        price_record("dex_ethereum", "PEPE", low_ask, low_ask),
        price_record("binance_futures", "PEPE", high_bid, high_bid),
        low_book,
        high_book,
        dec!(10_000.0),
        dec!(2.0),
    )
    .expect("spread under unrealistic ceiling");

    assert_eq!(opp.nominal_spread_pct.round_dp(2), dec!(5.18));

    let pair = ArbitragePair {
        symbol: "PEPE".into(),
        low_venue: Venue::new("dex_ethereum", VenueKind::DexSpot, vec![]),
        high_venue: Venue::new("binance_futures", VenueKind::CexFutures, vec![]),
        pair_type: PairType::Auto,
        requires_transfer: true,
        transfer_network: Some("ethereum".into()),
    };

    let validation = validate(
        &opp,
        &ValidatorContext {
            pair: &pair,
            spread_age_sec: 5,
            signal_age_sec: 0,
            low_withdraw_enabled: true,
            high_deposit_enabled: true,
            transfer_time_min: dec!(12.0),
            symbol_sigma_per_min_pct: dec!(0.20),
        },
        &Settings::default(),
        &DepthBaselineStore::new(),
    );
    assert!(validation.valid(), "unexpected failures: {:?}", validation.failed_checks);

    let signal = build_signal(&opp, &pair, validation, false, &Default::default(), 1_700_000_000_000);
    assert_eq!(signal.signal_type, SignalType::Auto);
    assert_eq!(signal.strategy_type, Some(StrategyType::Df));
    assert_eq!(signal.fees.total_pct, dec!(0.72));
    assert_eq!(signal.net_spread_pct.round_dp(2), dec!(4.46));
    assert_eq!(signal.status, SignalStatus::Valid);
}

/// S4: four CEX futures venues, one lagging by >= 5% while the rest agree
/// within 2% of the median.
#[test]
fn s4_lagging_venue_is_flagged() {
    let mut prices = BTreeMap::new();
    prices.insert("venue_a".to_string(), dec!(100.05));
    prices.insert("venue_b".to_string(), dec!(100.02));
    prices.insert("venue_c".to_string(), dec!(100.08));
    prices.insert("venue_d".to_string(), dec!(106.30));

    let lagging = detect_lagging(&prices, 4, dec!(5.0), dec!(2.0)).expect("lagging venue detected");
    assert_eq!(lagging.venue_id, "venue_d");
}

/// S5: high venue kind = dex_spot on an otherwise-auto-shaped request ->
/// `direction_validity` fails, no dispatch.
#[test]
fn s5_direction_invalidity_fails_high_venue_not_shortable() {
    let low_book = deep_book("binance_spot", "PEPE", dec!(1.0), dec!(50_000));
    let high_book = deep_book("uniswap_ethereum", "PEPE", dec!(1.03), dec!(50_000));

    let opp = measure_opportunity(
        "PEPE:binance_spot:uniswap_ethereum".into(),
        "PEPE".into(),
        "binance_spot".into(),
        "uniswap_ethereum".into(),
        price_record("binance_spot", "PEPE", dec!(1.0), dec!(1.0)),
        price_record("uniswap_ethereum", "PEPE", dec!(1.03), dec!(1.03)),
        low_book,
        high_book,
        dec!(1_000.0),
        dec!(2.0),
    )
    .unwrap();

    let pair = ArbitragePair {
        symbol: "PEPE".into(),
        low_venue: Venue::new("binance_spot", VenueKind::CexSpot, vec![]),
        high_venue: Venue::new("uniswap_ethereum", VenueKind::DexSpot, vec![]),
        pair_type: PairType::Auto,
        requires_transfer: true,
        transfer_network: None,
    };

    let validation = validate(
        &opp,
        &ValidatorContext {
            pair: &pair,
            spread_age_sec: 5,
            signal_age_sec: 0,
            low_withdraw_enabled: true,
            high_deposit_enabled: true,
            transfer_time_min: dec!(12.0),
            symbol_sigma_per_min_pct: dec!(0.20),
        },
        &Settings::default(),
        &DepthBaselineStore::new(),
    );

    assert!(!validation.valid());
    assert!(validation.failed_checks.contains(&"direction_validity".to_string()));
}

/// S6: live order-book fetch fails, a 30s-old cached snapshot exists inside
/// the 2x TTL grace window -> fallback returns it with `cached=true`.
#[tokio::test]
async fn s6_order_book_stale_fallback_within_grace_window() {
    let store = StateStore::new();
    let key = "orderbook:cache:dead_venue:PEPE";
    let stale = deep_book("dead_venue", "PEPE", dec!(1.0), dec!(10_000));
    store.set(key, &stale, Some(Duration::from_millis(5))).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let fallback = store
        .get_stale::<OrderBookSnapshot>(key, Duration::from_secs(60))
        .expect("within grace window");
    assert_eq!(fallback.venue_id, "dead_venue");
    assert_eq!(fallback.bids.len(), stale.bids.len());

    // Beyond 2x TTL the same lookup reports absent.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        store.get_stale::<OrderBookSnapshot>(key, Duration::from_millis(10)),
        None
    );
}
