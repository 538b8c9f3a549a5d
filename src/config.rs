//! Runtime settings.
//!
//! Every field has an environment variable and a default, read once at boot
//! and re-readable via [`Settings::reload`] so tuning can change without a
//! restart.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub min_spread_pct: f64,
    pub alert_cooldown_seconds: u64,
    pub min_exit_liquidity_usd: f64,
    pub min_position_size_usd: f64,
    pub max_position_size_usd: f64,
    pub suggested_position_usd: f64,
    pub max_slippage_pct: f64,
    pub max_latency_ms: u64,
    pub max_position_to_exit_ratio: f64,
    pub max_bid_ask_spread_pct: f64,
    pub max_spread_age_sec: u64,
    pub max_spread_age_hours: u64,
    pub min_depth_vs_history_ratio: f64,
    pub warning_depth_ratio: f64,
    pub min_liquidity_usd: f64,
    pub min_dex_liquidity_usd: f64,
    pub min_volume_24h_dex: f64,
    pub min_volume_24h_futures: f64,
    pub enable_auto_signals: bool,
    pub enable_manual_signals: bool,
    pub enable_lagging_signals: bool,
    pub enable_funding_signals: bool,
    pub enable_zscore_signals: bool,
    pub enable_stablecoin_signals: bool,
    pub lagging_min_exchanges: usize,
    pub lagging_min_deviation_pct: f64,
    pub lagging_max_other_deviation_pct: f64,
    pub price_update_interval_sec: u64,
    pub ticker_discovery_interval_hours: u64,
    pub require_shortable_high_venue: bool,

    pub orderbook_cache_ttl_sec: u64,
    pub orderbook_depth: usize,
    pub price_ttl_sec: u64,
    pub parallel_fetch_ceiling_sec: u64,
    pub worker_tick_budget_sec: u64,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::load()
    }

    /// Re-read the environment. Settings live in the state store in a full
    /// deployment; for this core, env vars are the backing store.
    pub fn reload(&mut self) {
        *self = Self::load();
    }

    fn load() -> Self {
        Self {
            min_spread_pct: env_or("MIN_SPREAD_PCT", 1.0),
            alert_cooldown_seconds: env_or("ALERT_COOLDOWN_SECONDS", 300),
            min_exit_liquidity_usd: env_or("MIN_EXIT_LIQUIDITY_USD", 5_000.0),
            min_position_size_usd: env_or("MIN_POSITION_SIZE_USD", 500.0),
            max_position_size_usd: env_or("MAX_POSITION_SIZE_USD", 50_000.0),
            suggested_position_usd: env_or("SUGGESTED_POSITION_USD", 10_000.0),
            max_slippage_pct: env_or("MAX_SLIPPAGE_PCT", 2.0),
            max_latency_ms: env_or("MAX_LATENCY_MS", 5_000),
            max_position_to_exit_ratio: env_or("MAX_POSITION_TO_EXIT_RATIO", 0.5),
            max_bid_ask_spread_pct: env_or("MAX_BID_ASK_SPREAD_PCT", 1.0),
            max_spread_age_sec: env_or("MAX_SPREAD_AGE_SEC", 60),
            max_spread_age_hours: env_or("MAX_SPREAD_AGE_HOURS", 24),
            min_depth_vs_history_ratio: env_or("MIN_DEPTH_VS_HISTORY_RATIO", 0.30),
            warning_depth_ratio: env_or("WARNING_DEPTH_RATIO", 0.50),
            min_liquidity_usd: env_or("MIN_LIQUIDITY_USD", 50_000.0),
            min_dex_liquidity_usd: env_or("MIN_DEX_LIQUIDITY_USD", 10_000.0),
            min_volume_24h_dex: env_or("MIN_VOLUME_24H_DEX", 5_000.0),
            min_volume_24h_futures: env_or("MIN_VOLUME_24H_FUTURES", 100_000.0),
            enable_auto_signals: env_bool("ENABLE_AUTO_SIGNALS", true),
            enable_manual_signals: env_bool("ENABLE_MANUAL_SIGNALS", true),
            enable_lagging_signals: env_bool("ENABLE_LAGGING_SIGNALS", true),
            enable_funding_signals: env_bool("ENABLE_FUNDING_SIGNALS", false),
            enable_zscore_signals: env_bool("ENABLE_ZSCORE_SIGNALS", false),
            enable_stablecoin_signals: env_bool("ENABLE_STABLECOIN_SIGNALS", false),
            lagging_min_exchanges: env_or("LAGGING_MIN_EXCHANGES", 4),
            lagging_min_deviation_pct: env_or("LAGGING_MIN_DEVIATION_PCT", 5.0),
            lagging_max_other_deviation_pct: env_or("LAGGING_MAX_OTHER_DEVIATION_PCT", 2.0),
            price_update_interval_sec: env_or("PRICE_UPDATE_INTERVAL_SEC", 1),
            ticker_discovery_interval_hours: env_or("TICKER_DISCOVERY_INTERVAL_HOURS", 24),
            require_shortable_high_venue: env_bool("REQUIRE_SHORTABLE_HIGH_VENUE", false),

            orderbook_cache_ttl_sec: env_or("ORDERBOOK_CACHE_TTL_SEC", 60),
            orderbook_depth: env_or("ORDERBOOK_DEPTH", 20),
            price_ttl_sec: env_or("PRICE_TTL_SEC", 60),
            parallel_fetch_ceiling_sec: env_or("PARALLEL_FETCH_CEILING_SEC", 15),
            worker_tick_budget_sec: env_or("WORKER_TICK_BUDGET_SEC", 15),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_seconds)
    }

    pub fn orderbook_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.orderbook_cache_ttl_sec)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load()
    }
}
