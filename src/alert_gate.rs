//! Alert Gate: blacklist, cooldown, dedup, and dispatch policy
//! sitting between a validated [`Signal`] and the notification transport.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::PolicyRejectReason;
use crate::notifier::{truncate_for_transport, NotificationTransport, SendOutcome};
use crate::signal_builder::{Signal, SignalStatus};
use crate::state_store::StateStore;

/// Retry backoff schedule for a failed dispatch attempt.
const RETRY_BACKOFF_SECS: [u64; 3] = [1, 2, 5];

fn cooldown_key(pair_id: &str) -> String {
    format!("alert:cooldown:{pair_id}")
}

fn dedup_key(pair_id: &str) -> String {
    format!("alert:inflight:{pair_id}")
}

#[derive(Debug, Clone)]
pub enum GateOutcome {
    Dispatched { message_id: Option<String> },
    Rejected(PolicyRejectReason),
    DispatchFailed,
}

pub struct AlertGate {
    store: StateStore,
    settings: Arc<Settings>,
    transport: Arc<dyn NotificationTransport>,
}

impl AlertGate {
    pub fn new(store: StateStore, settings: Arc<Settings>, transport: Arc<dyn NotificationTransport>) -> Self {
        Self {
            store,
            settings,
            transport,
        }
    }

    /// Blacklist -> cooldown -> dedup -> dispatch, first failing step
    /// suppresses with a reason.
    pub async fn process(&self, mut signal: Signal, alert_text: &str) -> (Signal, GateOutcome) {
        if self.store.set_contains("blacklist:symbols", &signal.symbol) {
            signal.status = SignalStatus::BlockedBlacklist;
            return (signal, GateOutcome::Rejected(PolicyRejectReason::Blacklisted));
        }

        if self.store.exists(&cooldown_key(&signal.pair_id)) {
            signal.status = SignalStatus::BlockedCooldown;
            return (signal, GateOutcome::Rejected(PolicyRejectReason::Cooldown));
        }

        // create_if_absent doubles as the dedup guard: only the worker that
        // wins this race proceeds to dispatch.
        let inflight_ttl = Duration::from_secs(30);
        let won_dedup = self
            .store
            .create_if_absent(dedup_key(&signal.pair_id), &true, Some(inflight_ttl))
            .unwrap_or(false);
        if !won_dedup {
            signal.status = SignalStatus::BlockedCooldown;
            return (signal, GateOutcome::Rejected(PolicyRejectReason::Duplicate));
        }

        let truncated = truncate_for_transport(alert_text);
        let outcome = self.dispatch_with_retry(&truncated).await;

        match outcome {
            Some(message_id) => {
                let _ = self.store.create_if_absent(cooldown_key(&signal.pair_id), &Utc::now(), Some(self.settings.cooldown()));
                signal.status = SignalStatus::Dispatched;
                (signal, GateOutcome::Dispatched { message_id })
            }
            None => {
                // No cooldown is set on failure, so the next tick may retry;
                // the dedup key must go with it or it'd block that retry
                // for the rest of its inflight TTL.
                self.store.delete(&dedup_key(&signal.pair_id));
                signal.status = SignalStatus::DispatchFailed;
                (signal, GateOutcome::DispatchFailed)
            }
        }
    }

    /// Retry a failed send with the documented backoff; a rate-limit
    /// response throttles the whole gate for the advertised duration.
    async fn dispatch_with_retry(&self, text: &str) -> Option<Option<String>> {
        for (attempt, backoff_secs) in std::iter::once(0).chain(RETRY_BACKOFF_SECS).enumerate() {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            }

            match self.transport.send_alert(text).await {
                SendOutcome::Sent(result) if result.ok => return Some(result.message_id),
                SendOutcome::Sent(_) => {
                    warn!(attempt, "transport reported not-ok, retrying");
                }
                SendOutcome::RateLimited { retry_after } => {
                    warn!(?retry_after, "transport rate limited, throttling gate");
                    tokio::time::sleep(retry_after).await;
                }
                SendOutcome::Failed(e) => {
                    warn!(attempt, error = %e, "transport send failed");
                }
            }
        }
        None
    }

    pub fn blacklist(&self, symbol: &str) {
        let _ = self.store.add_to_set("blacklist:symbols", symbol.to_string());
        info!(symbol, "symbol blacklisted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_builder::{ExternalLinks, FeesBreakdown, SignalType};
    use crate::validator::ValidationResult;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_signal(pair_id: &str) -> Signal {
        Signal {
            strategy_id: "DF-BTC-S5.18-0000100".into(),
            signal_type: SignalType::Auto,
            strategy_type: None,
            symbol: "BTC".into(),
            pair_id: pair_id.into(),
            low_venue_id: "dex_ethereum".into(),
            high_venue_id: "binance_futures".into(),
            nominal_spread_pct: dec!(5.18),
            real_spread_pct: dec!(5.0),
            fees: FeesBreakdown {
                entry_pct: dec!(0.36),
                exit_pct: dec!(0.36),
                total_pct: dec!(0.72),
            },
            net_spread_pct: dec!(4.28),
            action_lines: vec![],
            links: ExternalLinks {
                buy_url: "".into(),
                sell_url: "".into(),
                chart_url: "".into(),
            },
            validation: ValidationResult::default(),
            status: SignalStatus::Valid,
            created_at: Utc::now(),
        }
    }

    struct AlwaysOkTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NotificationTransport for AlwaysOkTransport {
        async fn send_alert(&self, _text: &str) -> SendOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SendOutcome::Sent(crate::notifier::SendResult { ok: true, message_id: Some("m1".into()) })
        }
    }

    #[tokio::test]
    async fn second_dispatch_within_cooldown_is_blocked() {
        let store = StateStore::new();
        let settings = Arc::new(Settings::default());
        let transport = Arc::new(AlwaysOkTransport { calls: AtomicUsize::new(0) });
        let gate = AlertGate::new(store, settings, transport.clone());

        let (_, first) = gate.process(sample_signal("BTC:low:high"), "alert text").await;
        assert!(matches!(first, GateOutcome::Dispatched { .. }));

        let (_, second) = gate.process(sample_signal("BTC:low:high"), "alert text").await;
        assert!(matches!(second, GateOutcome::Rejected(PolicyRejectReason::Cooldown)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    struct AlwaysFailTransport;

    #[async_trait]
    impl NotificationTransport for AlwaysFailTransport {
        async fn send_alert(&self, _text: &str) -> SendOutcome {
            SendOutcome::Failed(crate::error::TransportError("transport down".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_failure_clears_dedup_so_the_next_tick_can_retry() {
        let store = StateStore::new();
        let settings = Arc::new(Settings::default());
        let transport = Arc::new(AlwaysFailTransport);
        let gate = AlertGate::new(store, settings, transport);

        let (_, first) = gate.process(sample_signal("BTC:low:high"), "alert text").await;
        assert!(matches!(first, GateOutcome::DispatchFailed));

        let (_, second) = gate.process(sample_signal("BTC:low:high"), "alert text").await;
        assert!(matches!(second, GateOutcome::DispatchFailed));
    }

    #[tokio::test]
    async fn blacklisted_symbol_never_reaches_transport() {
        let store = StateStore::new();
        let settings = Arc::new(Settings::default());
        let transport = Arc::new(AlwaysOkTransport { calls: AtomicUsize::new(0) });
        let gate = AlertGate::new(store, settings, transport.clone());
        gate.blacklist("BTC");

        let (_, outcome) = gate.process(sample_signal("BTC:low:high"), "alert text").await;
        assert!(matches!(outcome, GateOutcome::Rejected(PolicyRejectReason::Blacklisted)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
