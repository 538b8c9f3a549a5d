//! Depth Baseline: a rolling ring buffer of recent
//! depth-within-slippage USD values per (pair, venue, side), used by the
//! `depth_vs_history` safety check to compare current depth against recent
//! history.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use rust_decimal::Decimal;

/// Window length in samples. At a 1 Hz sampling cadence this is ~60 minutes.
const MAX_SAMPLES: usize = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bids,
    Asks,
}

#[derive(Default)]
struct Ring {
    samples: VecDeque<Decimal>,
}

impl Ring {
    fn push(&mut self, value: Decimal) {
        self.samples.push_back(value);
        while self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }
    }

    fn mean(&self) -> Option<Decimal> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: Decimal = self.samples.iter().sum();
        Some(sum / Decimal::from(self.samples.len() as u64))
    }
}

/// Shared store of depth-history ring buffers, keyed by (pair_id, venue_id, side).
#[derive(Default)]
pub struct DepthBaselineStore {
    rings: Mutex<HashMap<(String, String, u8), Ring>>,
}

fn side_tag(side: Side) -> u8 {
    match side {
        Side::Bids => 0,
        Side::Asks => 1,
    }
}

impl DepthBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, pair_id: &str, venue_id: &str, side: Side, depth_usd: Decimal) {
        let mut rings = self.rings.lock();
        rings
            .entry((pair_id.to_string(), venue_id.to_string(), side_tag(side)))
            .or_default()
            .push(depth_usd);
    }

    /// Ratio of `current_depth` to the historical mean for this key. `None`
    /// when there is no history yet; the `depth_vs_history` check bypasses
    /// on empty history.
    pub fn ratio(&self, pair_id: &str, venue_id: &str, side: Side, current_depth: Decimal) -> Option<Decimal> {
        let rings = self.rings.lock();
        let ring = rings.get(&(pair_id.to_string(), venue_id.to_string(), side_tag(side)))?;
        let mean = ring.mean()?;
        if mean == Decimal::ZERO {
            return None;
        }
        Some(current_depth / mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_history_has_no_ratio() {
        let store = DepthBaselineStore::new();
        assert_eq!(store.ratio("BTC:a:b", "a", Side::Bids, dec!(1000)), None);
    }

    #[test]
    fn ratio_reflects_mean_of_history() {
        let store = DepthBaselineStore::new();
        for v in [dec!(1000), dec!(2000), dec!(3000)] {
            store.record("BTC:a:b", "a", Side::Bids, v);
        }
        let ratio = store.ratio("BTC:a:b", "a", Side::Bids, dec!(2000)).unwrap();
        assert_eq!(ratio, Decimal::ONE); // mean is 2000, current 2000 -> ratio 1.0
    }
}
