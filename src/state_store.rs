//! Shared keyed state store.
//!
//! Every component reads/writes through here; every key is independently
//! lockable. Backed by `dashmap` for lock-free concurrent access. A
//! Redis-backed implementation could replace this behind the same trait
//! without touching callers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::StateStoreError;

#[derive(Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(t) => Instant::now() < t,
            None => true,
        }
    }
}

/// In-process stand-in for the Redis-semantics KV store.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<DashMap<String, Entry>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    pub fn set<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StateStoreError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StateStoreError(format!("encode: {e}")))?;
        self.inner.insert(
            key.into(),
            Entry {
                value: bytes,
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.inner.get(key)?;
        if !entry.is_live() {
            drop(entry);
            self.inner.remove(key);
            return None;
        }
        serde_json::from_slice(&entry.value).ok()
    }

    /// Fetch a value even if past its primary TTL, up to `grace` beyond
    /// expiry. Used by the order-book fetcher's stale fallback.
    pub fn get_stale<T: DeserializeOwned>(&self, key: &str, grace: Duration) -> Option<T> {
        let entry = self.inner.get(key)?;
        if let Some(expires_at) = entry.expires_at {
            if Instant::now() > expires_at + grace {
                return None;
            }
        }
        serde_json::from_slice(&entry.value).ok()
    }

    pub fn exists(&self, key: &str) -> bool {
        match self.inner.get(key) {
            Some(e) if e.is_live() => true,
            Some(_) => {
                self.inner.remove(key);
                false
            }
            None => false,
        }
    }

    pub fn delete(&self, key: &str) {
        self.inner.remove(key);
    }

    /// Atomically set `key` only if absent (or expired), returning whether
    /// this call was the one that set it. This is the primitive the Alert
    /// Gate uses for at-most-once dispatch.
    pub fn create_if_absent<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<bool, StateStoreError> {
        let key = key.into();
        let bytes =
            serde_json::to_vec(value).map_err(|e| StateStoreError(format!("encode: {e}")))?;
        let new_entry = Entry {
            value: bytes,
            expires_at: ttl.map(|d| Instant::now() + d),
        };

        let mut created = false;
        self.inner
            .entry(key)
            .and_modify(|existing| {
                if !existing.is_live() {
                    *existing = new_entry.clone();
                    created = true;
                }
            })
            .or_insert_with(|| {
                created = true;
                new_entry
            });
        Ok(created)
    }

    pub fn add_to_set(&self, key: impl Into<String>, member: String) -> Result<(), StateStoreError> {
        let key = key.into();
        let mut set: std::collections::HashSet<String> = self.get(&key).unwrap_or_default();
        set.insert(member);
        self.set(key, &set, None)
    }

    pub fn set_contains(&self, key: &str, member: &str) -> bool {
        self.get::<std::collections::HashSet<String>>(key)
            .map(|s| s.contains(member))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_if_absent_is_at_most_once() {
        let store = StateStore::new();
        let first = store
            .create_if_absent("alert:cooldown:BTC", &true, Some(Duration::from_secs(60)))
            .unwrap();
        let second = store
            .create_if_absent("alert:cooldown:BTC", &true, Some(Duration::from_secs(60)))
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[test]
    fn expired_entries_are_treated_as_absent() {
        let store = StateStore::new();
        store
            .set("prices:latest", &42u32, Some(Duration::from_millis(1)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.get::<u32>("prices:latest"), None);
    }

    #[test]
    fn stale_fallback_respects_grace_window() {
        let store = StateStore::new();
        store
            .set("orderbook:cache:x:Y", &7u32, Some(Duration::from_millis(10)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(
            store.get_stale::<u32>("orderbook:cache:x:Y", Duration::from_secs(1)),
            Some(7)
        );
    }

    #[test]
    fn set_membership_round_trips() {
        let store = StateStore::new();
        store
            .add_to_set("blacklist:symbols", "SCAM".to_string())
            .unwrap();
        assert!(store.set_contains("blacklist:symbols", "SCAM"));
        assert!(!store.set_contains("blacklist:symbols", "BTC"));
    }
}
