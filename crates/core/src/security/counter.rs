//! Keyed counters with expiry, used for rate limiting.

use moka::Expiry;
use moka::ops::compute::Op;
use moka::sync::Cache;
use std::time::{Duration, Instant};

/// Default maximum number of tracked keys.
const DEFAULT_MAX_KEYS: u64 = 100_000;

/// Shared keyed counter store.
///
/// `increment` must be atomic per key. A key without an expiry lives until
/// deleted; once its expiry passes it reads as zero.
pub trait CounterStore: Send + Sync {
    /// Adds one to `key` and returns the new count.
    fn increment(&self, key: &str) -> u64;

    /// Returns the current count, zero when absent or expired.
    fn get(&self, key: &str) -> u64;

    /// Expires `key` after `ttl`. No-op for absent keys.
    fn expire(&self, key: &str, ttl: Duration);

    /// Removes `key`.
    fn delete(&self, key: &str);
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(now))
    }
}

/// Expiry driven by the deadline stored in each counter.
struct CounterExpiry;

impl Expiry<String, Counter> for CounterExpiry {
    fn expire_after_create(&self, _key: &String, value: &Counter, created_at: Instant) -> Option<Duration> {
        value.remaining(created_at)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Counter,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.remaining(updated_at)
    }
}

/// In-process [`CounterStore`] backed by Moka.
#[derive(Clone)]
pub struct MokaCounterStore {
    cache: Cache<String, Counter>,
}

impl Default for MokaCounterStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEYS)
    }
}

impl MokaCounterStore {
    /// Creates a store tracking at most `max_keys` keys.
    #[must_use]
    pub fn new(max_keys: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_keys)
            .expire_after(CounterExpiry)
            .build();

        Self { cache }
    }
}

impl CounterStore for MokaCounterStore {
    fn increment(&self, key: &str) -> u64 {
        self.cache
            .entry(key.to_string())
            .and_upsert_with(|existing| {
                let current = existing.map(|entry| *entry.value());
                Counter {
                    count: current.map_or(0, |c| c.count).saturating_add(1),
                    expires_at: current.and_then(|c| c.expires_at),
                }
            })
            .into_value()
            .count
    }

    fn get(&self, key: &str) -> u64 {
        self.cache.get(key).map_or(0, |counter| counter.count)
    }

    fn expire(&self, key: &str, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        let _ = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|existing| match existing {
                Some(entry) => Op::Put(Counter {
                    expires_at: Some(expires_at),
                    ..*entry.value()
                }),
                None => Op::Nop,
            });
    }

    fn delete(&self, key: &str) {
        self.cache.invalidate(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_counts_per_key() {
        let store = MokaCounterStore::default();

        assert_eq!(store.get("a"), 0);
        assert_eq!(store.increment("a"), 1);
        assert_eq!(store.increment("a"), 2);
        assert_eq!(store.increment("b"), 1);
        assert_eq!(store.get("a"), 2);

        store.delete("a");
        assert_eq!(store.get("a"), 0);
        assert_eq!(store.get("b"), 1);
    }

    #[test]
    fn test_expire_resets_to_zero() {
        let store = MokaCounterStore::default();

        store.increment("k");
        store.expire("k", Duration::from_millis(50));
        assert_eq!(store.get("k"), 1);

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(store.get("k"), 0);
        assert_eq!(store.increment("k"), 1);
    }

    #[test]
    fn test_increment_keeps_the_window() {
        let store = MokaCounterStore::default();

        store.increment("k");
        store.expire("k", Duration::from_millis(80));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(store.increment("k"), 2);

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(store.get("k"), 0);
    }

    #[test]
    fn test_expire_on_missing_key_is_noop() {
        let store = MokaCounterStore::default();
        store.expire("missing", Duration::from_secs(1));
        assert_eq!(store.get("missing"), 0);
    }

    #[test]
    fn test_concurrent_increments_are_atomic() {
        let store = std::sync::Arc::new(MokaCounterStore::default());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.increment("shared");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("shared"), 800);
    }
}
