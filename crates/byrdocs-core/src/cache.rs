//! Single-value cache with a time-to-live.
//!
//! The value, the time it was fetched, and the TTL live together in one
//! [`TtlCache`]; freshness is judged against an injected [`Clock`].

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::clock::Clock;

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    fetched_at: DateTime<Utc>,
}

pub struct TtlCache<T> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<Entry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn slot(&self) -> MutexGuard<'_, Option<Entry<T>>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The cached value if it is still fresh.
    pub fn get(&self) -> Option<T> {
        let now = self.clock.now();
        self.slot()
            .as_ref()
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// When the current value was fetched, fresh or not.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.slot().as_ref().map(|entry| entry.fetched_at)
    }

    pub fn insert(&self, value: T) {
        *self.slot() = Some(Entry {
            value,
            fetched_at: self.clock.now(),
        });
    }

    /// Drop the value so the next read refetches.
    pub fn invalidate(&self) {
        *self.slot() = None;
    }

    /// Return the fresh value, or fetch, store, and return a new one.
    ///
    /// A failed fetch leaves the previous entry in place.
    pub fn get_or_try_insert_with<E, F>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }
        debug!("Cache stale or empty, refetching");
        let value = fetch()?;
        self.insert(value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn cache(clock: &Arc<FixedClock>) -> TtlCache<u32> {
        TtlCache::new(Duration::seconds(300), clock.clone())
    }

    #[test]
    fn test_value_expires_after_ttl() {
        let clock = Arc::new(FixedClock::at_date(2024, 1, 1));
        let cache = cache(&clock);
        cache.insert(7);

        clock.advance(Duration::seconds(299));
        assert_eq!(cache.get(), Some(7));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get(), None);
        assert!(cache.fetched_at().is_some());
    }

    #[test]
    fn test_fetch_only_when_stale() {
        let clock = Arc::new(FixedClock::at_date(2024, 1, 1));
        let cache = cache(&clock);
        let mut calls = 0;

        for _ in 0..3 {
            let v: Result<u32, ()> = cache.get_or_try_insert_with(|| {
                calls += 1;
                Ok(calls)
            });
            assert_eq!(v, Ok(1));
        }
        assert_eq!(calls, 1);

        cache.invalidate();
        let v: Result<u32, ()> = cache.get_or_try_insert_with(|| Ok(42));
        assert_eq!(v, Ok(42));
    }

    #[test]
    fn test_failed_fetch_keeps_old_entry() {
        let clock = Arc::new(FixedClock::at_date(2024, 1, 1));
        let cache = cache(&clock);
        cache.insert(1);
        clock.advance(Duration::seconds(600));

        let v: Result<u32, &str> = cache.get_or_try_insert_with(|| Err("offline"));
        assert_eq!(v, Err("offline"));
        assert!(cache.fetched_at().is_some());
    }
}
