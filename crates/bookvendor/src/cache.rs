//! Memoization of vendor fetches with an explicit caching policy.
//!
//! The cache persists *outcomes*, not failures. A vendor that confirms "no
//! such item" produced an answer worth keeping; a vendor that throttled,
//! timed out or answered garbage did not, and the next access must pay for a
//! fresh fetch. Keeping that distinction out of the fetch functions and
//! inside [`Memoized`] makes it a testable policy instead of a side effect.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use log::{trace, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::Error;

/// Cache lifetime tier for the primary vendor namespace.
pub const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Cache lifetime tier for the secondary vendor namespace.
pub const HALF_DAY: Duration = Duration::from_secs(12 * 60 * 60);

/// A vendor outcome the cache is allowed to persist.
///
/// Transient failures stay `Err` on the fetch path and never reach the
/// store. `Missing` records a vendor that affirmatively reported no such
/// item - caching it avoids hammering the vendor with identifiers it will
/// keep rejecting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Lookup<V> {
    /// The vendor returned a usable record.
    Found(V),
    /// The vendor reported that no such item exists.
    Missing,
}

impl<V> Lookup<V> {
    /// Returns the contained value of a `Found` outcome.
    pub fn found(self) -> Option<V> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Missing => None,
        }
    }
}

/// Key-value store holding serialized cache payloads.
///
/// The store owns expiry: [`Store::get`] must not return a payload past its
/// lifetime. Implementations are injected into the service at construction,
/// there are no process-wide singletons.
pub trait Store: Send + Sync {
    /// Returns the unexpired payload stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `payload` under `key` for `ttl`, replacing any existing value.
    fn set(&self, key: &str, payload: String, ttl: Duration);
}

struct StoreEntry {
    payload: String,
    expires_at: Instant,
}

/// In-process [`Store`] with per-entry expiry.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoreEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        // Expired entries are dropped on access rather than swept.
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, payload: String, ttl: Duration) {
        let entry = StoreEntry {
            payload,
            expires_at: Instant::now() + ttl,
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), entry);
    }
}

/// A fetch function memoized under a namespace, with a TTL and a pluggable
/// "is this outcome worth keeping" predicate.
pub struct Memoized<V> {
    namespace: &'static str,
    ttl: Duration,
    store: Arc<dyn Store>,
    cacheable: fn(&Lookup<V>) -> bool,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<V> Memoized<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Creates a memoizer that keeps every successful outcome for `ttl`.
    #[must_use]
    pub fn new(namespace: &'static str, ttl: Duration, store: Arc<dyn Store>) -> Self {
        Self {
            namespace,
            ttl,
            store,
            cacheable: |_| true,
            in_flight: Mutex::default(),
        }
    }

    /// Replaces the keep-everything policy with `predicate`.
    #[must_use]
    pub fn cacheable_when(mut self, predicate: fn(&Lookup<V>) -> bool) -> Self {
        self.cacheable = predicate;
        self
    }

    /// Returns the cached outcome for `args`, or invokes `fetch` to produce
    /// one.
    ///
    /// Outcomes passing the cacheable predicate are stored for the TTL; a
    /// fetch error stores nothing, so the next access with the same `args`
    /// fetches again. There is no backoff: repeated calls during a vendor
    /// outage each pay the fetch cost again.
    ///
    /// # Errors
    ///
    /// Propagates the error of `fetch` untouched.
    pub fn get_or_fetch<F>(&self, args: &str, fetch: F) -> Result<Lookup<V>, Error>
    where
        F: FnOnce() -> Result<Lookup<V>, Error>,
    {
        let key = self.key(args);

        if let Some(outcome) = self.lookup(&key) {
            return Ok(outcome);
        }

        // Serialize concurrent fetches for the same key so a popular
        // identifier does not stampede the vendor.
        let lock = self.in_flight_lock(&key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Whoever held the lock before us may have stored the value already.
        if let Some(outcome) = self.lookup(&key) {
            return Ok(outcome);
        }

        trace!("cache miss for {key}");
        let outcome = fetch()?;

        if (self.cacheable)(&outcome) {
            match serde_json::to_string(&outcome) {
                Ok(payload) => self.store.set(&key, payload, self.ttl),
                Err(err) => warn!("could not serialize the cache payload for {key}: {err}"),
            }
        }

        Ok(outcome)
    }

    fn key(&self, args: &str) -> String {
        format!("{}({args})", self.namespace)
    }

    fn lookup(&self, key: &str) -> Option<Lookup<V>> {
        let payload = self.store.get(key)?;
        match serde_json::from_str(&payload) {
            Ok(outcome) => {
                trace!("cache hit for {key}");
                Some(outcome)
            }
            Err(err) => {
                // A payload written by an older schema; treat as a miss.
                warn!("discarding an undecodable cache payload for {key}: {err}");
                None
            }
        }
    }

    fn in_flight_lock(&self, key: &str) -> Arc<Mutex<()>> {
        // The lock table grows with distinct keys, exactly as the store does.
        let mut locks = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_owned()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::ErrorKind;

    fn memoized(ttl: Duration) -> Memoized<String> {
        Memoized::new("test.fetch", ttl, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn consecutive_calls_fetch_exactly_once() {
        let memo = memoized(WEEK);
        let calls = Cell::new(0);

        for _ in 0..3 {
            let outcome = memo
                .get_or_fetch("key", || {
                    calls.set(calls.get() + 1);
                    Ok(Lookup::Found("value".to_owned()))
                })
                .unwrap();
            assert_eq!(Lookup::Found("value".to_owned()), outcome);
        }

        assert_eq!(1, calls.get());
    }

    #[test]
    fn distinct_args_do_not_share_entries() {
        let memo = memoized(WEEK);

        memo.get_or_fetch("a", || Ok(Lookup::Found("one".to_owned())))
            .unwrap();
        let outcome = memo
            .get_or_fetch("b", || Ok(Lookup::Found("two".to_owned())))
            .unwrap();

        assert_eq!(Lookup::Found("two".to_owned()), outcome);
    }

    #[test]
    fn fetch_errors_are_not_cached_and_retry() {
        let memo = memoized(WEEK);
        let calls = Cell::new(0);

        let err = memo
            .get_or_fetch("key", || {
                calls.set(calls.get() + 1);
                Err::<Lookup<String>, _>(Error::new(ErrorKind::Throttled, "503"))
            })
            .unwrap_err();
        assert_eq!(ErrorKind::Throttled, err.kind());

        // The failure must not have produced a stale negative entry.
        let outcome = memo
            .get_or_fetch("key", || {
                calls.set(calls.get() + 1);
                Ok(Lookup::Found("value".to_owned()))
            })
            .unwrap();

        assert_eq!(Lookup::Found("value".to_owned()), outcome);
        assert_eq!(2, calls.get());
    }

    #[test]
    fn vendor_confirmed_missing_is_cached() {
        let memo = memoized(WEEK);
        let calls = Cell::new(0);

        for _ in 0..2 {
            let outcome = memo
                .get_or_fetch("key", || {
                    calls.set(calls.get() + 1);
                    Ok(Lookup::<String>::Missing)
                })
                .unwrap();
            assert_eq!(Lookup::Missing, outcome);
        }

        assert_eq!(1, calls.get());
    }

    #[test]
    fn predicate_can_exclude_outcomes_from_the_store() {
        let memo = memoized(WEEK).cacheable_when(|outcome| *outcome != Lookup::Missing);
        let calls = Cell::new(0);

        for _ in 0..2 {
            memo.get_or_fetch("key", || {
                calls.set(calls.get() + 1);
                Ok(Lookup::<String>::Missing)
            })
            .unwrap();
        }

        assert_eq!(2, calls.get());
    }

    #[test]
    fn expired_entries_are_fetched_again() {
        let memo = memoized(Duration::from_millis(10));
        let calls = Cell::new(0);

        let mut fetch = || {
            memo.get_or_fetch("key", || {
                calls.set(calls.get() + 1);
                Ok(Lookup::Found("value".to_owned()))
            })
            .unwrap()
        };

        fetch();
        std::thread::sleep(Duration::from_millis(25));
        fetch();

        assert_eq!(2, calls.get());
    }

    #[test]
    fn store_expiry_is_lazy_but_observed() {
        let store = MemoryStore::new();
        store.set("key", "payload".to_owned(), Duration::from_millis(10));

        assert_eq!(Some("payload".to_owned()), store.get("key"));
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(None, store.get("key"));
    }

    #[test]
    fn undecodable_payloads_are_treated_as_misses() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let memo: Memoized<String> = Memoized::new("test.fetch", WEEK, Arc::clone(&store));

        store.set("test.fetch(key)", "not json".to_owned(), WEEK);

        let outcome = memo
            .get_or_fetch("key", || Ok(Lookup::Found("fresh".to_owned())))
            .unwrap();

        assert_eq!(Lookup::Found("fresh".to_owned()), outcome);
    }

    #[test]
    fn concurrent_calls_for_one_key_fetch_once() {
        let memo = Arc::new(memoized(WEEK));
        let calls = AtomicU32::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let outcome = memo
                        .get_or_fetch("key", || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // Hold the in-flight lock long enough for the
                            // other threads to pile up behind it.
                            std::thread::sleep(Duration::from_millis(25));
                            Ok(Lookup::Found("value".to_owned()))
                        })
                        .unwrap();
                    assert_eq!(Lookup::Found("value".to_owned()), outcome);
                });
            }
        });

        assert_eq!(1, calls.load(Ordering::SeqCst));
    }
}
