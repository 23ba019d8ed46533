use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use bytes::Bytes;
use common_errors::{ApiError, ApiResult};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    binding::QueryBinding,
    config::{CacheConfig, QueryOptions},
    entry::{CacheEntry, EntrySnapshot, QueryStatus},
    key::QueryKey,
};

/// Signals delivered to active observers of a key.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ObserverSignal {
    /// The entry changed underneath the observer; republish its state.
    Sync,
    /// The entry was invalidated; refetch in the background.
    Refetch,
}

pub(crate) struct ObserverSlot {
    pub id: u64,
    pub signals: flume::Sender<ObserverSignal>,
}

struct InflightFetch {
    generation: u64,
    token: CancellationToken,
    done: watch::Sender<bool>,
}

/// In-flight bookkeeping. Generations outlive individual fetches: a
/// fetch may only commit while it is still the latest issued for its
/// key, whatever order responses arrive in.
#[derive(Default)]
struct FetchControl {
    inflight: HashMap<QueryKey, InflightFetch>,
    generations: HashMap<QueryKey, u64>,
}

struct CacheShared {
    config: CacheConfig,
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    control: Mutex<FetchControl>,
    observers: Mutex<HashMap<QueryKey, Vec<ObserverSlot>>>,
    /// Keys whose last observer went away, with the release instant.
    released: Mutex<HashMap<QueryKey, Instant>>,
    next_observer_id: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateMode {
    /// Mark matching entries stale and refetch actively observed ones.
    Refetch,
    /// Mark stale only; the next observation triggers the fetch.
    MarkStaleOnly,
}

/// Process-wide keyed store for fetched data.
///
/// One instance is shared (cheap clone) by every handler. All cache
/// mutation funnels through these methods; locks are never held across
/// a suspension point.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheShared>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn encode<T: Serialize>(value: &T) -> ApiResult<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(ApiError::decode)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(bytes).map_err(ApiError::decode)
}

enum Claim {
    Attach(watch::Receiver<bool>),
    Run(u64, CancellationToken),
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheShared {
                config,
                entries: Mutex::new(HashMap::new()),
                control: Mutex::new(FetchControl::default()),
                observers: Mutex::new(HashMap::new()),
                released: Mutex::new(HashMap::new()),
                next_observer_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Snapshot of the entry at `key`, if one exists.
    pub fn read_key(&self, key: &QueryKey) -> Option<EntrySnapshot> {
        lock(&self.inner.entries).get(key).map(EntrySnapshot::from)
    }

    /// Typed read of the cached value under a binding's key.
    pub fn read_value<B: QueryBinding>(
        &self, binding: &B, args: B::Args<'_>,
    ) -> ApiResult<Option<B::Value>> {
        let key = binding.key(args);
        match self.read_key(&key).and_then(|snapshot| snapshot.data) {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Typed direct overwrite of the value under a binding's key.
    pub fn write<B: QueryBinding>(
        &self, binding: &B, args: B::Args<'_>, value: &B::Value,
    ) -> ApiResult<()> {
        let key = binding.key(args);
        self.write_key(&key, value)
    }

    /// Direct overwrite, used for optimistic updates and rollback. The
    /// value was not fetched from the network, so `updated_at` stays
    /// untouched and the staleness clock keeps running.
    pub fn write_key<T: Serialize>(
        &self, key: &QueryKey, value: &T,
    ) -> ApiResult<()> {
        let bytes = encode(value)?;
        {
            let mut entries = lock(&self.inner.entries);
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(self.inner.config.stale_after()));
            entry.data = Some(bytes);
            entry.status = QueryStatus::Success;
            entry.error = None;
        }
        debug!(key = %key, "direct cache write");
        self.notify(key, ObserverSignal::Sync);
        Ok(())
    }

    /// Drops the value at `key` without evicting the entry. Rollback
    /// target when no snapshot existed before an optimistic write.
    pub fn remove_value(&self, key: &QueryKey) {
        {
            let mut entries = lock(&self.inner.entries);
            if let Some(entry) = entries.get_mut(key) {
                entry.data = None;
                entry.status = QueryStatus::Idle;
                entry.error = None;
                entry.updated_at = None;
            }
        }
        self.notify(key, ObserverSignal::Sync);
    }

    /// Marks every entry whose key starts with `prefix` as stale and
    /// refetches the actively observed ones.
    pub fn invalidate(&self, prefix: &QueryKey) {
        self.invalidate_with_mode(prefix, InvalidateMode::Refetch);
    }

    pub fn invalidate_with_mode(
        &self, prefix: &QueryKey, mode: InvalidateMode,
    ) {
        let matching: Vec<QueryKey> = {
            let mut entries = lock(&self.inner.entries);
            entries
                .iter_mut()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, entry)| {
                    entry.invalidated = true;
                    key.clone()
                })
                .collect()
        };
        debug!(
            prefix = %prefix,
            count = matching.len(),
            ?mode,
            "invalidated cache entries"
        );
        if mode == InvalidateMode::Refetch {
            for key in &matching {
                self.notify(key, ObserverSignal::Refetch);
            }
        }
    }

    /// Aborts the pending fetch for `key`, if any. Its eventual
    /// resolution is ignored by the cache: the token is cancelled and
    /// the key's generation moves past it.
    pub fn cancel_in_flight(&self, key: &QueryKey) {
        let removed = {
            let mut control = lock(&self.inner.control);
            let removed = control.inflight.remove(key);
            if removed.is_some() {
                *control.generations.entry(key.clone()).or_insert(0) += 1;
            }
            removed
        };
        let Some(fetch) = removed else {
            return;
        };
        fetch.token.cancel();
        {
            let mut entries = lock(&self.inner.entries);
            if let Some(entry) = entries.get_mut(key) {
                if entry.status == QueryStatus::Pending {
                    entry.status = entry.settled_status();
                }
            }
        }
        debug!(key = %key, "cancelled in-flight fetch");
        self.notify(key, ObserverSignal::Sync);
        let _ = fetch.done.send(true);
    }

    /// Cache-first read of the raw bytes under `key`.
    ///
    /// A fresh entry resolves without touching the network. A pending
    /// entry attaches to the in-flight fetch instead of issuing a
    /// second one. Otherwise the fetcher runs under a fresh generation
    /// and token, and its result is committed only if it is still the
    /// latest fetch for the key and was not cancelled.
    pub async fn fetch_bytes<F, Fut>(
        &self, key: QueryKey, stale_after: Duration, fetcher: F,
    ) -> ApiResult<Bytes>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ApiResult<Bytes>>,
    {
        let (my_generation, token) = loop {
            {
                let entries = lock(&self.inner.entries);
                if let Some(entry) = entries.get(&key) {
                    if entry.is_fresh_success() {
                        if let Some(data) = &entry.data {
                            debug!(key = %key, "cache hit");
                            return Ok(data.clone());
                        }
                    }
                }
            }

            let claim = {
                let mut control = lock(&self.inner.control);
                if let Some(inflight) = control.inflight.get(&key) {
                    Claim::Attach(inflight.done.subscribe())
                }
                else {
                    let generation = control
                        .generations
                        .entry(key.clone())
                        .and_modify(|g| *g += 1)
                        .or_insert(1);
                    let generation = *generation;
                    let token = CancellationToken::new();
                    let (done, _) = watch::channel(false);
                    control.inflight.insert(key.clone(), InflightFetch {
                        generation,
                        token: token.clone(),
                        done,
                    });
                    Claim::Run(generation, token)
                }
            };

            match claim {
                Claim::Run(generation, token) => break (generation, token),
                Claim::Attach(mut done) => {
                    debug!(key = %key, "attaching to in-flight fetch");
                    let _ = done.changed().await;
                    let resolved = {
                        let entries = lock(&self.inner.entries);
                        match entries.get(&key) {
                            Some(entry) => match entry.status {
                                QueryStatus::Success
                                    if entry.data.is_some() =>
                                {
                                    entry.data.clone().map(Ok)
                                }
                                QueryStatus::Error => Some(Err(entry
                                    .error
                                    .clone()
                                    .unwrap_or(ApiError::Cancelled))),
                                // Another fetch took over; wait again.
                                QueryStatus::Pending => None,
                                _ => Some(Err(ApiError::Cancelled)),
                            },
                            None => Some(Err(ApiError::Cancelled)),
                        }
                    };
                    match resolved {
                        Some(result) => return result,
                        None => continue,
                    }
                }
            }
        };

        {
            let mut entries = lock(&self.inner.entries);
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(stale_after));
            entry.stale_after = stale_after;
            entry.status = QueryStatus::Pending;
        }
        self.notify(&key, ObserverSignal::Sync);
        debug!(key = %key, "cache miss, fetching");

        let result = fetcher(token.clone()).await;
        self.commit_fetch(&key, my_generation, &token, stale_after, result)
    }

    /// Typed cache-first read under a binding's key.
    pub async fn fetch<B, F, Fut>(
        &self, binding: &B, args: B::Args<'_>, options: &QueryOptions,
        fetcher: F,
    ) -> ApiResult<B::Value>
    where
        B: QueryBinding,
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ApiResult<B::Value>>,
    {
        let key = binding.key(args);
        let stale_after = options
            .stale_after
            .unwrap_or_else(|| self.inner.config.stale_after());
        let bytes = self
            .fetch_bytes(key, stale_after, |token| async move {
                let value = fetcher(token).await?;
                encode(&value)
            })
            .await?;
        decode(&bytes)
    }

    fn commit_fetch(
        &self, key: &QueryKey, my_generation: u64, token: &CancellationToken,
        stale_after: Duration, result: ApiResult<Bytes>,
    ) -> ApiResult<Bytes> {
        let (superseded, done) = {
            let mut control = lock(&self.inner.control);
            let latest = control.generations.get(key).copied().unwrap_or(0);
            let ours = control
                .inflight
                .get(key)
                .is_some_and(|f| f.generation == my_generation);
            let done = if ours {
                control.inflight.remove(key).map(|f| f.done)
            }
            else {
                None
            };
            (latest != my_generation, done)
        };

        let commit = !superseded && !token.is_cancelled();
        if commit {
            let mut entries = lock(&self.inner.entries);
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(stale_after));
            entry.stale_after = stale_after;
            match &result {
                Ok(bytes) => {
                    entry.data = Some(bytes.clone());
                    entry.status = QueryStatus::Success;
                    entry.error = None;
                    entry.updated_at = Some(Instant::now());
                    entry.invalidated = false;
                }
                Err(err) if err.is_cancelled() => {
                    entry.status = entry.settled_status();
                }
                Err(err) => {
                    entry.status = QueryStatus::Error;
                    entry.error = Some(err.clone());
                }
            }
        }
        else {
            debug!(key = %key, "discarding superseded fetch result");
        }

        self.notify(key, ObserverSignal::Sync);
        let unobserved = !lock(&self.inner.observers).contains_key(key);
        if unobserved {
            // Fetch-only keys start their retention clock right away.
            lock(&self.inner.released)
                .entry(key.clone())
                .or_insert_with(Instant::now);
        }
        if let Some(done) = done {
            let _ = done.send(true);
        }

        if commit { result } else { Err(ApiError::Cancelled) }
    }

    pub(crate) fn notify(&self, key: &QueryKey, signal: ObserverSignal) {
        let observers = lock(&self.inner.observers);
        if let Some(slots) = observers.get(key) {
            for slot in slots {
                let _ = slot.signals.send(signal);
            }
        }
    }

    pub(crate) fn register_observer(
        &self, key: &QueryKey, stale_after: Duration,
    ) -> (u64, flume::Receiver<ObserverSignal>) {
        let id = self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed);
        let (signals, receiver) = flume::unbounded();
        {
            let mut observers = lock(&self.inner.observers);
            observers
                .entry(key.clone())
                .or_default()
                .push(ObserverSlot { id, signals });
        }
        lock(&self.inner.released).remove(key);
        {
            // Entries come to life on first observation.
            let mut entries = lock(&self.inner.entries);
            entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(stale_after));
        }
        (id, receiver)
    }

    pub(crate) fn unregister_observer(&self, key: &QueryKey, id: u64) {
        let now_unobserved = {
            let mut observers = lock(&self.inner.observers);
            match observers.get_mut(key) {
                Some(slots) => {
                    slots.retain(|slot| slot.id != id);
                    if slots.is_empty() {
                        observers.remove(key);
                        true
                    }
                    else {
                        false
                    }
                }
                None => false,
            }
        };
        if now_unobserved {
            lock(&self.inner.released).insert(key.clone(), Instant::now());
            // The abandoned key's fetch must deliver no further state.
            self.cancel_in_flight(key);
        }
    }

    /// Evicts entries that have been unobserved past the retention
    /// window. Returns the number of evicted entries.
    pub fn run_gc_once(&self) -> usize {
        let retention = self.inner.config.retention();
        let expired: Vec<QueryKey> = {
            let released = lock(&self.inner.released);
            released
                .iter()
                .filter(|(_, at)| at.elapsed() >= retention)
                .map(|(key, _)| key.clone())
                .collect()
        };
        let mut evicted = 0;
        for key in expired {
            let observed = lock(&self.inner.observers).contains_key(&key);
            if observed {
                continue;
            }
            lock(&self.inner.released).remove(&key);
            if lock(&self.inner.entries).remove(&key).is_some() {
                evicted += 1;
            }
            lock(&self.inner.control).generations.remove(&key);
        }
        if evicted > 0 {
            debug!(evicted, "evicted unobserved cache entries");
        }
        evicted
    }

    /// Spawns the periodic retention sweep for long-lived processes.
    /// Tests call [`run_gc_once`](Self::run_gc_once) directly instead.
    pub fn start_maintenance(&self) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        let interval = self.inner.config.gc_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.run_gc_once();
            }
        })
    }

    /// Full reset for test isolation: cancels every in-flight fetch
    /// and drops every entry. Observers stay registered and see the
    /// emptied state.
    pub fn clear(&self) {
        {
            let mut control = lock(&self.inner.control);
            for (_, fetch) in control.inflight.drain() {
                fetch.token.cancel();
                let _ = fetch.done.send(true);
            }
            control.generations.clear();
        }
        lock(&self.inner.entries).clear();
        lock(&self.inner.released).clear();
        let observed: Vec<QueryKey> =
            lock(&self.inner.observers).keys().cloned().collect();
        for key in observed {
            self.notify(&key, ObserverSignal::Sync);
        }
    }
}
