use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crosspoint_core::{ClockSource, QueryDescriptor, QueryKey};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::entry::{CacheEntry, QueryStatus};
use super::fetcher::SharedFetcher;
use super::QueryOptions;
use crate::error::{ApiError, ErrorInfo};

/// Shared, thread-safe request cache for values of type `T`.
///
/// Cloning is cheap and yields a handle to the same cache. Methods that may
/// start a fetch spawn it on the current Tokio runtime.
pub struct RequestCache<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    slots: DashMap<QueryKey, Arc<Slot<T>>>,
    /// Live [`Subscription`] count per key. Keys with no subscribers are absent.
    subscribers: DashMap<QueryKey, usize>,
    clock: Arc<dyn ClockSource>,
    defaults: QueryOptions,
    next_generation: AtomicU64,
    next_version: AtomicU64,
    changes: watch::Sender<u64>,
}

struct Slot<T> {
    key: QueryKey,
    descriptor: QueryDescriptor,
    state: Mutex<SlotState<T>>,
}

struct SlotState<T> {
    status: QueryStatus,
    value: Option<T>,
    error: Option<ErrorInfo>,
    fetched_at: Option<u64>,
    /// Last time a fetch settled, successfully or not. Drives staleness.
    settled_at: Option<u64>,
    invalidated: bool,
    /// Generation of the fetch in flight.
    in_flight: Option<u64>,
    fetcher: Option<SharedFetcher<T>>,
    options: QueryOptions,
    last_access: u64,
    version: u64,
}

struct Started<T> {
    generation: u64,
    fetcher: SharedFetcher<T>,
    version: u64,
}

impl<T> SlotState<T> {
    fn new(options: QueryOptions, now: u64) -> Self {
        Self {
            status: QueryStatus::Idle,
            value: None,
            error: None,
            fetched_at: None,
            settled_at: None,
            invalidated: false,
            in_flight: None,
            fetcher: None,
            options,
            last_access: now,
            version: 0,
        }
    }

    fn is_stale(&self, now: u64) -> bool {
        if self.invalidated {
            return true;
        }
        self.settled_at
            .map_or(true, |at| now.saturating_sub(at) > self.options.stale_ms)
    }
}

impl<T: Clone> SlotState<T> {
    fn snapshot(&self, key: &QueryKey, now: u64) -> CacheEntry<T> {
        CacheEntry {
            key: key.clone(),
            status: self.status,
            value: self.value.clone(),
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            is_fetching: self.in_flight.is_some(),
            is_stale: self.is_stale(now),
        }
    }
}

impl<T> Inner<T> {
    fn now(&self) -> u64 {
        self.clock.now()
    }

    fn slot(&self, key: &QueryKey) -> Option<Arc<Slot<T>>> {
        self.slots.get(key).map(|s| Arc::clone(s.value()))
    }

    fn slot_or_insert(&self, descriptor: &QueryDescriptor, options: QueryOptions, now: u64) -> Arc<Slot<T>> {
        let key = descriptor.key();
        Arc::clone(&self.slots.entry(key.clone()).or_insert_with(|| {
            Arc::new(Slot {
                key,
                descriptor: descriptor.clone(),
                state: Mutex::new(SlotState::new(options, now)),
            })
        }))
    }

    fn bump(&self, state: &mut SlotState<T>) -> u64 {
        let version = self.next_version.fetch_add(1, Ordering::Relaxed) + 1;
        state.version = version;
        version
    }

    fn notify(&self, version: u64) {
        self.changes.send_replace(version);
    }

    fn version_of(&self, key: &QueryKey) -> Option<u64> {
        self.slot(key).map(|s| s.state.lock().version)
    }

    /// Marks the slot's fetch as abandoned so waiters wake and late results are dropped.
    fn retire(&self, slot: &Slot<T>) {
        let mut state = slot.state.lock();
        state.in_flight = None;
        let version = self.bump(&mut state);
        drop(state);
        self.notify(version);
    }

    fn begin(&self, state: &mut SlotState<T>) -> Option<Started<T>> {
        let fetcher = state.fetcher.clone()?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        state.in_flight = Some(generation);
        if state.fetched_at.is_none() {
            state.status = QueryStatus::Loading;
            state.error = None;
        }
        let version = self.bump(state);
        Some(Started {
            generation,
            fetcher,
            version,
        })
    }

    fn release_subscriber(&self, key: &QueryKey) {
        if let Some(mut count) = self.subscribers.get_mut(key) {
            *count = count.saturating_sub(1);
        }
        self.subscribers.remove_if(key, |_, count| *count == 0);
        if let Some(slot) = self.slot(key) {
            slot.state.lock().last_access = self.now();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Inner<T> {
    fn spawn_fetch(self: &Arc<Self>, slot: Arc<Slot<T>>, started: Started<T>) {
        debug!(key = %slot.key, generation = started.generation, "spawning fetch");
        self.notify(started.version);
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = started.fetcher.fetch().await;
            inner.complete(&slot, started.generation, result);
        });
    }

    fn complete(&self, slot: &Arc<Slot<T>>, generation: u64, result: Result<T, ApiError>) {
        let current = self
            .slot(&slot.key)
            .is_some_and(|s| Arc::ptr_eq(&s, slot));
        let mut state = slot.state.lock();
        if !current || state.in_flight != Some(generation) {
            debug!(key = %slot.key, generation, "discarding superseded fetch result");
            return;
        }
        let now = self.now();
        state.in_flight = None;
        state.settled_at = Some(now);
        state.invalidated = false;
        match result {
            Ok(value) => {
                state.status = QueryStatus::Success;
                state.value = Some(value);
                state.error = None;
                state.fetched_at = Some(now);
            }
            Err(err) => {
                warn!(key = %slot.key, error = %err, "query fetch failed");
                state.status = QueryStatus::Error;
                state.error = Some(ErrorInfo::from(&err));
            }
        }
        let version = self.bump(&mut state);
        drop(state);
        self.notify(version);
    }
}

impl<T> Clone for RequestCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for RequestCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCache")
            .field("entries", &self.inner.slots.len())
            .field("subscribed", &self.inner.subscribers.len())
            .field("defaults", &self.inner.defaults)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> RequestCache<T> {
    /// Creates an empty cache with default query options.
    #[must_use]
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        Self::with_defaults(clock, QueryOptions::default())
    }

    /// Creates an empty cache. `defaults` applies to slots created by
    /// [`subscribe`](Self::subscribe) or [`set_value`](Self::set_value).
    #[must_use]
    pub fn with_defaults(clock: Arc<dyn ClockSource>, defaults: QueryOptions) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                slots: DashMap::new(),
                subscribers: DashMap::new(),
                clock,
                defaults,
                next_generation: AtomicU64::new(0),
                next_version: AtomicU64::new(0),
                changes,
            }),
        }
    }

    #[must_use]
    pub fn default_options(&self) -> QueryOptions {
        self.inner.defaults
    }

    /// Returns the current snapshot for `descriptor`, starting a fetch when
    /// the entry is missing or stale and none is in flight.
    ///
    /// `fetcher` and `options` are remembered for [`refetch`](Self::refetch).
    pub fn get(
        &self,
        descriptor: &QueryDescriptor,
        fetcher: SharedFetcher<T>,
        options: QueryOptions,
    ) -> CacheEntry<T> {
        self.get_slot(descriptor, fetcher, options).1
    }

    fn get_slot(
        &self,
        descriptor: &QueryDescriptor,
        fetcher: SharedFetcher<T>,
        options: QueryOptions,
    ) -> (Arc<Slot<T>>, CacheEntry<T>) {
        let now = self.inner.now();
        let slot = self.inner.slot_or_insert(descriptor, options, now);
        let (entry, started) = {
            let mut state = slot.state.lock();
            state.fetcher = Some(fetcher);
            state.options = options;
            state.last_access = now;
            let started = if state.in_flight.is_none() && state.is_stale(now) {
                self.inner.begin(&mut state)
            } else {
                debug!(key = %slot.key, fetching = state.in_flight.is_some(), "cache hit");
                None
            };
            (state.snapshot(&slot.key, now), started)
        };
        if let Some(started) = started {
            self.inner.spawn_fetch(Arc::clone(&slot), started);
        }
        (slot, entry)
    }

    /// Like [`get`](Self::get), then waits until no fetch is in flight.
    pub async fn fetch(
        &self,
        descriptor: &QueryDescriptor,
        fetcher: SharedFetcher<T>,
        options: QueryOptions,
    ) -> CacheEntry<T> {
        let mut changes = self.inner.changes.subscribe();
        let (slot, _) = self.get_slot(descriptor, fetcher, options);
        loop {
            {
                let state = slot.state.lock();
                if state.in_flight.is_none() {
                    return state.snapshot(&slot.key, self.inner.now());
                }
            }
            if changes.changed().await.is_err() {
                return slot.state.lock().snapshot(&slot.key, self.inner.now());
            }
        }
    }

    /// Snapshot without side effects.
    #[must_use]
    pub fn peek(&self, descriptor: &QueryDescriptor) -> Option<CacheEntry<T>> {
        let slot = self.inner.slot(&descriptor.key())?;
        let state = slot.state.lock();
        Some(state.snapshot(&slot.key, self.inner.now()))
    }

    /// Forces a fetch with the remembered fetcher, or joins the one in flight.
    ///
    /// Returns `false` when the key is unknown or was never fetched.
    pub fn refetch(&self, descriptor: &QueryDescriptor) -> bool {
        let Some(slot) = self.inner.slot(&descriptor.key()) else {
            return false;
        };
        let started = {
            let mut state = slot.state.lock();
            if state.in_flight.is_some() {
                debug!(key = %slot.key, "refetch joins in-flight fetch");
                return true;
            }
            state.last_access = self.inner.now();
            self.inner.begin(&mut state)
        };
        match started {
            Some(started) => {
                self.inner.spawn_fetch(slot, started);
                true
            }
            None => false,
        }
    }

    /// Marks the entry stale so the next `get` refetches. The value stays visible.
    pub fn invalidate(&self, descriptor: &QueryDescriptor) -> bool {
        match self.inner.slot(&descriptor.key()) {
            Some(slot) => {
                self.mark_invalid(&slot);
                true
            }
            None => false,
        }
    }

    /// Invalidates every entry whose descriptor satisfies `predicate`.
    pub fn invalidate_matching(&self, predicate: impl Fn(&QueryDescriptor) -> bool) -> usize {
        let matching: Vec<Arc<Slot<T>>> = self
            .inner
            .slots
            .iter()
            .filter(|s| predicate(&s.value().descriptor))
            .map(|s| Arc::clone(s.value()))
            .collect();
        for slot in &matching {
            self.mark_invalid(slot);
        }
        debug!(count = matching.len(), "invalidated matching entries");
        matching.len()
    }

    fn mark_invalid(&self, slot: &Slot<T>) {
        let mut state = slot.state.lock();
        state.invalidated = true;
        let version = self.inner.bump(&mut state);
        drop(state);
        self.inner.notify(version);
    }

    /// Stores `value` as a fresh success, creating the entry if needed.
    pub fn set_value(&self, descriptor: &QueryDescriptor, value: T) {
        let now = self.inner.now();
        let slot = self.inner.slot_or_insert(descriptor, self.inner.defaults, now);
        let mut state = slot.state.lock();
        state.status = QueryStatus::Success;
        state.value = Some(value);
        state.error = None;
        state.fetched_at = Some(now);
        state.settled_at = Some(now);
        state.invalidated = false;
        state.last_access = now;
        let version = self.inner.bump(&mut state);
        drop(state);
        self.inner.notify(version);
    }

    /// Edits the cached value in place. Returns `false` when there is no value.
    pub fn update(&self, descriptor: &QueryDescriptor, edit: impl FnOnce(&mut T)) -> bool {
        let Some(slot) = self.inner.slot(&descriptor.key()) else {
            return false;
        };
        let mut state = slot.state.lock();
        let Some(value) = state.value.as_mut() else {
            return false;
        };
        edit(value);
        let version = self.inner.bump(&mut state);
        drop(state);
        self.inner.notify(version);
        true
    }

    /// Drops the entry. A fetch still in flight for it is discarded on arrival.
    pub fn remove(&self, descriptor: &QueryDescriptor) -> bool {
        match self.inner.slots.remove(&descriptor.key()) {
            Some((_, slot)) => {
                self.inner.retire(&slot);
                true
            }
            None => false,
        }
    }

    /// Drops every entry whose descriptor satisfies `predicate`.
    pub fn remove_matching(&self, predicate: impl Fn(&QueryDescriptor) -> bool) -> usize {
        let mut removed = 0;
        self.inner.slots.retain(|_, slot| {
            if !predicate(&slot.descriptor) {
                return true;
            }
            self.inner.retire(slot);
            removed += 1;
            false
        });
        debug!(count = removed, "removed matching entries");
        removed
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.inner.slots.retain(|_, slot| {
            self.inner.retire(slot);
            false
        });
    }

    /// Registers an observer. While any subscription for a key is alive its
    /// entry is never garbage-collected.
    #[must_use]
    pub fn subscribe(&self, descriptor: &QueryDescriptor) -> Subscription<T> {
        let now = self.inner.now();
        let slot = self.inner.slot_or_insert(descriptor, self.inner.defaults, now);
        *self.inner.subscribers.entry(slot.key.clone()).or_insert(0) += 1;
        let seen = Some(slot.state.lock().version);
        Subscription {
            inner: Arc::clone(&self.inner),
            descriptor: descriptor.clone(),
            key: slot.key.clone(),
            seen,
            changes: self.inner.changes.subscribe(),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self, descriptor: &QueryDescriptor) -> usize {
        self.inner
            .subscribers
            .get(&descriptor.key())
            .map_or(0, |c| *c)
    }

    /// Evicts entries with no subscribers and no fetch in flight that have
    /// been idle for at least their `gc_ms`. Returns the number evicted.
    pub fn collect_garbage(&self) -> usize {
        let now = self.inner.now();
        let mut evicted = 0;
        self.inner.slots.retain(|key, slot| {
            if self.inner.subscribers.contains_key(key) {
                return true;
            }
            let state = slot.state.lock();
            let keep = state.in_flight.is_some()
                || now.saturating_sub(state.last_access) < state.options.gc_ms;
            if !keep {
                debug!(%key, "evicting idle cache entry");
                evicted += 1;
            }
            keep
        });
        evicted
    }

    /// Receiver that changes whenever any entry changes.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }
}

/// RAII observer of one cache key.
pub struct Subscription<T> {
    inner: Arc<Inner<T>>,
    descriptor: QueryDescriptor,
    key: QueryKey,
    seen: Option<u64>,
    changes: watch::Receiver<u64>,
}

impl<T> Subscription<T> {
    #[must_use]
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Waits until the observed entry changes. Returns `false` if the cache is gone.
    pub async fn changed(&mut self) -> bool {
        loop {
            let current = self.inner.version_of(&self.key);
            if current != self.seen {
                self.seen = current;
                return true;
            }
            if self.changes.changed().await.is_err() {
                return false;
            }
        }
    }
}

impl<T: Clone> Subscription<T> {
    /// Current state of the observed entry.
    #[must_use]
    pub fn snapshot(&self) -> Option<CacheEntry<T>> {
        let slot = self.inner.slot(&self.key)?;
        let state = slot.state.lock();
        Some(state.snapshot(&slot.key, self.inner.now()))
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.inner.release_subscriber(&self.key);
    }
}
