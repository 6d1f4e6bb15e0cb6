use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use super::entry::CacheEntry;

/// Why an entry left the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EvictionReason {
    /// The entry's TTL elapsed and a sweep collected it.
    Expired,
    /// The key-capacity limit displaced the least-recently-inserted entry.
    Capacity,
    /// A delete removed the entry.
    Explicit,
    /// A store over an existing key surrendered the old record. The stem
    /// was rewritten in place, so only the byte accounting changes.
    Replaced,
}

pub(super) enum Lookup {
    Hit(CacheEntry),
    Expired,
    Miss,
}

pub(crate) type EvictionCallback = Box<dyn Fn(EvictionReason, &CacheEntry) + Send + Sync>;

pub(super) struct IndexConfig {
    pub default_ttl: Option<Duration>,
    pub max_keys: u64,
    pub touch_on_hit: bool,
}

/// Key → entry mapping with per-entry TTL, an optional cardinality limit
/// evicting least-recently-inserted on overflow, and an eviction callback.
///
/// Cheaply clonable; all state lives behind one `Arc`. The eviction
/// callback always runs after the map lock is released, so it may take
/// engine locks freely.
#[derive(Clone)]
pub(super) struct TtlIndex {
    shared: Arc<IndexShared>,
}

struct IndexShared {
    map: Mutex<LruCache<String, CacheEntry>>,
    default_ttl: Option<Duration>,
    touch_on_hit: bool,
    on_evict: EvictionCallback,
    insertions: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    cleanup: Mutex<Option<watch::Sender<bool>>>,
}

impl TtlIndex {
    pub(super) fn new(config: IndexConfig, on_evict: EvictionCallback) -> Self {
        let map = match NonZeroUsize::new(config.max_keys as usize) {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            shared: Arc::new(IndexShared {
                map: Mutex::new(map),
                default_ttl: config.default_ttl,
                touch_on_hit: config.touch_on_hit,
                on_evict,
                insertions: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
                cleanup: Mutex::new(None),
            }),
        }
    }

    pub(super) fn default_ttl(&self) -> Option<Duration> {
        self.shared.default_ttl
    }

    /// Inserts or replaces an entry. A replace surrenders the old record
    /// with [`EvictionReason::Replaced`]; a cardinality overflow evicts
    /// the least-recently-inserted entry with [`EvictionReason::Capacity`].
    pub(super) fn set(&self, key: String, mut entry: CacheEntry, ttl: Option<Duration>) {
        entry.ttl = ttl;
        entry.expires_at = ttl.map(|ttl| Instant::now() + ttl);

        let displaced = {
            let mut map = self.shared.map.lock();
            map.push(key.clone(), entry)
        };
        self.shared.insertions.fetch_add(1, Ordering::Relaxed);

        if let Some((displaced_key, displaced_entry)) = displaced {
            let reason = if displaced_key == key {
                EvictionReason::Replaced
            } else {
                self.shared.evictions.fetch_add(1, Ordering::Relaxed);
                EvictionReason::Capacity
            };
            (self.shared.on_evict)(reason, &displaced_entry);
        }
    }

    /// Looks up a key without reordering anything. Expired-but-unswept
    /// entries report [`Lookup::Expired`]; with touch-on-hit enabled a hit
    /// pushes the expiry to `now + ttl`.
    pub(super) fn lookup(&self, key: &str) -> Lookup {
        let now = Instant::now();
        let outcome = {
            let mut map = self.shared.map.lock();
            match map.peek_mut(key) {
                None => Lookup::Miss,
                Some(entry) if entry.is_expired_at(now) => Lookup::Expired,
                Some(entry) => {
                    if self.shared.touch_on_hit
                        && let Some(ttl) = entry.ttl
                    {
                        entry.expires_at = Some(now + ttl);
                    }
                    Lookup::Hit(entry.clone())
                }
            }
        };
        match &outcome {
            Lookup::Hit(_) => self.shared.hits.fetch_add(1, Ordering::Relaxed),
            Lookup::Expired | Lookup::Miss => self.shared.misses.fetch_add(1, Ordering::Relaxed),
        };
        outcome
    }

    pub(super) fn delete(&self, key: &str) -> bool {
        self.remove(key, EvictionReason::Explicit)
    }

    pub(super) fn remove(&self, key: &str, reason: EvictionReason) -> bool {
        let removed = self.shared.map.lock().pop(key);
        match removed {
            Some(entry) => {
                self.shared.evictions.fetch_add(1, Ordering::Relaxed);
                (self.shared.on_evict)(reason, &entry);
                true
            }
            None => false,
        }
    }

    /// Sweeps expired entries, firing the callback for each.
    pub(super) fn delete_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<CacheEntry> = {
            let mut map = self.shared.map.lock();
            let keys: Vec<String> = map
                .iter()
                .filter(|(_, entry)| entry.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter().filter_map(|key| map.pop(key)).collect()
        };
        for entry in &expired {
            self.shared.evictions.fetch_add(1, Ordering::Relaxed);
            (self.shared.on_evict)(EvictionReason::Expired, entry);
        }
        expired.len()
    }

    /// Starts the periodic expiry sweep. Idempotent; a stopped index can
    /// be started again.
    pub(super) fn start(&self) {
        let mut cleanup = self.shared.cleanup.lock();
        if cleanup.is_some() {
            return;
        }
        let (tx, mut rx) = watch::channel(false);
        *cleanup = Some(tx);
        drop(cleanup);

        let index = self.clone();
        let interval = self.cleanup_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = index.delete_expired();
                        if removed > 0 {
                            debug!(removed, "swept expired cache entries");
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            return;
                        }
                    }
                }
            }
        });
    }

    /// Stops the periodic sweep. Idempotent.
    pub(super) fn stop(&self) {
        if let Some(tx) = self.shared.cleanup.lock().take() {
            let _ = tx.send(true);
        }
    }

    fn cleanup_interval(&self) -> Duration {
        const FLOOR: Duration = Duration::from_millis(100);
        match self.shared.default_ttl {
            Some(ttl) => (ttl / 2).max(FLOOR),
            None => Duration::from_secs(1),
        }
    }

    /// (insertions, hits, misses, evictions)
    pub(super) fn counters(&self) -> (u64, u64, u64, u64) {
        (
            self.shared.insertions.load(Ordering::Relaxed),
            self.shared.hits.load(Ordering::Relaxed),
            self.shared.misses.load(Ordering::Relaxed),
            self.shared.evictions.load(Ordering::Relaxed),
        )
    }

    pub(super) fn len(&self) -> usize {
        self.shared.map.lock().len()
    }
}
