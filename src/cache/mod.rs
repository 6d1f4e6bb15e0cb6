//! The disk cache engine: a TTL'd in-memory index over pairs of encoded
//! request/response files, with per-key mutual exclusion, byte and key
//! capacity limits, background eviction, and warm-up from an existing
//! directory tree.

mod deque;
mod entry;
mod index;
mod keylock;
mod options;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response};
use parking_lot::Mutex;
use tokio::fs as async_fs;
use tokio::io::{BufReader, BufWriter};
use tokio::sync::watch;
use tokio::task;
use tracing::{trace, warn};

use crate::codec::{
    CountingWriter, decode_request, decode_response, encode_request, encode_response,
};
use crate::error::{Error, Result};
use crate::path::{key_to_path, path_to_key};

use deque::AgeList;
use entry::{CacheEntry, REQUEST_SUFFIX, RESPONSE_SUFFIX, path_with_suffix};
use index::{EvictionReason, IndexConfig, Lookup, TtlIndex};
use keylock::KeyLocks;

pub use options::{CacheOptions, NO_LIMIT_KEYS, NO_LIMIT_TOTAL_BYTES};

/// Counter snapshot, taken with the byte counter read under the engine
/// mutex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub total_bytes: u64,
    pub key_count: u64,
}

/// Disk-backed HTTP response cache.
///
/// Cheaply clonable; clones share state. All operations are safe to call
/// from any task or thread. Background work (TTL sweep, warm-up, byte
/// adjustment) runs on the tokio runtime the cache was constructed in and
/// is stopped with [`stop_all`](Self::stop_all).
#[derive(Clone)]
pub struct DiskCache {
    state: Arc<CacheState>,
}

impl std::fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCache").finish_non_exhaustive()
    }
}

struct CacheState {
    core: Arc<CacheCore>,
    index: TtlIndex,
    key_locks: KeyLocks,
    max_total_bytes: u64,
    auto_adjust: bool,
    adjust_target: u64,
    adjust_running: tokio::sync::Mutex<()>,
    adjust_stop: watch::Sender<bool>,
    warm_up_stop: watch::Sender<bool>,
}

/// The slice of engine state the eviction callback needs: everything
/// below the index, so index → core references stay one-directional.
struct CacheCore {
    root: PathBuf,
    cache_dir_len: i32,
    deque: AgeList,
    total_bytes: Mutex<u64>,
}

impl CacheCore {
    fn stem_for(&self, key: &str) -> PathBuf {
        self.root.join(key_to_path(key, self.cache_dir_len))
    }

    fn total_bytes(&self) -> u64 {
        *self.total_bytes.lock()
    }

    fn add_bytes(&self, bytes: u64) {
        *self.total_bytes.lock() += bytes;
    }

    fn subtract_bytes(&self, bytes: u64) {
        let mut total = self.total_bytes.lock();
        *total = total.saturating_sub(bytes);
    }

    /// Eviction callback body. File removal failures are logged and
    /// swallowed so the index keeps reflecting logical state even when
    /// the filesystem lags.
    fn remove_entry(&self, reason: EvictionReason, entry: &CacheEntry) {
        if reason == EvictionReason::Replaced {
            // The stem was rewritten in place; the replacement's bytes are
            // accounted by the store that displaced this record.
            self.subtract_bytes(entry.bytes());
            return;
        }
        for path in [entry.request_path(), entry.response_path()] {
            if let Err(err) = std::fs::remove_file(&path)
                && err.kind() != std::io::ErrorKind::NotFound
            {
                warn!(error = %err, path = %path.display(), "failed to remove evicted cache file");
            }
        }
        self.subtract_bytes(entry.bytes());
        self.deque.remove(entry.key());
        trace!(key = entry.key(), reason = ?reason, "evicted cache entry");
    }
}

impl DiskCache {
    /// Creates a cache rooted at `root`, which must exist and be
    /// writable. `default_ttl` applies to [`store`](Self::store) and to
    /// warm-up entries; `None` means entries do not expire.
    ///
    /// Unless disabled by `options`, this starts the TTL sweep and kicks
    /// off a background warm-up scan of `root`; neither blocks the
    /// constructor.
    pub async fn new(
        root: impl Into<PathBuf>,
        default_ttl: Option<Duration>,
        options: CacheOptions,
    ) -> Result<Self> {
        let root = root.into();
        options.validate()?;
        probe_writable(&root)?;

        let core = Arc::new(CacheCore {
            root,
            cache_dir_len: options.cache_dir_len,
            deque: AgeList::new(),
            total_bytes: Mutex::new(0),
        });

        let callback_core = core.clone();
        let index = TtlIndex::new(
            IndexConfig {
                default_ttl,
                max_keys: options.max_keys,
                touch_on_hit: options.touch_on_hit,
            },
            Box::new(move |reason, entry| callback_core.remove_entry(reason, entry)),
        );

        let (adjust_stop, _) = watch::channel(false);
        let (warm_up_stop, _) = watch::channel(false);

        let cache = Self {
            state: Arc::new(CacheState {
                core,
                index,
                key_locks: KeyLocks::new(),
                max_total_bytes: options.max_total_bytes,
                auto_adjust: options.auto_adjust,
                adjust_target: options.adjust_target(),
                adjust_running: tokio::sync::Mutex::new(()),
                adjust_stop,
                warm_up_stop,
            }),
        };

        if !options.disable_auto_cleanup {
            cache.start_auto_cleanup();
        }
        if !options.disable_warm_up {
            cache.spawn_warm_up();
        }
        Ok(cache)
    }

    /// Stores a pair under `key` with the default TTL.
    pub async fn store(
        &self,
        key: &str,
        req: &Request<Bytes>,
        res: &Response<Bytes>,
    ) -> Result<()> {
        self.store_with_ttl(key, req, res, self.state.index.default_ttl())
            .await
    }

    /// Stores a pair under `key`; `None` stores without expiry.
    ///
    /// The two files are written concurrently under the key's write lock.
    /// With a byte limit configured, a write that would reach it either
    /// schedules a background adjustment (when enabled and not stopped)
    /// or is rolled back with [`Error::Full`].
    pub async fn store_with_ttl(
        &self,
        key: &str,
        req: &Request<Bytes>,
        res: &Response<Bytes>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        if key.is_empty() {
            return Err(Error::Config("cache key must not be empty".into()));
        }
        let state = &self.state;
        let _guard = state.key_locks.write(key).await;

        let stem = state.core.stem_for(key);
        if let Some(parent) = stem.parent() {
            async_fs::create_dir_all(parent).await?;
        }
        let request_path = path_with_suffix(&stem, REQUEST_SUFFIX);
        let response_path = path_with_suffix(&stem, RESPONSE_SUFFIX);

        let written = match tokio::try_join!(
            write_request_file(&request_path, req),
            write_response_file(&response_path, res),
        ) {
            Ok((request_bytes, response_bytes)) => request_bytes + response_bytes,
            Err(err) => {
                remove_file_pair(&request_path, &response_path).await;
                return Err(err);
            }
        };

        if state.max_total_bytes != NO_LIMIT_TOTAL_BYTES {
            let current = state.core.total_bytes() + written;
            if current >= state.max_total_bytes {
                let adjust_stopped = *state.adjust_stop.borrow();
                if state.auto_adjust && !adjust_stopped {
                    self.spawn_adjust();
                } else {
                    remove_file_pair(&request_path, &response_path).await;
                    return Err(Error::Full {
                        current,
                        limit: state.max_total_bytes,
                    });
                }
            }
        }

        let entry = CacheEntry::new(key.to_string(), stem, written);
        state.index.set(key.to_string(), entry, ttl);
        state.core.add_bytes(written);
        state.core.deque.push_front(key);
        Ok(())
    }

    /// Loads the pair stored under `key`.
    ///
    /// Returns [`Error::NotFound`] for absent keys and [`Error::Expired`]
    /// for indexed-but-expired entries. A pair that fails to decode is
    /// evicted and reported as [`Error::NotFound`].
    pub async fn load(&self, key: &str) -> Result<(Request<Bytes>, Response<Bytes>)> {
        let state = &self.state;
        let _guard = state.key_locks.read(key).await;

        let entry = match state.index.lookup(key) {
            Lookup::Hit(entry) => entry,
            Lookup::Expired => return Err(Error::Expired),
            Lookup::Miss => return Err(Error::NotFound),
        };

        match tokio::try_join!(
            read_request_file(entry.request_path()),
            read_response_file(entry.response_path()),
        ) {
            Ok(pair) => Ok(pair),
            Err(err) => {
                warn!(key, error = %err, "failed to decode cached pair; evicting entry");
                state.index.delete(key);
                Err(Error::NotFound)
            }
        }
    }

    /// Deletes `key`: the entry leaves the index and its files are
    /// removed.
    pub async fn delete(&self, key: &str) {
        let _guard = self.state.key_locks.write(key).await;
        self.state.index.delete(key);
    }

    /// Sweeps expired entries now, independent of the background sweep.
    pub fn delete_expired(&self) {
        self.state.index.delete_expired();
    }

    pub fn metrics(&self) -> Metrics {
        let (insertions, hits, misses, evictions) = self.state.index.counters();
        Metrics {
            hits,
            misses,
            insertions,
            evictions,
            total_bytes: self.state.core.total_bytes(),
            key_count: self.state.index.len() as u64,
        }
    }

    /// Starts the periodic TTL sweep. Idempotent.
    pub fn start_auto_cleanup(&self) {
        self.state.index.start();
    }

    /// Stops the periodic TTL sweep. Idempotent.
    pub fn stop_auto_cleanup(&self) {
        self.state.index.stop();
    }

    /// Cancels a running warm-up scan. Idempotent.
    pub fn stop_warm_up(&self) {
        self.state.warm_up_stop.send_replace(true);
    }

    /// Stops the byte-adjustment loop and prevents stores from scheduling
    /// new ones. Idempotent.
    pub fn stop_adjust(&self) {
        self.state.adjust_stop.send_replace(true);
    }

    /// Stops warm-up, the TTL sweep, and the adjustment loop. Safe to
    /// call repeatedly, and when some loops never ran.
    pub fn stop_all(&self) {
        self.stop_warm_up();
        self.stop_auto_cleanup();
        self.stop_adjust();
    }

    /// Evicts oldest entries until total bytes drop below the adjust
    /// target. At most one pass runs at a time; extra invocations return
    /// immediately.
    fn spawn_adjust(&self) {
        let state = self.state.clone();
        tokio::spawn(async move {
            let Ok(_running) = state.adjust_running.try_lock() else {
                return;
            };
            let mut stop = state.adjust_stop.subscribe();
            loop {
                if *stop.borrow_and_update() {
                    return;
                }
                if state.core.total_bytes() < state.adjust_target {
                    return;
                }
                let Some(key) = state.core.deque.back() else {
                    return;
                };
                if !state.index.remove(&key, EvictionReason::Capacity) {
                    // Evicted through another path already; drop the stale
                    // node so the loop can make progress.
                    state.core.deque.remove(&key);
                    continue;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });
    }

    fn spawn_warm_up(&self) {
        let state = self.state.clone();
        let stop = self.state.warm_up_stop.subscribe();
        task::spawn_blocking(move || {
            if let Err(err) = warm_up(&state, &stop) {
                warn!(error = %err, "cache warm-up failed");
            }
        });
    }
}

/// Repopulates the index from files under the root: every `.response`
/// with an existing `.request` sibling becomes an entry at the default
/// TTL, sized as the sum of both files. Cancellation is observed between
/// files.
fn warm_up(state: &CacheState, stop: &watch::Receiver<bool>) -> Result<()> {
    let root = &state.core.root;
    let mut pending = vec![root.clone()];
    while let Some(dir) = pending.pop() {
        for dir_entry in std::fs::read_dir(&dir)? {
            if *stop.borrow() {
                return Ok(());
            }
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if dir_entry.file_type()?.is_dir() {
                pending.push(path);
                continue;
            }
            let Some(path_str) = path.to_str() else {
                continue;
            };
            let Some(stem_str) = path_str.strip_suffix(RESPONSE_SUFFIX) else {
                continue;
            };
            let stem = PathBuf::from(stem_str);

            let request_path = path_with_suffix(&stem, REQUEST_SUFFIX);
            let Ok(request_meta) = std::fs::metadata(&request_path) else {
                // Orphaned response file; nothing to restore.
                continue;
            };
            let bytes = request_meta.len() + dir_entry.metadata()?.len();

            let Ok(rel) = stem.strip_prefix(root) else {
                continue;
            };
            let Some(rel_str) = rel.to_str() else {
                continue;
            };
            let key = path_to_key(rel_str);
            if key.is_empty() {
                continue;
            }

            trace!(key = %key, bytes, "warm-up restored cache entry");
            let entry = CacheEntry::new(key.clone(), stem, bytes);
            state.index.set(key.clone(), entry, state.index.default_ttl());
            state.core.add_bytes(bytes);
            state.core.deque.push_front(&key);
        }
    }
    Ok(())
}

/// Verifies the root is writable by creating and deleting a temp file.
fn probe_writable(root: &Path) -> Result<()> {
    tempfile::Builder::new()
        .prefix("tmpfile")
        .tempfile_in(root)
        .map(drop)
        .map_err(|source| Error::RootNotWritable {
            path: root.to_path_buf(),
            source,
        })
}

async fn write_request_file(path: &Path, req: &Request<Bytes>) -> Result<u64> {
    let file = async_fs::File::create(path).await?;
    let mut writer = CountingWriter::new(BufWriter::new(file));
    encode_request(req, &mut writer).await?;
    Ok(writer.bytes_written())
}

async fn write_response_file(path: &Path, res: &Response<Bytes>) -> Result<u64> {
    let file = async_fs::File::create(path).await?;
    let mut writer = CountingWriter::new(BufWriter::new(file));
    encode_response(res, &mut writer).await?;
    Ok(writer.bytes_written())
}

async fn read_request_file(path: PathBuf) -> Result<Request<Bytes>> {
    let file = async_fs::File::open(&path).await?;
    decode_request(&mut BufReader::new(file)).await
}

async fn read_response_file(path: PathBuf) -> Result<Response<Bytes>> {
    let file = async_fs::File::open(&path).await?;
    decode_response(&mut BufReader::new(file)).await
}

/// Best-effort rollback of a store's two files.
async fn remove_file_pair(request_path: &Path, response_path: &Path) {
    for path in [request_path, response_path] {
        if let Err(err) = async_fs::remove_file(path).await
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!(error = %err, path = %path.display(), "failed to remove cache file");
        }
    }
}
