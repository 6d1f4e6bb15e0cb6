use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

type LockTable = Arc<Mutex<HashMap<String, Slot>>>;

/// Per-key readers/writer locks, created lazily and reaped when the last
/// holder releases. The refcount covers waiters as well as holders, so a
/// slot is never removed while an acquisition is in flight, and a fresh
/// acquire after reaping always observes a brand-new lock.
#[derive(Debug, Default)]
pub(super) struct KeyLocks {
    table: LockTable,
}

#[derive(Debug)]
struct Slot {
    lock: Arc<RwLock<()>>,
    refs: usize,
}

impl KeyLocks {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) async fn write(&self, key: &str) -> KeyWriteGuard {
        let lock = self.acquire_slot(key);
        let guard = lock.write_owned().await;
        KeyWriteGuard {
            guard: Some(guard),
            table: self.table.clone(),
            key: key.to_string(),
        }
    }

    pub(super) async fn read(&self, key: &str) -> KeyReadGuard {
        let lock = self.acquire_slot(key);
        let guard = lock.read_owned().await;
        KeyReadGuard {
            guard: Some(guard),
            table: self.table.clone(),
            key: key.to_string(),
        }
    }

    fn acquire_slot(&self, key: &str) -> Arc<RwLock<()>> {
        let mut table = self.table.lock();
        let slot = table.entry(key.to_string()).or_insert_with(|| Slot {
            lock: Arc::new(RwLock::new(())),
            refs: 0,
        });
        slot.refs += 1;
        slot.lock.clone()
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.table.lock().len()
    }
}

fn release_slot(table: &LockTable, key: &str) {
    let mut table = table.lock();
    if let Some(slot) = table.get_mut(key) {
        slot.refs -= 1;
        if slot.refs == 0 {
            table.remove(key);
        }
    }
}

pub(super) struct KeyWriteGuard {
    guard: Option<OwnedRwLockWriteGuard<()>>,
    table: LockTable,
    key: String,
}

impl Drop for KeyWriteGuard {
    fn drop(&mut self) {
        // Release the hold before the slot becomes reclaimable.
        self.guard.take();
        release_slot(&self.table, &self.key);
    }
}

pub(super) struct KeyReadGuard {
    guard: Option<OwnedRwLockReadGuard<()>>,
    table: LockTable,
    key: String,
}

impl Drop for KeyReadGuard {
    fn drop(&mut self) {
        self.guard.take();
        release_slot(&self.table, &self.key);
    }
}
