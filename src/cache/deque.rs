use lru::LruCache;
use parking_lot::Mutex;

/// Store-ordered list of live keys, used to pick byte-budget eviction
/// victims. Independent of the index's own capacity ordering: only
/// stores move a key to the front, never lookups.
#[derive(Debug)]
pub(super) struct AgeList {
    inner: Mutex<LruCache<String, ()>>,
}

impl AgeList {
    pub(super) fn new() -> Self {
        Self {
            inner: Mutex::new(LruCache::unbounded()),
        }
    }

    /// Inserts `key` at the front, or moves it there if already present.
    pub(super) fn push_front(&self, key: &str) {
        self.inner.lock().push(key.to_string(), ());
    }

    /// Peeks the oldest key, if any.
    pub(super) fn back(&self) -> Option<String> {
        self.inner.lock().peek_lru().map(|(key, _)| key.clone())
    }

    /// Removes `key`; absent keys are ignored.
    pub(super) fn remove(&self, key: &str) {
        self.inner.lock().pop(key);
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_tracks_oldest_insertion() {
        let list = AgeList::new();
        assert_eq!(list.back(), None);
        list.push_front("a");
        list.push_front("b");
        list.push_front("c");
        assert_eq!(list.back().as_deref(), Some("a"));
    }

    #[test]
    fn push_front_moves_existing_key() {
        let list = AgeList::new();
        list.push_front("a");
        list.push_front("b");
        list.push_front("a");
        assert_eq!(list.back().as_deref(), Some("b"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let list = AgeList::new();
        list.push_front("a");
        list.remove("a");
        list.remove("a");
        list.remove("never-inserted");
        assert_eq!(list.back(), None);
    }
}
