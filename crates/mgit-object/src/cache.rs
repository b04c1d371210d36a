//! Bounded in-memory object cache.
//!
//! Merge-heavy operations (ancestry walks, three-way tree reads) touch the
//! same commits and trees repeatedly; the object database fronts reads with
//! this LRU to avoid re-inflating them.

use std::num::NonZeroUsize;

use lru::LruCache;
use mgit_hash::ObjectId;

use crate::Object;

/// LRU cache of parsed objects keyed by OID.
pub struct ObjectCache {
    inner: LruCache<ObjectId, Object>,
}

impl ObjectCache {
    /// Create a cache holding at most `capacity` objects.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Look up an object, refreshing its recency.
    pub fn get(&mut self, oid: &ObjectId) -> Option<&Object> {
        self.inner.get(oid)
    }

    /// Insert an object, evicting the least recently used if full.
    pub fn insert(&mut self, oid: ObjectId, obj: Object) {
        self.inner.put(oid, obj);
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Blob;

    fn test_oid(byte: u8) -> ObjectId {
        ObjectId::from([byte; 20])
    }

    #[test]
    fn insert_and_get() {
        let mut cache = ObjectCache::new(4);
        let obj = Object::Blob(Blob::new(b"data".to_vec()));
        cache.insert(test_oid(1), obj.clone());
        assert_eq!(cache.get(&test_oid(1)), Some(&obj));
        assert!(cache.get(&test_oid(2)).is_none());
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = ObjectCache::new(2);
        cache.insert(test_oid(1), Object::Blob(Blob::new(b"1".to_vec())));
        cache.insert(test_oid(2), Object::Blob(Blob::new(b"2".to_vec())));
        // Touch 1 so 2 becomes the eviction candidate.
        cache.get(&test_oid(1));
        cache.insert(test_oid(3), Object::Blob(Blob::new(b"3".to_vec())));

        assert!(cache.get(&test_oid(1)).is_some());
        assert!(cache.get(&test_oid(2)).is_none());
        assert!(cache.get(&test_oid(3)).is_some());
        assert_eq!(cache.len(), 2);
    }
}
