//! Version-keyed memoization of per-document results.

use std::sync::Arc;

use dashmap::DashMap;

/// A memoized value and the document version that produced it.
#[derive(Debug)]
struct CacheRecord<T> {
    version: i32,
    value: Arc<T>,
}

/// Memoizes one value per document, recomputed only when the version changes.
///
/// Entries are never evicted on their own; callers must [`remove`](Self::remove)
/// a document when it is disposed.
#[derive(Debug)]
pub struct VersionedCache<T> {
    category: &'static str,
    records: DashMap<String, CacheRecord<T>>,
}

impl<T> VersionedCache<T> {
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            records: DashMap::new(),
        }
    }

    /// Return the value cached for `doc_id` at `version`, computing and
    /// storing it when missing or stale.
    pub fn get(&self, doc_id: &str, version: i32, compute: impl FnOnce() -> T) -> Arc<T> {
        if let Some(record) = self.records.get(doc_id) {
            if record.version == version {
                return Arc::clone(&record.value);
            }
        }
        tracing::trace!(category = self.category, doc_id, version, "recomputing cache entry");
        let value = Arc::new(compute());
        self.records.insert(
            doc_id.to_string(),
            CacheRecord {
                version,
                value: Arc::clone(&value),
            },
        );
        value
    }

    /// Cached value for `doc_id` regardless of version.
    pub fn peek(&self, doc_id: &str) -> Option<Arc<T>> {
        self.records.get(doc_id).map(|r| Arc::clone(&r.value))
    }

    pub fn remove(&self, doc_id: &str) {
        self.records.remove(doc_id);
    }

    /// Drop every entry, forcing recomputation on next access.
    pub fn clear(&self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
