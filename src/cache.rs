//! Exact-query cache (§4.1, §4.4): a bounded LRU keyed by normalized query
//! text (optionally scoped to a document), invalidated entry-by-entry when
//! any of its cached section ids no longer resolve in the Store.

use crate::tokenize::normalize_query;
use lru::LruCache;
use std::num::NonZeroUsize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: String,
    doc_scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CachedHit {
    pub section_ids: Vec<i64>,
}

pub struct QueryCache {
    cache: LruCache<CacheKey, CachedHit>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        QueryCache {
            cache: LruCache::new(cap),
        }
    }

    fn key(query: &str, doc_scope: Option<&str>) -> CacheKey {
        CacheKey {
            query: normalize_query(query),
            doc_scope: doc_scope.map(|s| s.to_string()),
        }
    }

    /// Look up a cached hit, validating every section id still resolves in
    /// the Store (§4.4: "stale references invalidate the entry, not the
    /// whole cache"). A stale entry is evicted and treated as a miss.
    pub fn get(
        &mut self,
        query: &str,
        doc_scope: Option<&str>,
        still_valid: impl Fn(i64) -> bool,
    ) -> Option<CachedHit> {
        let key = Self::key(query, doc_scope);
        let stale = match self.cache.get(&key) {
            Some(hit) => hit.section_ids.iter().any(|&id| !still_valid(id)),
            None => return None,
        };
        if stale {
            self.cache.pop(&key);
            return None;
        }
        self.cache.get(&key).cloned()
    }

    pub fn put(&mut self, query: &str, doc_scope: Option<&str>, section_ids: Vec<i64>) {
        let key = Self::key(query, doc_scope);
        self.cache.put(key, CachedHit { section_ids });
    }

    /// Drop every cached entry referencing `section_id` (§4.4: invoked on
    /// document re-ingest/delete rather than waiting for the next read).
    pub fn invalidate_section(&mut self, section_id: i64) {
        let stale_keys: Vec<CacheKey> = self
            .cache
            .iter()
            .filter(|(_, hit)| hit.section_ids.contains(&section_id))
            .map(|(k, _)| k.clone())
            .collect();
        for k in stale_keys {
            self.cache.pop(&k);
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_normalizes_query_text() {
        let mut cache = QueryCache::new(8);
        cache.put("  How To  Auth  ", None, vec![1, 2]);
        let hit = cache.get("how to auth", None, |_| true);
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().section_ids, vec![1, 2]);
    }

    #[test]
    fn doc_scope_is_part_of_the_key() {
        let mut cache = QueryCache::new(8);
        cache.put("auth", Some("openrouter"), vec![1]);
        assert!(cache.get("auth", None, |_| true).is_none());
        assert!(cache.get("auth", Some("other-doc"), |_| true).is_none());
        assert!(cache.get("auth", Some("openrouter"), |_| true).is_some());
    }

    #[test]
    fn stale_section_reference_evicts_entry() {
        let mut cache = QueryCache::new(8);
        cache.put("auth", None, vec![1, 2]);
        let hit = cache.get("auth", None, |id| id != 2);
        assert!(hit.is_none(), "entry referencing a gone section must miss");
        assert!(cache.get("auth", None, |_| true).is_none(), "stale entry must be evicted, not just skipped");
    }

    #[test]
    fn capacity_is_bounded() {
        let mut cache = QueryCache::new(2);
        cache.put("a", None, vec![1]);
        cache.put("b", None, vec![2]);
        cache.put("c", None, vec![3]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", None, |_| true).is_none(), "oldest entry evicted");
    }

    #[test]
    fn invalidate_section_removes_every_entry_referencing_it() {
        let mut cache = QueryCache::new(8);
        cache.put("auth", None, vec![1, 2]);
        cache.put("quickstart", None, vec![2, 3]);
        cache.invalidate_section(2);
        assert!(cache.get("auth", None, |_| true).is_none());
        assert!(cache.get("quickstart", None, |_| true).is_none());
    }
}
