//! Fixed-capacity statement cache with least-recently-used eviction.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use stmtcache_core::{ConfigError, Result, StatementDescription};

use crate::cache::{StatementCache, assert_sql_present};

/// LRU-ordered cache of statement descriptions.
///
/// When a [`put`](StatementCache::put) pushes the cache over capacity, the
/// least-recently-used entry is evicted into the invalidation queue so the
/// server-side statement is eventually deallocated. Recency is updated by
/// cache hits and by successful insertions, never by invalidation.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stmtcache::{LruCache, StatementCache};
/// use stmtcache_core::StatementDescription;
///
/// let mut cache = LruCache::new(1).unwrap();
/// cache.put(Arc::new(StatementDescription::named_from_sql("SELECT 1", vec![], vec![])));
/// cache.put(Arc::new(StatementDescription::named_from_sql("SELECT 2", vec![], vec![])));
///
/// assert_eq!(cache.len(), 1);
/// assert_eq!(cache.get_invalidated()[0].sql(), "SELECT 1");
/// ```
#[derive(Debug)]
pub struct LruCache {
    entries: lru::LruCache<String, Arc<StatementDescription>>,
    invalidated: Vec<Arc<StatementDescription>>,
    invalidated_sql: HashSet<String>,
}

impl LruCache {
    /// Create a cache holding at most `capacity` statements.
    ///
    /// A capacity of zero is rejected: a cache that can hold nothing would
    /// evict every statement the moment it was stored.
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| ConfigError::new("statement cache capacity must be greater than zero"))?;
        Ok(Self {
            entries: lru::LruCache::new(capacity),
            invalidated: Vec::new(),
            invalidated_sql: HashSet::new(),
        })
    }

    /// Check whether `sql` is cached, without touching its recency.
    pub fn contains(&self, sql: &str) -> bool {
        self.entries.contains(sql)
    }

    /// Check whether `sql` is waiting in the invalidation queue.
    pub fn is_invalidated(&self, sql: &str) -> bool {
        self.invalidated_sql.contains(sql)
    }

    /// Store `sd` and return the entry evicted to make room for it, if any.
    ///
    /// Same rules as [`StatementCache::put`]; the evicted entry has already
    /// been queued for deallocation when this returns.
    pub fn insert(&mut self, sd: Arc<StatementDescription>) -> Option<Arc<StatementDescription>> {
        assert_sql_present(&sd);

        if self.entries.contains(sd.sql()) || self.invalidated_sql.contains(sd.sql()) {
            return None;
        }

        let evicted = self
            .entries
            .push(sd.sql().to_owned(), sd)
            .map(|(_, evicted)| evicted)?;

        tracing::debug!(
            sql = %evicted.sql(),
            name = %evicted.name(),
            capacity = self.cap(),
            "Evicted least recently used statement"
        );
        self.queue_invalidated(Arc::clone(&evicted));
        Some(evicted)
    }

    fn queue_invalidated(&mut self, sd: Arc<StatementDescription>) {
        self.invalidated_sql.insert(sd.sql().to_owned());
        self.invalidated.push(sd);
    }
}

impl StatementCache for LruCache {
    fn get(&mut self, sql: &str) -> Option<Arc<StatementDescription>> {
        self.entries.get(sql).cloned()
    }

    fn put(&mut self, sd: Arc<StatementDescription>) {
        self.insert(sd);
    }

    fn invalidate(&mut self, sql: &str) {
        if let Some(sd) = self.entries.pop(sql) {
            tracing::debug!(sql = %sql, name = %sd.name(), "Invalidated cached statement");
            self.queue_invalidated(sd);
        }
    }

    fn invalidate_all(&mut self) {
        // Most recently used first.
        let live: Vec<_> = self.entries.iter().map(|(_, sd)| Arc::clone(sd)).collect();
        self.entries.clear();

        tracing::debug!(count = live.len(), "Invalidated all cached statements");
        for sd in live {
            self.queue_invalidated(sd);
        }
    }

    fn get_invalidated(&self) -> &[Arc<StatementDescription>] {
        &self.invalidated
    }

    fn remove_invalidated(&mut self) {
        self.invalidated.clear();
        self.invalidated_sql.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn cap(&self) -> usize {
        self.entries.cap().get()
    }
}
