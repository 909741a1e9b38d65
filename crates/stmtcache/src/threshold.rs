//! Usage-gated admission in front of an [`LruCache`].

use std::collections::HashMap;
use std::sync::Arc;

use stmtcache_core::{Result, StatementDescription};

use crate::cache::{StatementCache, assert_sql_present};
use crate::lru_cache::LruCache;

/// Statement cache that only retains statements after they have been used a
/// number of times.
///
/// Every [`get`](StatementCache::get) that misses counts one use of the SQL
/// text. [`put`](StatementCache::put) forwards to the inner [`LruCache`] only
/// once the count has reached the threshold, so with a threshold of `N` a
/// statement runs unprepared `N` times and is cached from its `N + 1`-th use.
/// A threshold of zero caches on the first `put`.
///
/// Invalidating a statement, or evicting it for capacity, restarts its count
/// from zero.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stmtcache::{StatementCache, UsageThresholdCache};
/// use stmtcache_core::StatementDescription;
///
/// let mut cache = UsageThresholdCache::new(10, 1).unwrap();
/// let sd = Arc::new(StatementDescription::named_from_sql("SELECT 1", vec![], vec![]));
///
/// // One miss reaches the threshold, so the prepared statement is kept.
/// assert!(cache.get("SELECT 1").is_none());
/// cache.put(Arc::clone(&sd));
/// assert!(cache.get("SELECT 1").is_some());
/// ```
#[derive(Debug)]
pub struct UsageThresholdCache {
    cache: LruCache,
    usage_threshold: u32,
    usage_counts: HashMap<String, u32>,
}

impl UsageThresholdCache {
    /// Create a cache holding at most `capacity` statements that admits a
    /// statement once it has missed `threshold` times.
    pub fn new(capacity: usize, threshold: u32) -> Result<Self> {
        Ok(Self {
            cache: LruCache::new(capacity)?,
            usage_threshold: threshold,
            usage_counts: HashMap::new(),
        })
    }

    /// Number of misses required before a statement is retained.
    pub fn threshold(&self) -> u32 {
        self.usage_threshold
    }

    /// Misses recorded for `sql` since it was last invalidated.
    ///
    /// Saturates at `u32::MAX` on very long-lived connections.
    pub fn usage_count(&self, sql: &str) -> u32 {
        self.usage_counts.get(sql).copied().unwrap_or(0)
    }

    fn record_use(&mut self, sql: &str) -> u32 {
        if let Some(count) = self.usage_counts.get_mut(sql) {
            *count = count.saturating_add(1);
            *count
        } else {
            self.usage_counts.insert(sql.to_owned(), 1);
            1
        }
    }
}

impl StatementCache for UsageThresholdCache {
    fn get(&mut self, sql: &str) -> Option<Arc<StatementDescription>> {
        if let Some(sd) = self.cache.get(sql) {
            tracing::trace!(name = %sd.name(), "Statement cache hit");
            return Some(sd);
        }

        let uses = self.record_use(sql);
        tracing::trace!(
            uses = uses,
            threshold = self.usage_threshold,
            "Statement cache miss"
        );
        None
    }

    fn put(&mut self, sd: Arc<StatementDescription>) {
        assert_sql_present(&sd);

        let uses = self.usage_count(sd.sql());
        if uses < self.usage_threshold {
            tracing::trace!(
                uses = uses,
                threshold = self.usage_threshold,
                "Declined statement below usage threshold"
            );
            return;
        }

        if let Some(evicted) = self.cache.insert(sd) {
            self.usage_counts.remove(evicted.sql());
        }
    }

    fn invalidate(&mut self, sql: &str) {
        self.cache.invalidate(sql);
        self.usage_counts.remove(sql);
    }

    fn invalidate_all(&mut self) {
        self.cache.invalidate_all();
        self.usage_counts = HashMap::new();
    }

    fn get_invalidated(&self) -> &[Arc<StatementDescription>] {
        self.cache.get_invalidated()
    }

    fn remove_invalidated(&mut self) {
        self.cache.remove_invalidated();
    }

    fn len(&self) -> usize {
        self.cache.len()
    }

    fn cap(&self) -> usize {
        self.cache.cap()
    }
}
