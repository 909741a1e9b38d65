//! Statement cache with no capacity bound.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use stmtcache_core::StatementDescription;

use crate::cache::{StatementCache, assert_sql_present};

/// Cache that keeps every statement until it is invalidated.
///
/// Suitable for connections that run a small, fixed set of queries. There is
/// no eviction, so [`cap`](StatementCache::cap) reports `usize::MAX`.
#[derive(Debug, Default)]
pub struct UnlimitedCache {
    entries: HashMap<String, Arc<StatementDescription>>,
    invalidated: Vec<Arc<StatementDescription>>,
    invalidated_sql: HashSet<String>,
}

impl UnlimitedCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue_invalidated(&mut self, sd: Arc<StatementDescription>) {
        self.invalidated_sql.insert(sd.sql().to_owned());
        self.invalidated.push(sd);
    }
}

impl StatementCache for UnlimitedCache {
    fn get(&mut self, sql: &str) -> Option<Arc<StatementDescription>> {
        self.entries.get(sql).cloned()
    }

    fn put(&mut self, sd: Arc<StatementDescription>) {
        assert_sql_present(&sd);

        if self.entries.contains_key(sd.sql()) || self.invalidated_sql.contains(sd.sql()) {
            return;
        }
        self.entries.insert(sd.sql().to_owned(), sd);
    }

    fn invalidate(&mut self, sql: &str) {
        if let Some(sd) = self.entries.remove(sql) {
            tracing::debug!(sql = %sql, name = %sd.name(), "Invalidated cached statement");
            self.queue_invalidated(sd);
        }
    }

    fn invalidate_all(&mut self) {
        let live: Vec<_> = self.entries.drain().map(|(_, sd)| sd).collect();
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
        usize::MAX
    }
}
