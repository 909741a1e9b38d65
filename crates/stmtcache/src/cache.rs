//! The contract every statement cache implements.

use std::sync::Arc;

use stmtcache_core::StatementDescription;

/// Panic message for [`StatementCache::put`] with an empty SQL text.
pub(crate) const EMPTY_SQL_MESSAGE: &str = "cannot store statement description with empty SQL";

/// Per-connection cache of prepared statement descriptions, keyed by SQL text.
///
/// Entries that leave the cache because of [`invalidate`](Self::invalidate),
/// [`invalidate_all`](Self::invalidate_all) or capacity pressure are queued
/// until the caller has deallocated them on the server and acknowledged that
/// with [`remove_invalidated`](Self::remove_invalidated).
///
/// Implementations are plain data structures. A cache belongs to exactly one
/// connection; callers that share a connection must serialize access
/// themselves.
pub trait StatementCache {
    /// Returns the description cached for `sql`, or `None` if the statement
    /// should be executed without a server-side prepared statement.
    fn get(&mut self, sql: &str) -> Option<Arc<StatementDescription>>;

    /// Offers a freshly prepared statement for retention.
    ///
    /// Does nothing if the SQL text is already cached or still waiting in the
    /// invalidation queue.
    ///
    /// # Panics
    ///
    /// Panics if `sd.sql()` is empty.
    fn put(&mut self, sd: Arc<StatementDescription>);

    /// Invalidates the statement cached for `sql`. Does nothing if not found.
    fn invalidate(&mut self, sql: &str);

    /// Invalidates every cached statement.
    fn invalidate_all(&mut self);

    /// Statements invalidated since the last call to
    /// [`remove_invalidated`](Self::remove_invalidated), oldest first.
    fn get_invalidated(&self) -> &[Arc<StatementDescription>];

    /// Forgets the invalidation queue. Call this only after every statement
    /// returned by [`get_invalidated`](Self::get_invalidated) has been
    /// deallocated (or deliberately left alone).
    fn remove_invalidated(&mut self);

    /// Number of cached statements.
    fn len(&self) -> usize;

    /// Maximum number of cached statements.
    fn cap(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn assert_sql_present(sd: &StatementDescription) {
    assert!(!sd.sql().is_empty(), "{}", EMPTY_SQL_MESSAGE);
}
