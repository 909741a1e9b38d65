//! The statement caches owned by one connection.
//!
//! [`ConnectionCaches`] holds the prepared statement cache and the
//! description cache a connection uses, keeps them in step when the server
//! reports that statements are gone, and drives deallocation of invalidated
//! statements through the wire layer ([`Deallocate`]).

use std::sync::Arc;

use stmtcache_core::{DeallocateError, QueryError, Result, StatementDescription};

use crate::cache::StatementCache;
use crate::config::CacheConfig;
use crate::lru_cache::LruCache;
use crate::threshold::UsageThresholdCache;

/// A boxed cache owned by a connection.
pub type BoxedCache = Box<dyn StatementCache + Send>;

/// Command tags after which no server-side prepared statement survives.
const RESET_COMMAND_TAGS: [&str; 2] = ["DEALLOCATE ALL", "DISCARD ALL"];

/// Transaction status reported by the server in `ReadyForQuery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    /// Not in a transaction block ('I')
    #[default]
    Idle,
    /// In a transaction block ('T')
    InTransaction,
    /// In a failed transaction block ('E')
    InFailed,
}

impl TransactionStatus {
    /// Decode the status byte of a `ReadyForQuery` message.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'I' => Some(TransactionStatus::Idle),
            b'T' => Some(TransactionStatus::InTransaction),
            b'E' => Some(TransactionStatus::InFailed),
            _ => None,
        }
    }
}

/// Wire-layer hook that closes server-side prepared statements.
pub trait Deallocate {
    /// Deallocate the named statements, as one batch where possible.
    ///
    /// Returns once the server has acknowledged every statement, or with the
    /// first error.
    fn deallocate(&mut self, names: &[&str]) -> Result<()>;
}

/// Statement caches for a single connection.
///
/// A connection serves one operation at a time, so nothing here is
/// synchronized. Wrap the owning connection in a mutex to share it.
pub struct ConnectionCaches {
    statements: Option<BoxedCache>,
    descriptions: Option<BoxedCache>,
}

impl std::fmt::Debug for ConnectionCaches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCaches")
            .field("statements", &self.statements.as_ref().map(|c| c.len()))
            .field("descriptions", &self.descriptions.as_ref().map(|c| c.len()))
            .finish()
    }
}

impl ConnectionCaches {
    /// Build the caches the configured execution mode needs.
    ///
    /// `CacheStatement` gets a [`UsageThresholdCache`] and `CacheDescribe` an
    /// [`LruCache`]; a capacity of zero leaves the cache out.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let statements: Option<BoxedCache> = if config.exec_mode.uses_statement_cache()
            && config.statement_cache_capacity > 0
        {
            Some(Box::new(UsageThresholdCache::new(
                config.statement_cache_capacity,
                config.usage_threshold,
            )?))
        } else {
            None
        };

        let descriptions: Option<BoxedCache> = if config.exec_mode.uses_description_cache()
            && config.description_cache_capacity > 0
        {
            Some(Box::new(LruCache::new(config.description_cache_capacity)?))
        } else {
            None
        };

        tracing::debug!(
            exec_mode = %config.exec_mode,
            statement_cache = statements.is_some(),
            description_cache = descriptions.is_some(),
            usage_threshold = config.usage_threshold,
            "Built connection statement caches"
        );

        Ok(Self::with_caches(statements, descriptions))
    }

    /// Use caller-supplied cache implementations.
    pub fn with_caches(statements: Option<BoxedCache>, descriptions: Option<BoxedCache>) -> Self {
        Self {
            statements,
            descriptions,
        }
    }

    /// No caching at all: every query runs unprepared.
    pub fn disabled() -> Self {
        Self::with_caches(None, None)
    }

    /// The prepared statement cache, if enabled.
    pub fn statement_cache(&mut self) -> Option<&mut (dyn StatementCache + Send + 'static)> {
        self.statements.as_deref_mut()
    }

    /// The description cache, if enabled.
    pub fn description_cache(&mut self) -> Option<&mut (dyn StatementCache + Send + 'static)> {
        self.descriptions.as_deref_mut()
    }

    fn caches_mut(&mut self) -> impl Iterator<Item = &mut BoxedCache> {
        self.statements.iter_mut().chain(self.descriptions.iter_mut())
    }

    /// Invalidate `sql` in every cache.
    pub fn invalidate(&mut self, sql: &str) {
        for cache in self.caches_mut() {
            cache.invalidate(sql);
        }
    }

    /// Invalidate every cached statement in every cache.
    pub fn invalidate_all(&mut self) {
        for cache in self.caches_mut() {
            cache.invalidate_all();
        }
    }

    /// Inspect the command tag of a completed command.
    ///
    /// `DEALLOCATE ALL` and `DISCARD ALL` drop every prepared statement on the
    /// server, so the caches are invalidated to match. Returns whether that
    /// happened.
    pub fn observe_command_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if !RESET_COMMAND_TAGS
            .iter()
            .any(|reset| tag.eq_ignore_ascii_case(reset))
        {
            return false;
        }

        tracing::debug!(tag = %tag, "Server dropped all prepared statements");
        self.invalidate_all();
        true
    }

    /// Inspect an error returned for `sql`.
    ///
    /// If the error means the cached statement can no longer be used, `sql`
    /// is invalidated so the next run prepares it afresh. Returns whether that
    /// happened.
    pub fn observe_error(&mut self, sql: &str, err: &QueryError) -> bool {
        if !err.is_statement_invalid() {
            return false;
        }

        tracing::debug!(
            sqlstate = err.sqlstate.as_deref().unwrap_or_default(),
            "Invalidating statement after server error"
        );
        self.invalidate(sql);
        true
    }

    /// Statements waiting for deallocation in the prepared statement cache.
    pub fn pending_deallocation(&self) -> &[Arc<StatementDescription>] {
        match self.statements.as_deref() {
            Some(cache) => cache.get_invalidated(),
            None => &[],
        }
    }

    /// Deallocate invalidated statements before the next exchange with the
    /// server.
    ///
    /// Nothing is sent while the transaction has failed, since the server
    /// would reject the commands; the queue is kept for the next attempt. On
    /// success the invalidation queues are cleared and the number of
    /// deallocated statements is returned. On failure the queue is kept.
    pub fn deallocate_invalidated<D>(
        &mut self,
        status: TransactionStatus,
        wire: &mut D,
    ) -> Result<usize>
    where
        D: Deallocate + ?Sized,
    {
        if status == TransactionStatus::InFailed {
            let pending = self.pending_deallocation().len();
            if pending > 0 {
                tracing::warn!(
                    pending = pending,
                    "Deferring statement deallocation while transaction is failed"
                );
            }
            return Ok(0);
        }

        // Described-only statements hold nothing on the server.
        if let Some(descriptions) = self.descriptions.as_deref_mut() {
            descriptions.remove_invalidated();
        }

        let Some(statements) = self.statements.as_deref_mut() else {
            return Ok(0);
        };

        let names: Vec<&str> = statements
            .get_invalidated()
            .iter()
            .map(|sd| sd.name())
            .collect();
        if names.is_empty() {
            return Ok(0);
        }

        if let Err(e) = wire.deallocate(&names) {
            tracing::warn!(
                count = names.len(),
                error = %e,
                "Failed to deallocate cached statements"
            );
            let names = names.iter().map(|name| (*name).to_string()).collect();
            return Err(
                DeallocateError::new(names, "failed to deallocate cached statement(s)")
                    .with_source(e)
                    .into(),
            );
        }

        let count = names.len();
        tracing::debug!(count = count, "Deallocated invalidated statements");
        statements.remove_invalidated();
        Ok(count)
    }
}
