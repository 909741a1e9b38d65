//! Prepared statement caching for SQL database drivers.
//!
//! A driver asks its cache for a statement description before running a
//! query. A hit means the server already holds a prepared statement for the
//! SQL text; a miss means the query runs unprepared this time. Statements that
//! leave the cache are queued until the driver has deallocated them on the
//! server.
//!
//! - [`StatementCache`] - the operations every cache supports
//! - [`LruCache`] - fixed capacity, least-recently-used eviction
//! - [`UsageThresholdCache`] - admits a statement only after repeated use
//! - [`UnlimitedCache`] - no capacity bound
//! - [`ConnectionCaches`] - the caches one connection owns, plus deallocation
//! - [`CacheConfig`] - capacities, threshold and execution mode
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stmtcache::{StatementCache, UsageThresholdCache};
//! use stmtcache_core::StatementDescription;
//!
//! let mut cache = UsageThresholdCache::new(10, 2).unwrap();
//! let sql = "SELECT $1::int + $2::int";
//!
//! assert!(cache.get(sql).is_none());
//! assert!(cache.get(sql).is_none());
//!
//! // Two misses reach the threshold: the next use will hit.
//! cache.put(Arc::new(StatementDescription::named_from_sql(sql, vec![23, 23], vec![])));
//! assert!(cache.get(sql).is_some());
//! ```

pub mod cache;
pub mod config;
pub mod connection;
pub mod lru_cache;
pub mod threshold;
pub mod unlimited;

pub use cache::StatementCache;
pub use config::{CacheConfig, QueryExecMode};
pub use connection::{BoxedCache, ConnectionCaches, Deallocate, TransactionStatus};
pub use lru_cache::LruCache;
pub use threshold::UsageThresholdCache;
pub use unlimited::UnlimitedCache;

pub use stmtcache_core::{
    ConfigError, DeallocateError, Error, FieldDescription, QueryError, Result,
    StatementDescription, statement_name,
};
