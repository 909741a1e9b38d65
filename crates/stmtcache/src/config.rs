//! Statement cache configuration.
//!
//! Capacities, the usage threshold and the default query execution mode,
//! settable with builder methods, from connection-string parameters, or
//! through serde.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stmtcache_core::{ConfigError, Error, Result};

/// Default maximum number of cached prepared statements.
pub const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 512;

/// Default maximum number of cached statement descriptions.
pub const DEFAULT_DESCRIPTION_CACHE_CAPACITY: usize = 512;

/// Default number of misses before a statement is retained, so it is served
/// from the cache on its second use.
pub const DEFAULT_USAGE_THRESHOLD: u32 = 1;

/// How the driver runs a query by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryExecMode {
    /// Prepare the statement on the server and cache it (subject to the usage threshold)
    #[default]
    CacheStatement,
    /// Cache the statement description only and run it with the unnamed statement
    CacheDescribe,
    /// Describe with the unnamed statement on every run, then execute
    DescribeExec,
    /// Execute with the unnamed statement, inferring parameter types from arguments
    Exec,
    /// Use the simple query protocol with client-side interpolation
    SimpleProtocol,
}

impl QueryExecMode {
    /// Name used in connection strings.
    pub const fn as_str(self) -> &'static str {
        match self {
            QueryExecMode::CacheStatement => "cache_statement",
            QueryExecMode::CacheDescribe => "cache_describe",
            QueryExecMode::DescribeExec => "describe_exec",
            QueryExecMode::Exec => "exec",
            QueryExecMode::SimpleProtocol => "simple_protocol",
        }
    }

    /// Does this mode keep named prepared statements on the server?
    pub const fn uses_statement_cache(self) -> bool {
        matches!(self, QueryExecMode::CacheStatement)
    }

    /// Does this mode keep statement descriptions on the client only?
    pub const fn uses_description_cache(self) -> bool {
        matches!(self, QueryExecMode::CacheDescribe)
    }
}

impl fmt::Display for QueryExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryExecMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cache_statement" => Ok(QueryExecMode::CacheStatement),
            "cache_describe" => Ok(QueryExecMode::CacheDescribe),
            "describe_exec" => Ok(QueryExecMode::DescribeExec),
            "exec" => Ok(QueryExecMode::Exec),
            "simple_protocol" => Ok(QueryExecMode::SimpleProtocol),
            other => Err(ConfigError::new(format!("invalid query exec mode: {other:?}"))),
        }
    }
}

/// Configuration for a connection's statement caches.
///
/// A capacity of zero disables the corresponding cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of prepared statements kept on the server
    pub statement_cache_capacity: usize,
    /// Maximum number of statement descriptions kept on the client
    pub description_cache_capacity: usize,
    /// Misses required before a statement is prepared and cached
    pub usage_threshold: u32,
    /// Default query execution mode
    pub exec_mode: QueryExecMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
            description_cache_capacity: DEFAULT_DESCRIPTION_CACHE_CAPACITY,
            usage_threshold: DEFAULT_USAGE_THRESHOLD,
            exec_mode: QueryExecMode::default(),
        }
    }
}

impl CacheConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prepared statement cache capacity.
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    /// Set the description cache capacity.
    pub fn description_cache_capacity(mut self, capacity: usize) -> Self {
        self.description_cache_capacity = capacity;
        self
    }

    /// Set the usage threshold.
    pub fn usage_threshold(mut self, threshold: u32) -> Self {
        self.usage_threshold = threshold;
        self
    }

    /// Set the default query execution mode.
    pub fn exec_mode(mut self, mode: QueryExecMode) -> Self {
        self.exec_mode = mode;
        self
    }

    /// Build a configuration from connection-string parameters.
    ///
    /// Recognized keys are `statement_cache_capacity`,
    /// `description_cache_capacity`, `statement_cache_usage_threshold` and
    /// `default_query_exec_mode`. Other keys belong to other layers and are
    /// skipped.
    pub fn from_params<I, K, V>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "statement_cache_capacity" => {
                    config.statement_cache_capacity = parse_param(key, value)?;
                }
                "description_cache_capacity" => {
                    config.description_cache_capacity = parse_param(key, value)?;
                }
                "statement_cache_usage_threshold" => {
                    config.usage_threshold = parse_param(key, value)?;
                }
                "default_query_exec_mode" => {
                    config.exec_mode = value.parse()?;
                }
                _ => {}
            }
        }

        Ok(config)
    }
}

fn parse_param<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse::<T>().map_err(|e| {
        Error::Config(
            ConfigError::new(format!("invalid value for {key}: {value:?}")).with_source(e),
        )
    })
}
