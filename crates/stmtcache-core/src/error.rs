//! Error types for statement cache operations.

use std::fmt;

/// SQLSTATE `0A000` (feature_not_supported).
///
/// PostgreSQL reports "cached plan must not change result type" with this
/// code. The message itself can be localized, so the code is all there is to
/// go on.
pub const SQLSTATE_FEATURE_NOT_SUPPORTED: &str = "0A000";

/// SQLSTATE `26000` (invalid_sql_statement_name).
pub const SQLSTATE_INVALID_STATEMENT_NAME: &str = "26000";

/// The primary error type for all statement cache operations.
#[derive(Debug)]
pub enum Error {
    /// Invalid construction parameters or configuration values
    Config(ConfigError),
    /// Server error reported for a query the driver ran
    Query(QueryError),
    /// The wire layer failed to deallocate invalidated statements
    Deallocate(DeallocateError),
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct QueryError {
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct DeallocateError {
    /// Names of the statements the batch tried to deallocate
    pub names: Vec<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConfigError {
    /// Create a configuration error with no underlying cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the error that caused this one.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl QueryError {
    /// Create a query error carrying a SQLSTATE code.
    pub fn new(sqlstate: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sql: None,
            sqlstate: Some(sqlstate.into()),
            message: message.into(),
            source: None,
        }
    }

    /// Record the SQL text that produced the error.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Does this error mean a cached prepared statement can no longer be used?
    ///
    /// `0A000` covers many unrelated failures, so this can report `true` for an
    /// error that had nothing to do with the cache. The only cost of that is
    /// one statement being re-prepared.
    pub fn is_statement_invalid(&self) -> bool {
        matches!(
            self.sqlstate.as_deref(),
            Some(SQLSTATE_FEATURE_NOT_SUPPORTED | SQLSTATE_INVALID_STATEMENT_NAME)
        )
    }
}

impl DeallocateError {
    pub fn new(names: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            names,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the error that caused this one.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl Error {
    /// Get SQLSTATE if available (e.g., "0A000")
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Is this a server error that invalidates a cached statement?
    pub fn is_statement_invalid(&self) -> bool {
        match self {
            Error::Query(q) => q.is_statement_invalid(),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Query(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Query error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Deallocate(e) => write!(
                f,
                "Failed to deallocate {} cached statement(s): {}",
                e.names.len(),
                e.message
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let source = match self {
            Error::Config(e) => e.source.as_deref(),
            Error::Query(e) => e.source.as_deref(),
            Error::Deallocate(e) => e.source.as_deref(),
        };
        source.map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for DeallocateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<DeallocateError> for Error {
    fn from(err: DeallocateError) -> Self {
        Error::Deallocate(err)
    }
}

/// Result type alias for statement cache operations.
pub type Result<T> = std::result::Result<T, Error>;
