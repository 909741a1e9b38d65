//! Core types for prepared statement caching.
//!
//! This crate provides the values shared between a driver and its statement
//! caches:
//!
//! - [`StatementDescription`] and [`FieldDescription`] for server-prepared statements
//! - [`statement_name`] for deterministic server-side statement names
//! - [`Error`] and [`Result`] for fallible cache construction and maintenance

pub mod error;
pub mod statement;

pub use error::{ConfigError, DeallocateError, Error, QueryError, Result};
pub use statement::{
    FieldDescription, Oid, STATEMENT_NAME_PREFIX, StatementDescription, statement_name,
};
