//! Metadata describing server-side prepared statements.
//!
//! A [`StatementDescription`] is produced by the driver once the server has
//! answered `PARSE`/`DESCRIBE` for a SQL text. The caches only ever hold it
//! behind an `Arc` and never modify it after it is stored.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// PostgreSQL type Object ID.
pub type Oid = u32;

/// Prefix of every name produced by [`statement_name`].
pub const STATEMENT_NAME_PREFIX: &str = "stmtcache_";

/// Number of digest bytes kept in a generated statement name.
const NAME_DIGEST_BYTES: usize = 24;

/// Description of one result column, as reported by `RowDescription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescription {
    /// Column name (or alias)
    pub name: String,
    /// OID of the source table, 0 if the column is not a table column
    pub table_oid: Oid,
    /// Attribute number within the source table, 0 if not a table column
    pub table_attribute_number: u16,
    /// OID of the column's data type
    pub data_type_oid: Oid,
    /// Size of the data type (negative for variable-length types)
    pub data_type_size: i16,
    /// Type modifier (e.g. varchar length), -1 if none
    pub type_modifier: i32,
    /// Format code: 0 = text, 1 = binary
    pub format: i16,
}

impl FieldDescription {
    /// Create a text-format field that is not tied to a table column.
    pub fn new(name: impl Into<String>, data_type_oid: Oid) -> Self {
        Self {
            name: name.into(),
            table_oid: 0,
            table_attribute_number: 0,
            data_type_oid,
            data_type_size: -1,
            type_modifier: -1,
            format: 0,
        }
    }
}

/// A statement the server has prepared, keyed by its SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementDescription {
    name: String,
    sql: String,
    param_oids: Vec<Oid>,
    fields: Vec<FieldDescription>,
}

impl StatementDescription {
    /// Create a description.
    ///
    /// This is typically called by the driver after the server has described
    /// the statement, not by users directly.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        sql: impl Into<String>,
        param_oids: Vec<Oid>,
        fields: Vec<FieldDescription>,
    ) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            param_oids,
            fields,
        }
    }

    /// Create a description whose name is derived from the SQL text with
    /// [`statement_name`].
    #[must_use]
    pub fn named_from_sql(
        sql: impl Into<String>,
        param_oids: Vec<Oid>,
        fields: Vec<FieldDescription>,
    ) -> Self {
        let sql = sql.into();
        let name = statement_name(&sql);
        Self::new(name, sql, param_oids, fields)
    }

    /// Server-side statement name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The SQL text this statement was prepared from.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter type OIDs inferred by the server.
    pub fn param_oids(&self) -> &[Oid] {
        &self.param_oids
    }

    /// Result columns; empty for statements that return no rows.
    pub fn fields(&self) -> &[FieldDescription] {
        &self.fields
    }

    /// Number of bind parameters the statement expects.
    pub fn param_count(&self) -> usize {
        self.param_oids.len()
    }
}

/// Derive the server-side statement name for a SQL text.
///
/// The name is [`STATEMENT_NAME_PREFIX`] followed by the hex encoding of the
/// first 24 bytes of the SHA-256 digest of `sql`, so equal SQL texts always get
/// equal names and the name fits PostgreSQL's 63-byte identifier limit.
pub fn statement_name(sql: &str) -> String {
    let digest = Sha256::digest(sql.as_bytes());
    let mut name = String::with_capacity(STATEMENT_NAME_PREFIX.len() + NAME_DIGEST_BYTES * 2);
    name.push_str(STATEMENT_NAME_PREFIX);
    name.push_str(&hex::encode(&digest[..NAME_DIGEST_BYTES]));
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_name_is_stable() {
        let a = statement_name("SELECT $1::int + $2::int");
        let b = statement_name("SELECT $1::int + $2::int");
        assert_eq!(a, b);
        assert!(a.starts_with(STATEMENT_NAME_PREFIX));
        assert_eq!(a.len(), STATEMENT_NAME_PREFIX.len() + 48);
        assert!(a.len() <= 63);
    }

    #[test]
    fn test_statement_name_differs_per_sql() {
        assert_ne!(statement_name("SELECT 1"), statement_name("SELECT 2"));
    }

    #[test]
    fn test_statement_name_known_digest() {
        // sha256("") = e3b0c442 98fc1c14 9afbf4c8 996fb924 27ae41e4 649b934c ...
        assert_eq!(
            statement_name(""),
            "stmtcache_e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934c"
        );
    }

    #[test]
    fn test_named_from_sql() {
        let sd = StatementDescription::named_from_sql(
            "SELECT name FROM users WHERE id = $1",
            vec![23],
            vec![FieldDescription::new("name", 25)],
        );
        assert_eq!(sd.name(), statement_name("SELECT name FROM users WHERE id = $1"));
        assert_eq!(sd.sql(), "SELECT name FROM users WHERE id = $1");
        assert_eq!(sd.param_oids(), &[23]);
        assert_eq!(sd.param_count(), 1);
        assert_eq!(sd.fields().len(), 1);
        assert_eq!(sd.fields()[0].name, "name");
        assert_eq!(sd.fields()[0].format, 0);
    }

    #[test]
    fn test_description_serde_roundtrip() {
        let sd = StatementDescription::new(
            "stmtcache_x",
            "SELECT 1",
            Vec::new(),
            vec![FieldDescription::new("?column?", 23)],
        );
        let json = serde_json::to_string(&sd).unwrap();
        let back: StatementDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(sd, back);
    }
}
