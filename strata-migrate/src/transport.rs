//! SQL transport contract consumed by the engine.
//!
//! The engine never talks to a driver directly. Everything it needs from the
//! database goes through [`SqlTransport`], and every value it reads back goes
//! through [`SqlValue::as_integer`] before it is trusted.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::MigrateResult;

/// A single row returned by [`SqlTransport::query`], keyed by column name.
pub type Row = BTreeMap<String, SqlValue>;

/// Column values passed to [`SqlTransport::insert_record`] and
/// [`SqlTransport::update_record`].
pub type Fields = BTreeMap<String, SqlValue>;

/// A value crossing the transport boundary.
///
/// Drivers disagree on how they hand back integers (some as `i64`, some as a
/// narrower type, some as text), so the variants mirror what drivers produce
/// rather than what the engine wants.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 32-bit signed integer.
    Int32(i32),
    /// Unsigned integer (`BIGINT UNSIGNED`).
    UInt(u64),
    /// Floating point.
    Float(f64),
    /// Text.
    String(String),
}

impl SqlValue {
    /// Normalize this value to the engine's canonical integer type.
    ///
    /// Numeric strings are accepted. Floats, booleans, NULL and any other
    /// text yield `None`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Int32(i) => Some(i64::from(*i)),
            Self::UInt(u) => i64::try_from(*u).ok(),
            Self::String(s) => s.trim().parse().ok(),
            Self::Null | Self::Bool(_) | Self::Float(_) => None,
        }
    }

    /// Check if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as a string slice, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Int32(i) => write!(f, "{}", i),
            Self::UInt(u) => write!(f, "{}", u),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// SQL dialect spoken by a transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// MySQL / MariaDB.
    #[default]
    MySql,
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// Render the positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${}", index),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }

    /// Render the DDL for the bookkeeping table.
    pub fn create_migrations_table(&self, table: &str) -> String {
        match self {
            Self::MySql => format!(
                "CREATE TABLE {table} (
    id INT(6) UNSIGNED AUTO_INCREMENT PRIMARY KEY,
    migration_id BIGINT UNSIGNED,
    batch_id BIGINT UNSIGNED,
    name VARCHAR(1000) NOT NULL,
    migrated TINYINT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
)"
            ),
            Self::Postgres => format!(
                "CREATE TABLE {table} (
    id BIGSERIAL PRIMARY KEY,
    migration_id BIGINT,
    batch_id BIGINT,
    name VARCHAR(1000) NOT NULL,
    migrated SMALLINT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"
            ),
            Self::Sqlite => format!(
                "CREATE TABLE {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    migration_id BIGINT,
    batch_id BIGINT,
    name VARCHAR(1000) NOT NULL,
    migrated SMALLINT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)"
            ),
        }
    }
}

/// The narrow database contract the engine depends on.
///
/// Implementations run each call to completion before returning; the engine
/// never issues two calls concurrently.
#[async_trait::async_trait]
pub trait SqlTransport: Send + Sync {
    /// Dialect used to render DDL and placeholders.
    fn dialect(&self) -> Dialect;

    /// Execute a raw statement, returning the number of affected rows.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64>;

    /// Run a query and return every row.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>>;

    /// Check whether a table exists.
    async fn table_exists(&self, table: &str) -> MigrateResult<bool>;

    /// Insert a record and return its generated primary key.
    async fn insert_record(&self, fields: &Fields, table: &str) -> MigrateResult<i64>;

    /// Update the record(s) whose `key_column` equals `fields[key_column]`,
    /// returning the number of affected rows.
    async fn update_record(
        &self,
        fields: &Fields,
        table: &str,
        key_column: &str,
    ) -> MigrateResult<u64>;
}
