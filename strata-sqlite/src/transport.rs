//! SQLite implementation of the migration transport.

use rusqlite::params_from_iter;
use strata_migrate::{Dialect, Fields, MigrateResult, Row, SqlTransport, SqlValue};
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};
use crate::types::{from_sqlite, to_params};

/// A migration transport backed by a single SQLite connection.
///
/// # Example
///
/// ```rust,ignore
/// use strata_sqlite::{SqliteConfig, SqliteTransport};
///
/// let transport = SqliteTransport::open(SqliteConfig::file("app.db")).await?;
/// ```
pub struct SqliteTransport {
    conn: Connection,
    config: SqliteConfig,
}

impl SqliteTransport {
    /// Open a connection and apply the configuration's init SQL.
    pub async fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => Connection::open(path.clone()).await?,
        };

        let init_sql = config.init_sql();
        conn.call(move |conn| {
            conn.execute_batch(&init_sql)?;
            Ok(())
        })
        .await?;

        info!(path = ?config.path, "SQLite transport opened");
        Ok(Self { conn, config })
    }

    /// Open a transport from a URL such as `sqlite://app.db`.
    pub async fn connect(url: impl AsRef<str>) -> SqliteResult<Self> {
        Self::open(SqliteConfig::from_url(url)?).await
    }

    /// Open an in-memory database.
    pub async fn memory() -> SqliteResult<Self> {
        Self::open(SqliteConfig::memory()).await
    }

    /// Get the configuration.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Execute a statement, returning the number of affected rows.
    ///
    /// Without parameters the SQL runs as a batch, so comments and several
    /// statements are accepted.
    pub async fn execute_sql(&self, sql: &str, params: &[SqlValue]) -> SqliteResult<u64> {
        let sql = sql.to_string();
        let params = to_params(params);
        debug!(sql = %sql, params = params.len(), "Executing statement");

        let affected = self
            .conn
            .call(move |conn| {
                if params.is_empty() {
                    conn.execute_batch(&sql)?;
                    Ok(conn.changes())
                } else {
                    let mut stmt = conn.prepare(&sql)?;
                    Ok(stmt.execute(params_from_iter(params.iter()))? as u64)
                }
            })
            .await?;
        Ok(affected)
    }

    /// Run a query and return every row keyed by column name.
    pub async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> SqliteResult<Vec<Row>> {
        let sql = sql.to_string();
        let params = to_params(params);
        debug!(sql = %sql, params = params.len(), "Executing query");

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> = stmt
                    .column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect();

                let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                    let mut map = Row::new();
                    for (i, col) in columns.iter().enumerate() {
                        map.insert(col.clone(), from_sqlite(row.get_ref(i)?));
                    }
                    Ok(map)
                })?;

                let results: Result<Vec<_>, _> = rows.collect();
                Ok(results?)
            })
            .await?;
        Ok(rows)
    }

    async fn insert(&self, fields: &Fields, table: &str) -> SqliteResult<i64> {
        if fields.is_empty() {
            return Err(SqliteError::query("cannot insert a record without fields"));
        }

        let columns: Vec<String> = fields.keys().map(|k| quote_identifier(k)).collect();
        let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        let params = to_params(&fields.values().cloned().collect::<Vec<_>>());
        debug!(sql = %sql, "Inserting record");

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(&sql, params_from_iter(params.iter()))?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    async fn update(&self, fields: &Fields, table: &str, key_column: &str) -> SqliteResult<u64> {
        let key = fields.get(key_column).ok_or_else(|| {
            SqliteError::query(format!("update is missing key column '{}'", key_column))
        })?;

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for (column, value) in fields.iter().filter(|(c, _)| c.as_str() != key_column) {
            values.push(value.clone());
            assignments.push(format!("{} = ?{}", quote_identifier(column), values.len()));
        }
        if assignments.is_empty() {
            return Ok(0);
        }
        values.push(key.clone());

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_identifier(table),
            assignments.join(", "),
            quote_identifier(key_column),
            values.len()
        );
        self.execute_sql(&sql, &values).await
    }
}

#[async_trait::async_trait]
impl SqlTransport for SqliteTransport {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        Ok(self.execute_sql(sql, params).await?)
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<Row>> {
        Ok(self.query_rows(sql, params).await?)
    }

    async fn table_exists(&self, table: &str) -> MigrateResult<bool> {
        let rows = self
            .query_rows(
                "SELECT count(*) AS found FROM sqlite_master WHERE type = 'table' AND name = ?1",
                &[SqlValue::from(table)],
            )
            .await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("found"))
            .and_then(SqlValue::as_integer)
            .is_some_and(|n| n > 0))
    }

    async fn insert_record(&self, fields: &Fields, table: &str) -> MigrateResult<i64> {
        Ok(self.insert(fields, table).await?)
    }

    async fn update_record(
        &self,
        fields: &Fields,
        table: &str,
        key_column: &str,
    ) -> MigrateResult<u64> {
        Ok(self.update(fields, table, key_column).await?)
    }
}

/// Quote a SQLite identifier.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
