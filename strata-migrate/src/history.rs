//! Migration history tracking.
//!
//! [`RecordStore`] owns the bookkeeping table: it bootstraps it, seeds records
//! for files it has not seen yet, and answers the lookups the reconciler and
//! executor need.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info};

use crate::batch::UNASSIGNED_BATCH;
use crate::error::{MigrateResult, MigrationError};
use crate::file::DiscoveredFile;
use crate::id::{IdAllocator, TIMESTAMP_ID_FLOOR};
use crate::script::Direction;
use crate::transport::{Fields, Row, SqlTransport, SqlValue};

/// A persisted migration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Ordering key.
    pub migration_id: i64,
    /// Batch the record was last applied in, 0 when never applied.
    pub batch_id: i64,
    /// `{name}.{timestamp}` of the backing file.
    pub name: String,
    /// Whether the migration is currently applied.
    pub migrated: bool,
    /// Creation time as reported by the database.
    pub created_at: Option<String>,
    /// Last update time as reported by the database.
    pub updated_at: Option<String>,
}

/// A record eligible for the current run, before it is matched to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Ordering key.
    pub migration_id: i64,
    /// Name of the backing file.
    pub name: String,
}

/// Store for the bookkeeping table.
pub struct RecordStore<T: SqlTransport> {
    transport: T,
    table: String,
}

impl<T: SqlTransport> RecordStore<T> {
    /// Create a store over `table`.
    pub fn new(transport: T, table: impl Into<String>) -> Self {
        Self {
            transport,
            table: table.into(),
        }
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Name of the bookkeeping table.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn placeholder(&self, index: usize) -> String {
        self.transport.dialect().placeholder(index)
    }

    /// Create the bookkeeping table if it does not exist.
    pub async fn ensure_table(&self) -> MigrateResult<()> {
        if self.transport.table_exists(&self.table).await? {
            return Ok(());
        }

        let ddl = self.transport.dialect().create_migrations_table(&self.table);
        self.transport.execute(&ddl, &[]).await?;
        info!(table = %self.table, "Created migrations table");
        Ok(())
    }

    /// Check whether a record with `name` exists.
    pub async fn exists(&self, name: &str) -> MigrateResult<bool> {
        let sql = format!(
            "SELECT count(*) AS taken FROM {} WHERE name = {}",
            self.table,
            self.placeholder(1)
        );
        let rows = self.transport.query(&sql, &[SqlValue::from(name)]).await?;

        let value = rows
            .first()
            .and_then(|row| row.get("taken"))
            .cloned()
            .unwrap_or(SqlValue::Null);

        match value.as_integer() {
            Some(taken) => Ok(taken > 0),
            None => Err(MigrationError::AmbiguousExistence {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Insert a zero-state record for every discovered file without one.
    ///
    /// Files must be in ascending timestamp order; each new record's id is the
    /// file's 1-based position, raised where needed so ids seeded together
    /// keep their file order. Per-file failures are collected and returned
    /// together. Returns the names that were seeded.
    pub async fn seed(&self, files: &[DiscoveredFile]) -> MigrateResult<Vec<String>> {
        let existing = self.all().await?;
        let mut taken: HashSet<i64> = existing.iter().map(|r| r.migration_id).collect();
        let mut highest_sequential = existing
            .iter()
            .map(|r| r.migration_id)
            .filter(|id| *id < TIMESTAMP_ID_FLOOR)
            .max()
            .unwrap_or(0);

        let mut last_allocated = 0;
        let mut seeded = Vec::new();
        let mut failures = Vec::new();

        for (index, file) in files.iter().enumerate() {
            match self.exists(&file.name).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    failures.push(format!("{}: {}", file.name, e));
                    continue;
                }
            }

            let id = match IdAllocator::sequential(
                index + 1,
                last_allocated + 1,
                highest_sequential,
                |id| taken.contains(&id),
            ) {
                Ok(id) => id,
                Err(e) => {
                    failures.push(format!("{}: {}", file.name, e));
                    continue;
                }
            };

            match self.insert(id, &file.name).await {
                Ok(row_id) => {
                    info!(name = %file.name, migration_id = id, row_id, "Seeded migration record");
                    taken.insert(id);
                    highest_sequential = highest_sequential.max(id);
                    last_allocated = id;
                    seeded.push(file.name.clone());
                }
                Err(e) => failures.push(format!("{}: {}", file.name, e)),
            }
        }

        if failures.is_empty() {
            Ok(seeded)
        } else {
            Err(MigrationError::Seeding(failures))
        }
    }

    /// Insert the record for an explicitly created migration.
    ///
    /// The id is a microsecond wall-clock value above every stored id.
    pub async fn record_created(&self, name: &str) -> MigrateResult<i64> {
        let sql = format!("SELECT MAX(migration_id) AS highest FROM {}", self.table);
        let rows = self.transport.query(&sql, &[]).await?;
        let highest = match first_value(&rows, "highest") {
            None => 0,
            Some(value) => value
                .as_integer()
                .ok_or_else(|| MigrationError::InvalidMigrationId {
                    name: name.to_string(),
                    value: value.to_string(),
                })?,
        };

        let id = IdAllocator::timestamp(Utc::now(), highest);
        let row_id = self.insert(id, name).await?;
        info!(name, migration_id = id, row_id, "Created migration record");
        Ok(id)
    }

    async fn insert(&self, migration_id: i64, name: &str) -> MigrateResult<i64> {
        let mut fields = Fields::new();
        fields.insert("migration_id".into(), migration_id.into());
        fields.insert("batch_id".into(), UNASSIGNED_BATCH.into());
        fields.insert("name".into(), name.into());
        fields.insert("migrated".into(), 0i64.into());
        self.transport.insert_record(&fields, &self.table).await
    }

    /// Highest batch among applied records, 0 when nothing is applied.
    pub async fn last_applied_batch(&self) -> MigrateResult<i64> {
        let sql = format!(
            "SELECT MAX(batch_id) AS last_batch FROM {} WHERE migrated = {}",
            self.table,
            self.placeholder(1)
        );
        self.max_batch(&sql, &[SqlValue::Int(1)]).await
    }

    /// Highest batch ever assigned, applied or not.
    pub async fn latest_batch(&self) -> MigrateResult<i64> {
        let sql = format!("SELECT MAX(batch_id) AS last_batch FROM {}", self.table);
        self.max_batch(&sql, &[]).await
    }

    async fn max_batch(&self, sql: &str, params: &[SqlValue]) -> MigrateResult<i64> {
        let rows = self.transport.query(sql, params).await?;
        match first_value(&rows, "last_batch") {
            None => Ok(UNASSIGNED_BATCH),
            Some(value) => value
                .as_integer()
                .ok_or_else(|| MigrationError::InvalidBatchId(value.to_string())),
        }
    }

    /// Records eligible for a run in `direction`, in execution order.
    ///
    /// `batch` narrows the set to one batch; it is only meaningful for down.
    pub async fn candidates(
        &self,
        direction: Direction,
        batch: Option<i64>,
    ) -> MigrateResult<Vec<Candidate>> {
        let mut sql = format!(
            "SELECT migration_id, name FROM {} WHERE migrated = {}",
            self.table,
            self.placeholder(1)
        );
        let mut params = vec![SqlValue::Int(direction.candidate_flag())];

        if let Some(batch) = batch {
            sql.push_str(&format!(" AND batch_id = {}", self.placeholder(2)));
            params.push(SqlValue::Int(batch));
        }
        sql.push_str(&format!(" ORDER BY migration_id {}", direction.order()));

        let rows = self.transport.query(&sql, &params).await?;
        rows.iter()
            .map(|row| {
                let name = read_name(row)?;
                let migration_id = read_migration_id(row, &name)?;
                Ok(Candidate { migration_id, name })
            })
            .collect()
    }

    /// Every record, ascending by `migration_id`.
    pub async fn all(&self) -> MigrateResult<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT migration_id, batch_id, name, migrated, created_at, updated_at \
             FROM {} ORDER BY migration_id ASC",
            self.table
        );
        let rows = self.transport.query(&sql, &[]).await?;
        rows.iter().map(read_record).collect()
    }

    /// Delete the record with `name`.
    pub async fn delete(&self, name: &str) -> MigrateResult<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE name = {}",
            self.table,
            self.placeholder(1)
        );
        self.transport.execute(&sql, &[SqlValue::from(name)]).await
    }

    /// Checkpoint a migration after all of its statements succeeded.
    ///
    /// Up sets the flag and stamps `batch`; down clears the flag and leaves
    /// the batch untouched.
    pub async fn mark(
        &self,
        migration_id: i64,
        direction: Direction,
        batch: i64,
    ) -> MigrateResult<u64> {
        let mut fields = Fields::new();
        fields.insert("migration_id".into(), migration_id.into());
        fields.insert("migrated".into(), direction.target_flag().into());
        if direction == Direction::Up {
            fields.insert("batch_id".into(), batch.into());
        }
        fields.insert(
            "updated_at".into(),
            Utc::now().format("%Y-%m-%d %H:%M:%S").to_string().into(),
        );

        let affected = self
            .transport
            .update_record(&fields, &self.table, "migration_id")
            .await?;
        debug!(migration_id, affected, "Checkpointed migration record");
        Ok(affected)
    }
}

fn read_name(row: &Row) -> MigrateResult<String> {
    match row.get("name") {
        Some(SqlValue::String(name)) => Ok(name.clone()),
        other => Err(MigrationError::database(format!(
            "name of migration is not a string: {}",
            other.cloned().unwrap_or(SqlValue::Null)
        ))),
    }
}

fn read_migration_id(row: &Row, name: &str) -> MigrateResult<i64> {
    let value = row.get("migration_id").cloned().unwrap_or(SqlValue::Null);
    value
        .as_integer()
        .ok_or_else(|| MigrationError::InvalidMigrationId {
            name: name.to_string(),
            value: value.to_string(),
        })
}

fn read_record(row: &Row) -> MigrateResult<MigrationRecord> {
    let name = read_name(row)?;
    let migration_id = read_migration_id(row, &name)?;

    let batch_id = match row.get("batch_id").filter(|v| !v.is_null()) {
        None => UNASSIGNED_BATCH,
        Some(value) => value
            .as_integer()
            .ok_or_else(|| MigrationError::InvalidBatchId(value.to_string()))?,
    };

    let migrated = match row.get("migrated") {
        Some(SqlValue::Bool(b)) => *b,
        Some(value) => value.as_integer() == Some(1),
        None => false,
    };

    Ok(MigrationRecord {
        migration_id,
        batch_id,
        name,
        migrated,
        created_at: read_text(row, "created_at"),
        updated_at: read_text(row, "updated_at"),
    })
}

fn read_text(row: &Row, column: &str) -> Option<String> {
    match row.get(column).filter(|v| !v.is_null())? {
        SqlValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Non-NULL value of `column` in the first row.
fn first_value<'a>(rows: &'a [Row], column: &str) -> Option<&'a SqlValue> {
    rows.first()
        .and_then(|row| row.get(column))
        .filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, SqlValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_read_migration_id_variants() {
        for value in [
            SqlValue::Int(3),
            SqlValue::Int32(3),
            SqlValue::UInt(3),
            SqlValue::from("3"),
        ] {
            let r = row(&[("name", SqlValue::from("a.1")), ("migration_id", value)]);
            assert_eq!(read_migration_id(&r, "a.1").unwrap(), 3);
        }
    }

    #[test]
    fn test_read_migration_id_invalid() {
        let r = row(&[("name", SqlValue::from("a.1")), ("migration_id", SqlValue::from("three"))]);
        let err = read_migration_id(&r, "a.1").unwrap_err();
        assert!(matches!(err, MigrationError::InvalidMigrationId { .. }));
        assert!(err.is_lookup_ambiguity());
    }

    #[test]
    fn test_read_record() {
        let r = row(&[
            ("migration_id", SqlValue::Int(2)),
            ("batch_id", SqlValue::from("1717243200")),
            ("name", SqlValue::from("add_x.1")),
            ("migrated", SqlValue::Int32(1)),
            ("created_at", SqlValue::from("2024-06-01 12:00:00")),
            ("updated_at", SqlValue::Null),
        ]);

        let record = read_record(&r).unwrap();
        assert_eq!(record.migration_id, 2);
        assert_eq!(record.batch_id, 1_717_243_200);
        assert!(record.migrated);
        assert_eq!(record.created_at.as_deref(), Some("2024-06-01 12:00:00"));
        assert_eq!(record.updated_at, None);
    }

    #[test]
    fn test_first_value_skips_null() {
        // MAX over an empty table
        let empty = vec![row(&[("last_batch", SqlValue::Null)])];
        assert_eq!(first_value(&empty, "last_batch"), None);
        assert_eq!(first_value(&[], "last_batch"), None);

        let rows = vec![row(&[("last_batch", SqlValue::Int(7))])];
        assert_eq!(first_value(&rows, "last_batch"), Some(&SqlValue::Int(7)));

        let r = row(&[
            ("migration_id", SqlValue::Int(1)),
            ("batch_id", SqlValue::Null),
            ("name", SqlValue::from("a.1")),
        ]);
        assert_eq!(read_record(&r).unwrap().batch_id, UNASSIGNED_BATCH);
    }

    #[test]
    fn test_read_name_must_be_text() {
        let r = row(&[("name", SqlValue::Int(1))]);
        assert!(read_name(&r).is_err());
    }
}
