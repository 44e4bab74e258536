//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use strata::migrate::{
    Fields, MigrationConfig, MigrationEngine, MigrationRecord, SqlTransport, SqlValue,
};
use strata::sqlite::SqliteTransport;
use tempfile::TempDir;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A scratch migrations directory plus an engine over in-memory SQLite.
pub struct Harness {
    pub dir: TempDir,
    pub engine: MigrationEngine<SqliteTransport>,
}

impl Harness {
    pub async fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let transport = SqliteTransport::memory().await.unwrap();
        let engine = MigrationEngine::new(config_for(dir.path()), transport).unwrap();
        Self { dir, engine }
    }

    pub fn migrations_dir(&self) -> PathBuf {
        migrations_dir(self.dir.path())
    }

    /// Write `{name}.{timestamp}.sql` and return its record name.
    pub fn write(&self, name: &str, timestamp: i64, content: &str) -> String {
        write_migration(&self.migrations_dir(), name, timestamp, content)
    }

    pub fn transport(&self) -> &SqliteTransport {
        self.engine.store().transport()
    }

    pub async fn records(&self) -> Vec<MigrationRecord> {
        self.engine.store().all().await.unwrap()
    }

    pub async fn record(&self, name: &str) -> Option<MigrationRecord> {
        self.records().await.into_iter().find(|r| r.name == name)
    }

    /// Insert an unapplied record directly, bypassing seeding.
    pub async fn insert_record(&self, name: &str, migration_id: i64) {
        self.engine.store().ensure_table().await.unwrap();
        let mut fields = Fields::new();
        fields.insert("migration_id".into(), SqlValue::Int(migration_id));
        fields.insert("batch_id".into(), SqlValue::Int(0));
        fields.insert("name".into(), SqlValue::from(name));
        fields.insert("migrated".into(), SqlValue::Int(0));
        self.transport().insert_record(&fields, "migrations").await.unwrap();
    }

    pub async fn has_table(&self, table: &str) -> bool {
        self.transport().table_exists(table).await.unwrap()
    }

    /// Schema objects other than the bookkeeping table, as `type:name`.
    pub async fn schema(&self) -> Vec<String> {
        let rows = self
            .transport()
            .query(
                "SELECT type, name FROM sqlite_master \
                 WHERE name NOT IN ('migrations', 'sqlite_sequence') ORDER BY type, name",
                &[],
            )
            .await
            .unwrap();
        rows.iter()
            .map(|row| {
                let text = |col: &str| match row.get(col) {
                    Some(SqlValue::String(s)) => s.clone(),
                    other => panic!("unexpected {col}: {other:?}"),
                };
                format!("{}:{}", text("type"), text("name"))
            })
            .collect()
    }
}

pub fn migrations_dir(root: &Path) -> PathBuf {
    root.join("migrations")
}

pub fn config_for(root: &Path) -> MigrationConfig {
    MigrationConfig::new().migrations_dir(migrations_dir(root))
}

pub fn write_migration(dir: &Path, name: &str, timestamp: i64, content: &str) -> String {
    std::fs::create_dir_all(dir).unwrap();
    let full_name = format!("{}.{}", name, timestamp);
    std::fs::write(dir.join(format!("{}.sql", full_name)), content).unwrap();
    full_name
}

/// Render migration content in the on-disk format.
pub fn migration(up: &[&str], down: &[&str]) -> String {
    let mut content = String::from("-- add your UP SQL here\n");
    for statement in up {
        content.push_str(&format!("[STATEMENT] {}\n", statement));
    }
    content.push_str("\n-- [DIRECTION] -- do not alter this line!\n-- add your DOWN SQL here\n");
    for statement in down {
        content.push_str(&format!("[STATEMENT] {}\n", statement));
    }
    content
}

pub fn create_table(table: &str) -> String {
    migration(
        &[&format!("CREATE TABLE {} (id INTEGER PRIMARY KEY);", table)],
        &[&format!("DROP TABLE {};", table)],
    )
}
