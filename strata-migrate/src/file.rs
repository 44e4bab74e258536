//! Migration file discovery and creation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::script::MIGRATION_TEMPLATE;

/// Extension every migration file carries.
pub const MIGRATION_EXTENSION: &str = "sql";

/// A migration file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Timestamp segment of the file name; the disk-level sort key.
    pub timestamp: i64,
    /// `{name}.{timestamp}`, the identifier stored in the record's `name` column.
    pub name: String,
    /// Path to the file.
    pub path: PathBuf,
}

/// Migration file reader/writer.
#[derive(Debug, Clone)]
pub struct MigrationFileManager {
    /// Directory where migrations are stored.
    migrations_dir: PathBuf,
    /// Permissions applied when the directory is created.
    dir_mode: u32,
}

impl MigrationFileManager {
    /// Create a new file manager.
    pub fn new(migrations_dir: impl Into<PathBuf>, dir_mode: u32) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            dir_mode,
        }
    }

    /// Get the migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Path of the file backing a migration name.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.migrations_dir.join(format!("{}.{}", name, MIGRATION_EXTENSION))
    }

    /// Create the migrations directory if it is absent.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        if tokio::fs::try_exists(&self.migrations_dir).await? {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.migrations_dir).await?;
        set_mode(&self.migrations_dir, self.dir_mode).await?;
        debug!(dir = %self.migrations_dir.display(), "Created migrations directory");
        Ok(())
    }

    /// List every migration file, sorted ascending by timestamp.
    ///
    /// Only regular files with a `.sql` extension are considered; anything
    /// else in the directory is ignored.
    pub async fn discover(&self) -> MigrateResult<Vec<DiscoveredFile>> {
        let mut entries = tokio::fs::read_dir(&self.migrations_dir).await?;
        let mut files: BTreeMap<i64, DiscoveredFile> = BTreeMap::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !file_name.ends_with(".sql") {
                continue;
            }

            let (timestamp, name) = parse_file_name(file_name)?;
            let file = DiscoveredFile {
                timestamp,
                name,
                path: entry.path(),
            };

            if let Some(existing) = files.get(&timestamp) {
                let (first, second) = ordered_pair(&existing.path, &file.path);
                return Err(MigrationError::DuplicateTimestamp {
                    timestamp,
                    first,
                    second,
                });
            }
            files.insert(timestamp, file);
        }

        debug!(count = files.len(), "Discovered migration files");
        Ok(files.into_values().collect())
    }

    /// Read the full content of a migration file.
    pub async fn read(&self, name: &str) -> MigrateResult<String> {
        let path = self.path_for(name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| MigrationError::UnreadableMigration {
                name: name.to_string(),
                path,
                source,
            })
    }

    /// Write a template for a new migration, returning its path.
    pub async fn write_template(&self, name: &str) -> MigrateResult<PathBuf> {
        let path = self.path_for(name);
        tokio::fs::write(&path, MIGRATION_TEMPLATE).await?;
        Ok(path)
    }
}

/// Parse `{name}.{timestamp}.sql` into `(timestamp, "{name}.{timestamp}")`.
pub fn parse_file_name(file_name: &str) -> MigrateResult<(i64, String)> {
    let segments: Vec<&str> = file_name.split('.').collect();
    let [name, timestamp, ext] = segments.as_slice() else {
        return Err(MigrationError::MalformedName(file_name.to_string()));
    };

    if name.is_empty() || *ext != MIGRATION_EXTENSION {
        return Err(MigrationError::MalformedName(file_name.to_string()));
    }

    let parsed = timestamp
        .parse::<i64>()
        .map_err(|_| MigrationError::UnparsableTimestamp {
            file: file_name.to_string(),
            timestamp: timestamp.to_string(),
        })?;

    Ok((parsed, format!("{}.{}", name, timestamp)))
}

fn ordered_pair(a: &Path, b: &Path) -> (String, String) {
    let a = display_name(a);
    let b = display_name(b);
    if a <= b { (a, b) } else { (b, a) }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> MigrateResult<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> MigrateResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn touch(dir: &Path, name: &str) {
        tokio::fs::write(dir.join(name), "-- [DIRECTION]").await.unwrap();
    }

    #[test]
    fn test_parse_file_name() {
        let (ts, name) = parse_file_name("create_users.1700000000.sql").unwrap();
        assert_eq!(ts, 1_700_000_000);
        assert_eq!(name, "create_users.1700000000");
    }

    #[test]
    fn test_parse_file_name_malformed() {
        for file in ["create_users.sql", "a.b.1.sql", ".1.sql"] {
            assert!(
                matches!(parse_file_name(file), Err(MigrationError::MalformedName(_))),
                "{file} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_file_name_bad_timestamp() {
        let err = parse_file_name("create_users.yesterday.sql").unwrap_err();
        assert!(matches!(err, MigrationError::UnparsableTimestamp { .. }));
    }

    #[tokio::test]
    async fn test_discover_sorted_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "third.300.sql").await;
        touch(dir.path(), "first.100.sql").await;
        touch(dir.path(), "second.200.sql").await;
        touch(dir.path(), "README.md").await;
        tokio::fs::create_dir(dir.path().join("archive.1.sql")).await.unwrap();

        let manager = MigrationFileManager::new(dir.path(), 0o700);
        let files = manager.discover().await.unwrap();

        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["first.100", "second.200", "third.300"]);
        assert_eq!(files[0].path, dir.path().join("first.100.sql"));
    }

    #[tokio::test]
    async fn test_discover_rejects_duplicate_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "alpha.100.sql").await;
        touch(dir.path(), "beta.100.sql").await;

        let manager = MigrationFileManager::new(dir.path(), 0o700);
        match manager.discover().await {
            Err(MigrationError::DuplicateTimestamp {
                timestamp,
                first,
                second,
            }) => {
                assert_eq!(timestamp, 100);
                assert_eq!(first, "alpha.100.sql");
                assert_eq!(second, "beta.100.sql");
            }
            other => panic!("expected duplicate timestamp error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_discover_rejects_malformed_sql_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ok.100.sql").await;
        touch(dir.path(), "broken.sql").await;

        let manager = MigrationFileManager::new(dir.path(), 0o700);
        let err = manager.discover().await.unwrap_err();
        assert!(matches!(err, MigrationError::MalformedName(_)));
    }

    #[tokio::test]
    async fn test_ensure_dir_creates_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrations");
        let manager = MigrationFileManager::new(&path, 0o700);

        manager.ensure_dir().await.unwrap();
        manager.ensure_dir().await.unwrap();
        assert!(path.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[tokio::test]
    async fn test_write_and_read_template() {
        let dir = tempfile::tempdir().unwrap();
        let manager = MigrationFileManager::new(dir.path(), 0o700);

        let path = manager.write_template("add_x.42").await.unwrap();
        assert_eq!(path, dir.path().join("add_x.42.sql"));

        let content = manager.read("add_x.42").await.unwrap();
        assert_eq!(content, MIGRATION_TEMPLATE);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = MigrationFileManager::new(dir.path(), 0o700);

        let err = manager.read("ghost.1").await.unwrap_err();
        assert!(matches!(err, MigrationError::UnreadableMigration { .. }));
    }
}
