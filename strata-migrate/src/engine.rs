//! Migration engine implementation.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::batch;
use crate::config::MigrationConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::{AppliedMigration, execute_plan};
use crate::file::MigrationFileManager;
use crate::history::{MigrationRecord, RecordStore};
use crate::reconcile::{ReconciledPlan, RunContext, reconcile};
use crate::script::Direction;
use crate::transport::SqlTransport;

/// Result of a migrate up or down run.
#[derive(Debug, Clone)]
pub struct MigrationResult {
    /// Direction of the run.
    pub direction: Direction,
    /// Batch stamped on applied records (up) or the batch reversed (down).
    pub batch_id: i64,
    /// Migrations executed, in execution order.
    pub applied: Vec<AppliedMigration>,
    /// Records seeded from new files during bootstrap.
    pub seeded: Vec<String>,
    /// Orphan records removed during reconciliation.
    pub orphans_removed: Vec<String>,
    /// Total duration in milliseconds.
    pub duration_ms: i64,
}

impl MigrationResult {
    /// Check if any migrations were executed.
    pub fn has_changes(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Human-readable summary, one line per executed migration.
    pub fn summary(&self) -> String {
        if self.applied.is_empty() {
            return "Nothing to migrate".to_string();
        }

        self.applied
            .iter()
            .map(|m| {
                format!(
                    "{} migration #{} ({})",
                    self.direction.verb(),
                    m.migration_id,
                    m.name
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A migration created on request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedMigration {
    /// Path of the new file.
    pub path: PathBuf,
    /// `{name}.{timestamp}`, the name stored in the record.
    pub full_name: String,
    /// Id assigned to the record.
    pub migration_id: i64,
    /// Human-readable confirmation.
    pub message: String,
}

/// Status of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStatus {
    /// The persisted record.
    pub record: MigrationRecord,
    /// Whether the backing file is on disk.
    pub file_present: bool,
}

/// Migration status information.
#[derive(Debug, Clone, Default)]
pub struct MigrationStatus {
    /// Every record, ascending by id.
    pub records: Vec<RecordStatus>,
    /// Files on disk without a record.
    pub untracked: Vec<String>,
}

impl MigrationStatus {
    /// Number of applied migrations.
    pub fn total_applied(&self) -> usize {
        self.records.iter().filter(|r| r.record.migrated).count()
    }

    /// Number of migrations not applied yet, including untracked files.
    pub fn total_pending(&self) -> usize {
        self.records
            .iter()
            .filter(|r| !r.record.migrated && r.file_present)
            .count()
            + self.untracked.len()
    }

    /// Names of records whose file is gone.
    pub fn orphans(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| !r.file_present)
            .map(|r| r.record.name.as_str())
            .collect()
    }
}

/// The main migration engine.
///
/// Runs are not safe to execute concurrently against the same database or
/// directory; callers must serialize them.
pub struct MigrationEngine<T: SqlTransport> {
    config: MigrationConfig,
    store: RecordStore<T>,
    files: MigrationFileManager,
}

impl<T: SqlTransport> MigrationEngine<T> {
    /// Create a new migration engine.
    pub fn new(config: MigrationConfig, transport: T) -> MigrateResult<Self> {
        config.validate()?;
        let files = MigrationFileManager::new(&config.migrations_dir, config.dir_mode);
        let store = RecordStore::new(transport, config.table_name.clone());
        Ok(Self {
            config,
            store,
            files,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the record store.
    pub fn store(&self) -> &RecordStore<T> {
        &self.store
    }

    /// Get the file manager.
    pub fn files(&self) -> &MigrationFileManager {
        &self.files
    }

    /// Apply every pending migration as one batch.
    pub async fn migrate_up(&self) -> MigrateResult<MigrationResult> {
        self.migrate(Direction::Up).await
    }

    /// Reverse the most recent batch.
    pub async fn migrate_down(&self) -> MigrateResult<MigrationResult> {
        self.migrate(Direction::Down).await
    }

    async fn migrate(&self, direction: Direction) -> MigrateResult<MigrationResult> {
        let start = Instant::now();
        let started_at = Utc::now();

        let ctx = self.bootstrap(direction).await?;
        let plan = reconcile(&self.store, &self.files, &ctx).await?;
        let batch_id = self.batch_for(&plan, started_at).await?;
        let applied = execute_plan(&self.store, &plan, batch_id).await?;

        let result = MigrationResult {
            direction,
            batch_id,
            applied,
            seeded: ctx.seeded,
            orphans_removed: plan.orphans_removed,
            duration_ms: start.elapsed().as_millis() as i64,
        };

        info!(
            ?direction,
            batch_id,
            migrations = result.applied.len(),
            duration_ms = result.duration_ms,
            "Migration run finished"
        );
        Ok(result)
    }

    async fn batch_for(
        &self,
        plan: &ReconciledPlan,
        started_at: DateTime<Utc>,
    ) -> MigrateResult<i64> {
        match plan.direction {
            Direction::Up => Ok(batch::current_batch(
                started_at,
                self.store.latest_batch().await?,
            )),
            Direction::Down => Ok(plan.scope.unwrap_or(batch::UNASSIGNED_BATCH)),
        }
    }

    /// Bring the table, directory and records in line with the files on disk.
    async fn bootstrap(&self, direction: Direction) -> MigrateResult<RunContext> {
        self.store.ensure_table().await?;
        self.files.ensure_dir().await?;

        let mut ctx = RunContext::new(direction, self.files.discover().await?);
        ctx.seeded = self.store.seed(&ctx.files).await?;
        Ok(ctx)
    }

    /// Create a new migration file and its record.
    ///
    /// `name` gets a nanosecond timestamp appended to form the full name.
    pub async fn create(&self, name: &str) -> MigrateResult<CreatedMigration> {
        validate_name(name)?;

        let ctx = self.bootstrap(Direction::Up).await?;
        reconcile(&self.store, &self.files, &ctx).await?;

        let taken: HashSet<i64> = ctx.files.iter().map(|f| f.timestamp).collect();
        let now = Utc::now();
        let mut timestamp = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros());
        while taken.contains(&timestamp) {
            timestamp += 1;
        }

        let full_name = format!("{}.{}", name, timestamp);
        if self.store.exists(&full_name).await? {
            return Err(MigrationError::AlreadyExists(full_name));
        }

        let path = self.files.write_template(&full_name).await?;
        let migration_id = self.store.record_created(&full_name).await?;
        let message = format!(
            "Migration '{}' with id {} created at {}",
            full_name,
            migration_id,
            path.display()
        );
        info!(name = %full_name, migration_id, path = %path.display(), "Created migration");

        Ok(CreatedMigration {
            path,
            full_name,
            migration_id,
            message,
        })
    }

    /// Report every record and file without changing anything.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let files = if tokio::fs::try_exists(self.files.migrations_dir()).await? {
            self.files.discover().await?
        } else {
            Vec::new()
        };

        let records = if self.store.transport().table_exists(self.store.table()).await? {
            self.store.all().await?
        } else {
            Vec::new()
        };

        let on_disk: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
        let tracked: HashSet<&str> = records.iter().map(|r| r.name.as_str()).collect();

        let untracked = files
            .iter()
            .filter(|f| !tracked.contains(f.name.as_str()))
            .map(|f| f.name.clone())
            .collect();

        let records = records
            .iter()
            .map(|record| RecordStatus {
                file_present: on_disk.contains(record.name.as_str()),
                record: record.clone(),
            })
            .collect();

        Ok(MigrationStatus { records, untracked })
    }
}

fn validate_name(name: &str) -> MigrateResult<()> {
    if name.is_empty() {
        return Err(MigrationError::invalid_migration("migration name is empty"));
    }

    if name
        .chars()
        .any(|c| c == '.' || c == '/' || c == '\\' || c.is_whitespace())
    {
        return Err(MigrationError::invalid_migration(format!(
            "migration name '{}' must not contain dots, slashes or whitespace",
            name
        )));
    }

    Ok(())
}
