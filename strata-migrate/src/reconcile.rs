//! Reconciliation of persisted records against migration files.
//!
//! The migrations directory is the source of truth. A candidate record whose
//! file is gone is an orphan: it is logged and deleted once the rest of the
//! plan has been read, and the run carries on.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::batch;
use crate::error::MigrateResult;
use crate::file::{DiscoveredFile, MigrationFileManager};
use crate::history::RecordStore;
use crate::script::{Direction, MigrationScript};
use crate::transport::SqlTransport;

/// State threaded through one run: discover, seed, reconcile, execute.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Requested direction.
    pub direction: Direction,
    /// Files discovered at the start of the run, ascending by timestamp.
    pub files: Vec<DiscoveredFile>,
    /// Records inserted by seeding during this run.
    pub seeded: Vec<String>,
}

impl RunContext {
    /// Create a context for `direction` over a discovery pass.
    pub fn new(direction: Direction, files: Vec<DiscoveredFile>) -> Self {
        Self {
            direction,
            files,
            seeded: Vec::new(),
        }
    }

    /// Names of the discovered files.
    pub fn file_names(&self) -> HashSet<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }
}

/// A migration resolved to the SQL section it will run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMigration {
    /// Ordering key.
    pub migration_id: i64,
    /// Name of the backing file.
    pub name: String,
    /// Section of the file for the run's direction.
    pub sql: String,
}

/// Outcome of reconciliation.
#[derive(Debug, Clone)]
pub struct ReconciledPlan {
    /// Direction the plan runs in.
    pub direction: Direction,
    /// Batch a down run is scoped to, if any.
    pub scope: Option<i64>,
    /// Migrations in execution order.
    pub migrations: Vec<PendingMigration>,
    /// Orphan records deleted while reconciling.
    pub orphans_removed: Vec<String>,
}

impl ReconciledPlan {
    /// Check if there's anything to execute.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

/// Match candidate records to files and resolve each to its SQL section.
pub async fn reconcile<T: SqlTransport>(
    store: &RecordStore<T>,
    files: &MigrationFileManager,
    ctx: &RunContext,
) -> MigrateResult<ReconciledPlan> {
    let direction = ctx.direction;
    let scope = match direction {
        Direction::Up => None,
        Direction::Down => batch::reversal_scope(store.last_applied_batch().await?),
    };

    let candidates = store.candidates(direction, scope).await?;
    let on_disk = ctx.file_names();

    let mut migrations = Vec::with_capacity(candidates.len());
    let mut orphans = Vec::new();

    for candidate in candidates {
        if !on_disk.contains(candidate.name.as_str()) {
            orphans.push(candidate);
            continue;
        }

        let content = files.read(&candidate.name).await?;
        let sql = MigrationScript::parse(&candidate.name, &content)?.into_section(direction);
        migrations.push(PendingMigration {
            migration_id: candidate.migration_id,
            name: candidate.name,
            sql,
        });
    }

    // Orphans go only once every matched file has parsed.
    let mut orphans_removed = Vec::with_capacity(orphans.len());
    for orphan in orphans {
        warn!(
            name = %orphan.name,
            migration_id = orphan.migration_id,
            "Migration record has no file; removing orphan record"
        );
        store.delete(&orphan.name).await?;
        orphans_removed.push(orphan.name);
    }

    // Execution order must not depend on how the driver sorts.
    match direction {
        Direction::Up => migrations.sort_by_key(|m| m.migration_id),
        Direction::Down => migrations.sort_by_key(|m| std::cmp::Reverse(m.migration_id)),
    }

    debug!(
        ?direction,
        ?scope,
        pending = migrations.len(),
        orphans = orphans_removed.len(),
        "Reconciled migrations"
    );

    Ok(ReconciledPlan {
        direction,
        scope,
        migrations,
        orphans_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_context_file_names() {
        let ctx = RunContext::new(
            Direction::Up,
            vec![
                DiscoveredFile {
                    timestamp: 1,
                    name: "a.1".into(),
                    path: PathBuf::from("m/a.1.sql"),
                },
                DiscoveredFile {
                    timestamp: 2,
                    name: "b.2".into(),
                    path: PathBuf::from("m/b.2.sql"),
                },
            ],
        );

        let names = ctx.file_names();
        assert!(names.contains("a.1"));
        assert!(names.contains("b.2"));
        assert!(!names.contains("ghost"));
        assert!(ctx.seeded.is_empty());
    }
}
