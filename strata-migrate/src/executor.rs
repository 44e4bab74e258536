//! Execution of reconciled migrations.

use tracing::info;

use crate::error::{MigrateResult, MigrationError};
use crate::history::RecordStore;
use crate::reconcile::ReconciledPlan;
use crate::script::statements;
use crate::transport::SqlTransport;

/// A migration that ran to completion and was checkpointed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    /// Ordering key.
    pub migration_id: i64,
    /// Name of the backing file.
    pub name: String,
    /// Number of statements executed.
    pub statements: usize,
}

/// Run every migration in `plan`, in order, checkpointing each one.
///
/// The first failing statement aborts the run. Migrations checkpointed before
/// the failure stay checkpointed; the failing migration is not, and statements
/// it already executed are not undone.
pub async fn execute_plan<T: SqlTransport>(
    store: &RecordStore<T>,
    plan: &ReconciledPlan,
    batch: i64,
) -> MigrateResult<Vec<AppliedMigration>> {
    let mut applied = Vec::with_capacity(plan.migrations.len());

    for migration in &plan.migrations {
        if migration.sql.trim().is_empty() {
            continue;
        }

        let statements = statements(&migration.sql);
        for statement in &statements {
            store
                .transport()
                .execute(statement, &[])
                .await
                .map_err(|e| MigrationError::ExecutionFailed {
                    migration_id: migration.migration_id,
                    name: migration.name.clone(),
                    statement: statement.trim().to_string(),
                    message: e.to_string(),
                })?;
        }

        store
            .mark(migration.migration_id, plan.direction, batch)
            .await?;

        info!(
            migration_id = migration.migration_id,
            name = %migration.name,
            statements = statements.len(),
            "{} migration",
            plan.direction.verb()
        );

        applied.push(AppliedMigration {
            migration_id: migration.migration_id,
            name: migration.name.clone(),
            statements: statements.len(),
        });
    }

    Ok(applied)
}
