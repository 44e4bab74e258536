//! # strata-migrate
//!
//! Reconciliation and execution engine for versioned SQL migration files.
//!
//! This crate provides functionality for:
//! - Discovering `{name}.{timestamp}.sql` files in a migrations directory
//! - Tracking migrations in a bookkeeping table (created on first use)
//! - Reconciling records against files, self-healing orphan records
//! - Applying pending migrations in one batch, and reversing the latest batch
//! - Creating new migration files from a template
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ File Discover│────▶│  Record Store  │────▶│  Reconciler  │
//! └──────────────┘     │ (seed, lookup) │     │ (orphans,    │
//!        │             └────────────────┘     │  sections)   │
//!        └───────────────────────────────────▶└──────────────┘
//!                                                    │
//!                                                    ▼
//!                      ┌────────────────┐     ┌──────────────┐
//!                      │ Batch Tracker  │◀────│   Executor   │
//!                      └────────────────┘     └──────────────┘
//! ```
//!
//! The engine reaches the database only through [`SqlTransport`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_migrate::{MigrationConfig, MigrationEngine};
//!
//! async fn run_migrations<T: strata_migrate::SqlTransport>(
//!     transport: T,
//! ) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MigrationConfig::new().migrations_dir("./migrations");
//!     let engine = MigrationEngine::new(config, transport)?;
//!
//!     let created = engine.create("create_users").await?;
//!     println!("{}", created.message);
//!
//!     let result = engine.migrate_up().await?;
//!     println!("{}", result.summary());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Migration Files
//!
//! ```text
//! -- add your UP SQL here
//! [STATEMENT] CREATE TABLE users (id INTEGER PRIMARY KEY);
//! -- [DIRECTION] -- do not alter this line!
//! -- add your DOWN SQL here
//! [STATEMENT] DROP TABLE users;
//! ```

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod file;
pub mod history;
pub mod id;
pub mod reconcile;
pub mod script;
pub mod transport;

// Re-exports
pub use config::MigrationConfig;
pub use engine::{
    CreatedMigration, MigrationEngine, MigrationResult, MigrationStatus, RecordStatus,
};
pub use error::{MigrateResult, MigrationError};
pub use executor::AppliedMigration;
pub use file::{DiscoveredFile, MigrationFileManager};
pub use history::{Candidate, MigrationRecord, RecordStore};
pub use id::{IdAllocator, TIMESTAMP_ID_FLOOR};
pub use reconcile::{PendingMigration, ReconciledPlan, RunContext};
pub use script::{
    DIRECTION_MARKER, Direction, MIGRATION_TEMPLATE, MigrationScript, STATEMENT_MARKER,
};
pub use transport::{Dialect, Fields, Row, SqlTransport, SqlValue};
