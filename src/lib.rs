//! # Strata
//!
//! Versioned SQL migration files, reconciled against a bookkeeping table so
//! that each change is applied exactly once, in a deterministic order, and
//! can be reversed one batch at a time.
//!
//! Strata provides:
//! - Discovery of `{name}.{timestamp}.sql` files
//! - A bookkeeping table that is created and seeded on first use
//! - Self-healing of records whose file has been removed
//! - Batched forward runs and reversal of the most recent batch
//! - A SQLite transport (feature `sqlite`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = SqliteTransport::connect("sqlite://./app.db").await?;
//!     let config = MigrationConfig::load("strata.toml").await?;
//!     let engine = MigrationEngine::new(config, transport)?;
//!
//!     let created = engine.create("create_users").await?;
//!     println!("edit {}", created.path.display());
//!
//!     println!("{}", engine.migrate_up().await?.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Migration engine: discovery, bookkeeping, reconciliation and execution.
pub mod migrate {
    pub use strata_migrate::*;
}

/// SQLite transport.
#[cfg(feature = "sqlite")]
pub mod sqlite {
    pub use strata_sqlite::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        Direction, MigrateResult, MigrationConfig, MigrationEngine, MigrationError,
        MigrationResult, SqlTransport,
    };
    #[cfg(feature = "sqlite")]
    pub use crate::sqlite::{SqliteConfig, SqliteTransport};
}

// Re-export key types at the crate root
pub use migrate::{MigrationEngine, MigrationError};
