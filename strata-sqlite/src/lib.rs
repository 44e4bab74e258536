//! SQLite transport for the Strata migration engine.
//!
//! This crate implements [`strata_migrate::SqlTransport`] over SQLite, using
//! `tokio-rusqlite` for asynchronous database operations.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_migrate::{MigrationConfig, MigrationEngine};
//! use strata_sqlite::SqliteTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = SqliteTransport::connect("sqlite://./app.db").await?;
//!     let engine = MigrationEngine::new(MigrationConfig::new(), transport)?;
//!     println!("{}", engine.migrate_up().await?.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod transport;
pub mod types;

pub use config::{DatabasePath, JournalMode, SqliteConfig};
pub use error::{SqliteError, SqliteResult};
pub use transport::SqliteTransport;
