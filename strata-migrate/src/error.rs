//! Error types for the migration engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by the SQL transport.
    #[error("Database error: {0}")]
    Database(String),

    /// A `.sql` file does not follow `{name}.{timestamp}.sql`.
    #[error("Migration name is malformed: '{0}' should be {{name}}.{{timestamp}}.sql")]
    MalformedName(String),

    /// The timestamp segment of a migration file name is not an integer.
    #[error("Could not parse timestamp '{timestamp}' of migration file '{file}'")]
    UnparsableTimestamp {
        /// File name.
        file: String,
        /// Offending segment.
        timestamp: String,
    },

    /// Two migration files carry the same timestamp.
    #[error("Migration files '{first}' and '{second}' share timestamp {timestamp}")]
    DuplicateTimestamp {
        /// Timestamp shared by both files.
        timestamp: i64,
        /// File discovered first.
        first: String,
        /// File discovered second.
        second: String,
    },

    /// Migration content or name is structurally invalid.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// A count lookup returned something that is not a number.
    #[error("Ambiguous existence result for migration '{name}': {value}")]
    AmbiguousExistence {
        /// Migration name that was looked up.
        name: String,
        /// Raw value returned by the transport.
        value: String,
    },

    /// A migration id could not be normalized to an integer.
    #[error("Invalid migration id for '{name}': {value}")]
    InvalidMigrationId {
        /// Migration name of the offending record.
        name: String,
        /// Raw value returned by the transport.
        value: String,
    },

    /// A batch id could not be normalized to an integer.
    #[error("Invalid batch id: {0}")]
    InvalidBatchId(String),

    /// A migration with this name already exists.
    #[error("Migration '{0}' already exists")]
    AlreadyExists(String),

    /// One or more records could not be seeded.
    #[error("Seeding failed: {}", .0.join(", "))]
    Seeding(Vec<String>),

    /// A statement failed while applying or reversing a migration.
    #[error("Migration #{migration_id} ({name}) failed on statement `{statement}`: {message}")]
    ExecutionFailed {
        /// Id of the failing migration.
        migration_id: i64,
        /// Name of the failing migration.
        name: String,
        /// Statement that failed.
        statement: String,
        /// Transport error message.
        message: String,
    },

    /// Could not read a migration file matched to a record.
    #[error("Could not get contents for migration '{name}' at {path}: {source}")]
    UnreadableMigration {
        /// Migration name.
        name: String,
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Sequential ids ran into the range reserved for timestamp ids.
    #[error("Sequential migration id {0} collides with the timestamp id range")]
    IdRangeExhausted(i64),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create an invalid migration error.
    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error comes from the layout or content of migration files.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MalformedName(_)
                | Self::UnparsableTimestamp { .. }
                | Self::DuplicateTimestamp { .. }
                | Self::InvalidMigration(_)
        )
    }

    /// Check if the transport returned values the engine could not interpret.
    pub fn is_lookup_ambiguity(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousExistence { .. } | Self::InvalidMigrationId { .. } | Self::InvalidBatchId(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MigrationError::AlreadyExists("create_users.1700000000".to_string());
        assert!(err.to_string().contains("create_users.1700000000"));
    }

    #[test]
    fn test_seeding_joins_messages() {
        let err = MigrationError::Seeding(vec!["a failed".into(), "b failed".into()]);
        assert_eq!(err.to_string(), "Seeding failed: a failed, b failed");
    }

    #[test]
    fn test_execution_failed_names_statement() {
        let err = MigrationError::ExecutionFailed {
            migration_id: 2,
            name: "alter_users.1700000001".to_string(),
            statement: "ALTER TABLE nope".to_string(),
            message: "no such table".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("#2"));
        assert!(msg.contains("alter_users.1700000001"));
        assert!(msg.contains("ALTER TABLE nope"));
    }

    #[test]
    fn test_classification() {
        assert!(MigrationError::MalformedName("x.sql".into()).is_structural());
        assert!(MigrationError::invalid_migration("no marker").is_structural());
        assert!(!MigrationError::database("down").is_structural());

        let err = MigrationError::AmbiguousExistence {
            name: "x".into(),
            value: "\"abc\"".into(),
        };
        assert!(err.is_lookup_ambiguity());
        assert!(!err.is_structural());
    }
}
