//! Engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// Default name of the bookkeeping table.
pub const DEFAULT_TABLE_NAME: &str = "migrations";

/// Default permissions for a freshly created migrations directory.
pub const DEFAULT_DIR_MODE: u32 = 0o700;

/// Configuration for the migration engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Path to the migrations directory.
    pub migrations_dir: PathBuf,
    /// Name of the bookkeeping table.
    pub table_name: String,
    /// Unix permissions for the migrations directory when it is created.
    pub dir_mode: u32,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("./migrations"),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            dir_mode: DEFAULT_DIR_MODE,
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Set the bookkeeping table name.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Set the permissions used when creating the migrations directory.
    pub fn dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            MigrationError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            MigrationError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can be used to build SQL and paths.
    pub fn validate(&self) -> MigrateResult<()> {
        if !is_identifier(&self.table_name) {
            return Err(MigrationError::config(format!(
                "table name '{}' must match [A-Za-z_][A-Za-z0-9_]*",
                self.table_name
            )));
        }

        if self.migrations_dir.as_os_str().is_empty() {
            return Err(MigrationError::config("migrations_dir must not be empty"));
        }

        if self.dir_mode > 0o777 {
            return Err(MigrationError::config(format!(
                "dir_mode {:o} is not a permission mask",
                self.dir_mode
            )));
        }

        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
