//! Migration file content: direction and statement markers.
//!
//! ```text
//! <up statements, each preceded by [STATEMENT]>
//! -- [DIRECTION] -- do not alter this line!
//! <down statements, each preceded by [STATEMENT]>
//! ```

use crate::error::{MigrateResult, MigrationError};

/// Separates the up section from the down section.
pub const DIRECTION_MARKER: &str = "[DIRECTION]";

/// Separates individual statements within a section.
pub const STATEMENT_MARKER: &str = "[STATEMENT]";

/// Content written for a freshly created migration.
pub const MIGRATION_TEMPLATE: &str = "-- add your UP SQL here

-- [DIRECTION] -- do not alter this line!
-- add your DOWN SQL here

";

/// Direction of migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Apply the migration (up).
    Up,
    /// Reverse the migration (down).
    Down,
}

impl Direction {
    /// Value of the `migrated` flag a candidate must currently hold.
    pub fn candidate_flag(&self) -> i64 {
        match self {
            Self::Up => 0,
            Self::Down => 1,
        }
    }

    /// Value of the `migrated` flag after a successful run.
    pub fn target_flag(&self) -> i64 {
        1 - self.candidate_flag()
    }

    /// SQL ordering keyword for candidates.
    pub fn order(&self) -> &'static str {
        match self {
            Self::Up => "ASC",
            Self::Down => "DESC",
        }
    }

    /// Verb used in run summaries.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Up => "Executed",
            Self::Down => "Reversed",
        }
    }
}

/// The two sections of a migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    /// SQL applied when migrating up.
    pub up: String,
    /// SQL applied when migrating down.
    pub down: String,
}

impl MigrationScript {
    /// Split file content on the direction marker, which must appear exactly once.
    pub fn parse(name: &str, content: &str) -> MigrateResult<Self> {
        let mut sections = content.split(DIRECTION_MARKER);
        let (Some(up), Some(down), None) = (sections.next(), sections.next(), sections.next())
        else {
            let found = content.matches(DIRECTION_MARKER).count();
            return Err(MigrationError::invalid_migration(format!(
                "migration '{}' must contain {} exactly once, found {}",
                name, DIRECTION_MARKER, found
            )));
        };

        Ok(Self {
            up: up.to_string(),
            down: down.to_string(),
        })
    }

    /// Take the section for a direction.
    pub fn into_section(self, direction: Direction) -> String {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
        }
    }
}

/// Split a section into executable statements.
///
/// Fragments holding nothing but whitespace and `--` line comments are dropped.
pub fn statements(section: &str) -> Vec<&str> {
    section
        .split(STATEMENT_MARKER)
        .filter(|fragment| has_sql(fragment))
        .collect()
}

fn has_sql(fragment: &str) -> bool {
    fragment.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with("--")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDGETS: &str = "
-- add your UP SQL here

[STATEMENT] CREATE TABLE widgets (id INTEGER PRIMARY KEY);
[STATEMENT] CREATE INDEX widgets_id ON widgets (id);

-- [DIRECTION] -- do not alter this line!
-- add your DOWN SQL here

[STATEMENT] DROP TABLE widgets;
";

    #[test]
    fn test_parse_sections() {
        let script = MigrationScript::parse("widgets.1", WIDGETS).unwrap();
        assert!(script.up.contains("CREATE TABLE widgets"));
        assert!(!script.up.contains("DROP TABLE"));
        assert!(script.down.contains("DROP TABLE widgets"));
    }

    #[test]
    fn test_parse_missing_marker() {
        let err = MigrationScript::parse("broken.1", "CREATE TABLE t (id INT);").unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().contains("found 0"));
    }

    #[test]
    fn test_parse_repeated_marker() {
        let content = "a [DIRECTION] b [DIRECTION] c";
        let err = MigrationScript::parse("broken.1", content).unwrap_err();
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_statements_split_and_skip_empty() {
        let script = MigrationScript::parse("widgets.1", WIDGETS).unwrap();
        let up = statements(&script.up);
        assert_eq!(up.len(), 2);
        assert_eq!(up[0].trim(), "CREATE TABLE widgets (id INTEGER PRIMARY KEY);");
        assert!(up[1].trim().starts_with("CREATE INDEX widgets_id ON widgets (id);"));

        // trailing "-- " left by the direction marker line is not a statement
        let down = statements(&script.down);
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].trim(), "DROP TABLE widgets;");
    }

    #[test]
    fn test_template_is_a_no_op() {
        let script = MigrationScript::parse("new.1", MIGRATION_TEMPLATE).unwrap();
        assert!(statements(&script.up).is_empty());
        assert!(statements(&script.down).is_empty());
    }

    #[test]
    fn test_direction_flags() {
        assert_eq!(Direction::Up.candidate_flag(), 0);
        assert_eq!(Direction::Up.target_flag(), 1);
        assert_eq!(Direction::Down.candidate_flag(), 1);
        assert_eq!(Direction::Down.target_flag(), 0);
        assert_eq!(Direction::Down.order(), "DESC");
    }
}
