//! Registry schema migration engine.
//!
//! One `Migrator` instance covers one (driver, table-prefix) scope and owns
//! the embedded, ordered migration list for that driver. The caller is
//! responsible for serializing concurrent up/down calls against the same
//! schema; within one call the whole requested range runs in a single
//! transaction.

mod catalog;
pub mod executor;

pub use executor::{PgExecutor, SchemaExecutor, VersionRead};

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::error::{CfmgError, Result};
use crate::sql::split_statements;

/// Canonical table-prefix token used inside the embedded scripts.
pub const PREFIX_TOKEN: &str = "cfmg_";

/// Version label reported for a schema that has no applied migrations.
pub const SEMVER_UNINITIALIZED: &str = "0.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Postgres,
    MySql,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Postgres => "postgres",
            Driver::MySql => "mysql",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = CfmgError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgres" | "postgresql" => Ok(Driver::Postgres),
            "mysql" => Ok(Driver::MySql),
            other => Err(CfmgError::Config(format!("unknown driver {:?}", other))),
        }
    }
}

/// One versioned up/down script pair. Immutable once the catalog is loaded;
/// the prefix substitution in `Migrator::new` is the only rewrite it ever
/// receives.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub semver: &'static str,
    pub up_sql: String,
    pub down_sql: String,
}

pub struct Migrator {
    driver: Driver,
    table_prefix: String,
    migrations: Vec<Migration>,
}

impl Migrator {
    /// Build a migrator for `driver` with every embedded script rebased onto
    /// `table_prefix`. The prefix is validated up front: anything that could
    /// alter SQL syntax (quotes, whitespace, separators) is rejected before
    /// a single statement is assembled.
    pub fn new(driver: Driver, table_prefix: &str) -> Result<Self> {
        validate_prefix(table_prefix)?;
        let mut migrations = match driver {
            Driver::Postgres => catalog::postgres_migrations(),
            Driver::MySql => catalog::mysql_migrations(),
        };
        if table_prefix != PREFIX_TOKEN {
            for migration in &mut migrations {
                migration.up_sql = migration.up_sql.replace(PREFIX_TOKEN, table_prefix);
                migration.down_sql = migration.down_sql.replace(PREFIX_TOKEN, table_prefix);
            }
        }
        Ok(Self {
            driver,
            table_prefix: table_prefix.to_string(),
            migrations,
        })
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    pub fn migration_count(&self) -> i64 {
        self.migrations.len() as i64
    }

    pub fn version_table(&self) -> String {
        format!("{}registry_schema_version", self.table_prefix)
    }

    /// Read the current schema version. A missing version table is reported
    /// as the distinct `NoVersionTable` condition: the schema has never been
    /// bootstrapped and an `up` from version 0 will recover it.
    pub async fn current<E: SchemaExecutor>(&self, exec: &mut E) -> Result<i64> {
        match exec.current_version(&self.version_table()).await? {
            VersionRead::TableMissing => Err(CfmgError::NoVersionTable {
                table: self.version_table(),
            }),
            VersionRead::Empty => Ok(0),
            VersionRead::Version(v) => Ok(v),
        }
    }

    /// Like [`current`](Self::current) but maps the bootstrap condition to
    /// version 0.
    pub async fn current_or_bootstrap<E: SchemaExecutor>(&self, exec: &mut E) -> Result<i64> {
        match self.current(exec).await {
            Err(CfmgError::NoVersionTable { .. }) => Ok(0),
            other => other,
        }
    }

    /// Migrate up to `target`; 0 means latest. The whole range from the
    /// current version runs in one transaction: a failure anywhere rolls
    /// everything back and surfaces the offending statement verbatim. Each
    /// up script advances the version marker itself, so schema change and
    /// version bump commit or vanish together.
    pub async fn up<E: SchemaExecutor>(&self, exec: &mut E, target: i64) -> Result<()> {
        let max = self.migration_count();
        let target = if target == 0 { max } else { target };
        if target < 0 || target > max {
            return Err(CfmgError::TargetOutOfRange { target, max });
        }
        let current = self.current_or_bootstrap(exec).await?;
        if current >= target {
            debug!(driver = %self.driver, current, target, "schema already at target, nothing to apply");
            return Ok(());
        }

        info!(driver = %self.driver, from = current, to = target, "migrating registry schema up");
        exec.begin().await?;
        for migration in &self.migrations[current as usize..target as usize] {
            for statement in split_statements(&migration.up_sql) {
                if let Err(err) = exec.execute(&statement).await {
                    self.abort(exec, migration.version, &statement).await;
                    return Err(CfmgError::MigrationFailed {
                        version: migration.version,
                        statement,
                        message: err.to_string(),
                    });
                }
            }
        }
        exec.commit().await
    }

    /// Migrate down to `target`, executing down scripts in descending order
    /// inside a single transaction. No-op when `target` is at or above the
    /// current version.
    pub async fn down<E: SchemaExecutor>(&self, exec: &mut E, target: i64) -> Result<()> {
        let max = self.migration_count();
        if target < 0 || target > max {
            return Err(CfmgError::TargetOutOfRange { target, max });
        }
        let current = self.current_or_bootstrap(exec).await?;
        if target >= current {
            debug!(driver = %self.driver, current, target, "schema already at or below target");
            return Ok(());
        }

        info!(driver = %self.driver, from = current, to = target, "migrating registry schema down");
        exec.begin().await?;
        for migration in self.migrations[target as usize..current as usize].iter().rev() {
            for statement in split_statements(&migration.down_sql) {
                if let Err(err) = exec.execute(&statement).await {
                    self.abort(exec, migration.version, &statement).await;
                    return Err(CfmgError::MigrationFailed {
                        version: migration.version,
                        statement,
                        message: err.to_string(),
                    });
                }
            }
        }
        exec.commit().await
    }

    async fn abort<E: SchemaExecutor>(&self, exec: &mut E, version: i64, statement: &str) {
        warn!(driver = %self.driver, version, statement, "statement failed, rolling back migration batch");
        if let Err(err) = exec.rollback().await {
            warn!(error = %err, "rollback after failed migration also failed");
        }
    }

    /// Dry run: the exact ordered statement list `up`/`down` would execute
    /// between `from` and `to`, without touching any connection. Ascending
    /// ranges yield up statements, descending ranges down statements,
    /// `from == to` yields nothing. Output is byte-identical to executed SQL
    /// because prefix substitution happened at construction.
    pub fn sql_for_range(&self, from: i64, to: i64) -> Vec<String> {
        let max = self.migration_count();
        let from = from.clamp(0, max);
        let to = to.clamp(0, max);
        let mut statements = Vec::new();
        if to > from {
            for migration in &self.migrations[from as usize..to as usize] {
                statements.extend(split_statements(&migration.up_sql));
            }
        } else if to < from {
            for migration in self.migrations[to as usize..from as usize].iter().rev() {
                statements.extend(split_statements(&migration.down_sql));
            }
        }
        statements
    }

    /// Integer version for a human label; accepts an optional leading `v`.
    pub fn semver_to_int(&self, label: &str) -> Option<i64> {
        let bare = label.strip_prefix('v').unwrap_or(label);
        if bare == SEMVER_UNINITIALIZED {
            return Some(0);
        }
        self.migrations
            .iter()
            .find(|m| m.semver == label || m.semver == bare)
            .map(|m| m.version)
    }

    /// Human label for an integer version; 0 maps to the pre-bootstrap
    /// sentinel.
    pub fn semver(&self, version: i64) -> Option<String> {
        if version == 0 {
            return Some(SEMVER_UNINITIALIZED.to_string());
        }
        self.migrations
            .iter()
            .find(|m| m.version == version)
            .map(|m| m.semver.to_string())
    }
}

pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Ok(());
    }
    let mut chars = prefix.chars();
    let first = chars.next().unwrap_or('_');
    let head_ok = first.is_ascii_alphabetic() || first == '_';
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if head_ok && tail_ok {
        Ok(())
    } else {
        Err(CfmgError::InvalidPrefix(prefix.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_for_range_full_ascent_matches_up_scripts() {
        let m = Migrator::new(Driver::Postgres, PREFIX_TOKEN).unwrap();
        let n = m.migration_count();

        let mut expected = Vec::new();
        for migration in &m.migrations {
            expected.extend(split_statements(&migration.up_sql));
        }
        assert_eq!(m.sql_for_range(0, n), expected);
    }

    #[test]
    fn test_sql_for_range_full_descent_matches_down_scripts() {
        let m = Migrator::new(Driver::MySql, PREFIX_TOKEN).unwrap();
        let n = m.migration_count();

        let mut expected = Vec::new();
        for migration in m.migrations.iter().rev() {
            expected.extend(split_statements(&migration.down_sql));
        }
        assert_eq!(m.sql_for_range(n, 0), expected);
    }

    #[test]
    fn test_sql_for_range_equal_endpoints_is_empty() {
        let m = Migrator::new(Driver::Postgres, PREFIX_TOKEN).unwrap();
        assert!(m.sql_for_range(2, 2).is_empty());
    }

    #[test]
    fn test_sql_for_range_partial_ascent() {
        let m = Migrator::new(Driver::Postgres, PREFIX_TOKEN).unwrap();
        let statements = m.sql_for_range(1, 2);
        assert!(statements.iter().any(|s| s.contains("display_widget")));
        assert!(!statements.iter().any(|s| s.contains("events_failed")));
    }

    #[test]
    fn test_dollar_quoted_trigger_function_stays_whole() {
        let m = Migrator::new(Driver::Postgres, PREFIX_TOKEN).unwrap();
        let statements = m.sql_for_range(1, 2);
        let function = statements
            .iter()
            .find(|s| s.contains("CREATE OR REPLACE FUNCTION"))
            .expect("trigger function statement present");
        assert!(function.contains("NEW.updated_at := now();"));
        assert!(function.contains("$$ LANGUAGE plpgsql"));
    }

    #[test]
    fn test_prefix_substitution_applies_to_all_scripts() {
        let m = Migrator::new(Driver::Postgres, "tenant_a_").unwrap();
        assert_eq!(m.version_table(), "tenant_a_registry_schema_version");
        for statement in m.sql_for_range(0, m.migration_count()) {
            assert!(!statement.contains(PREFIX_TOKEN), "leftover token in {:?}", statement);
        }
        let down = m.sql_for_range(m.migration_count(), 0);
        assert!(down.iter().any(|s| s.contains("tenant_a_custom_fields")));
    }

    #[test]
    fn test_prefix_validation() {
        assert!(Migrator::new(Driver::Postgres, "").is_ok());
        assert!(Migrator::new(Driver::Postgres, "tenant_1_").is_ok());
        assert!(Migrator::new(Driver::Postgres, "_internal").is_ok());

        for bad in ["bad'prefix", "pre fix", "1leading", "semi;colon", "quo\"te", "dash-ed"] {
            match Migrator::new(Driver::Postgres, bad) {
                Err(CfmgError::InvalidPrefix(p)) => assert_eq!(p, bad),
                other => panic!("expected InvalidPrefix for {:?}, got {:?}", bad, other.is_ok()),
            }
        }
    }

    #[test]
    fn test_semver_lookup_round_trip() {
        let m = Migrator::new(Driver::Postgres, PREFIX_TOKEN).unwrap();
        assert_eq!(m.semver(0).as_deref(), Some("0.0.0"));
        assert_eq!(m.semver(2).as_deref(), Some("0.2.0"));
        assert_eq!(m.semver(99), None);

        assert_eq!(m.semver_to_int("0.0.0"), Some(0));
        assert_eq!(m.semver_to_int("0.3.0"), Some(3));
        assert_eq!(m.semver_to_int("v0.3.0"), Some(3));
        assert_eq!(m.semver_to_int("9.9.9"), None);
    }

    #[test]
    fn test_driver_from_str() {
        assert_eq!("postgres".parse::<Driver>().unwrap(), Driver::Postgres);
        assert_eq!("postgresql".parse::<Driver>().unwrap(), Driver::Postgres);
        assert_eq!("mysql".parse::<Driver>().unwrap(), Driver::MySql);
        assert!("mongo".parse::<Driver>().is_err());
    }
}
