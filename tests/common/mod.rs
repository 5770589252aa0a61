//! Shared test doubles.

use async_trait::async_trait;
use cfmg::{CfmgError, Result, SchemaExecutor, VersionRead};

/// Scripted in-memory stand-in for a live database connection. It records
/// every statement the engine executes, keeps transaction semantics
/// (snapshot on begin, restore on rollback), and tracks the version table
/// by recognizing the version-marker statements the embedded scripts issue.
pub struct FakeDb {
    version_table: String,
    table_exists: bool,
    versions: Vec<i64>,
    /// Statements from committed transactions, in execution order.
    pub journal: Vec<String>,
    /// Substring that makes `execute` fail when matched.
    pub fail_on: Option<String>,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    tx: Option<TxSnapshot>,
}

struct TxSnapshot {
    statements: Vec<String>,
    saved_exists: bool,
    saved_versions: Vec<i64>,
}

impl FakeDb {
    pub fn new(version_table: impl Into<String>) -> Self {
        Self {
            version_table: version_table.into(),
            table_exists: false,
            versions: Vec::new(),
            journal: Vec::new(),
            fail_on: None,
            begins: 0,
            commits: 0,
            rollbacks: 0,
            tx: None,
        }
    }

    pub fn fail_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    pub fn version_table_exists(&self) -> bool {
        self.table_exists
    }

    pub fn recorded_versions(&self) -> &[i64] {
        &self.versions
    }

    fn apply_effects(&mut self, sql: &str) {
        if sql.starts_with(&format!("CREATE TABLE {}", self.version_table)) {
            self.table_exists = true;
        } else if sql.starts_with(&format!("DROP TABLE IF EXISTS {}", self.version_table)) {
            self.table_exists = false;
            self.versions.clear();
        } else if sql.starts_with(&format!("INSERT INTO {} ", self.version_table)) {
            if let Some(version) = parse_leading_int(sql.split('(').nth(2).unwrap_or("")) {
                self.versions.push(version);
            }
        } else if sql.starts_with(&format!("DELETE FROM {} WHERE version = ", self.version_table)) {
            if let Some(version) = parse_leading_int(sql.rsplit('=').next().unwrap_or("")) {
                self.versions.retain(|v| *v != version);
            }
        }
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let digits: String = s.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[async_trait]
impl SchemaExecutor for FakeDb {
    async fn begin(&mut self) -> Result<()> {
        assert!(self.tx.is_none(), "nested transaction");
        self.begins += 1;
        self.tx = Some(TxSnapshot {
            statements: Vec::new(),
            saved_exists: self.table_exists,
            saved_versions: self.versions.clone(),
        });
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        if let Some(needle) = &self.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(CfmgError::Config(format!("forced failure on {:?}", needle)));
            }
        }
        let tx = self.tx.as_mut().expect("execute outside transaction");
        tx.statements.push(sql.to_string());
        let sql = sql.to_string();
        self.apply_effects(&sql);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.tx.take().expect("commit outside transaction");
        self.commits += 1;
        self.journal.extend(tx.statements);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let tx = self.tx.take().expect("rollback outside transaction");
        self.rollbacks += 1;
        self.table_exists = tx.saved_exists;
        self.versions = tx.saved_versions;
        Ok(())
    }

    async fn current_version(&mut self, version_table: &str) -> Result<VersionRead> {
        assert_eq!(version_table, self.version_table);
        if !self.table_exists {
            return Ok(VersionRead::TableMissing);
        }
        Ok(match self.versions.iter().max() {
            Some(max) => VersionRead::Version(*max),
            None => VersionRead::Empty,
        })
    }
}
