use async_trait::async_trait;
use tokio_postgres::Client;

use crate::error::{is_undefined_table, Result};

/// Outcome of reading `MAX(version)` from a version table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRead {
    /// The version table does not exist yet (bootstrap condition).
    TableMissing,
    /// The table exists but holds no rows.
    Empty,
    Version(i64),
}

/// Connection seam the migration engine runs against. One implementor per
/// live driver; tests script an in-memory one. Implementations only provide
/// plain statement execution plus explicit transaction control; the engine
/// decides what runs inside the transaction.
#[async_trait]
pub trait SchemaExecutor: Send {
    async fn begin(&mut self) -> Result<()>;

    async fn execute(&mut self, sql: &str) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Read the recorded schema version from `version_table`.
    async fn current_version(&mut self, version_table: &str) -> Result<VersionRead>;
}

/// PostgreSQL executor over an established tokio-postgres client.
///
/// Transaction control is issued as explicit BEGIN/COMMIT/ROLLBACK so the
/// whole migration range shares one transaction without tying the engine to
/// tokio-postgres lifetimes.
pub struct PgExecutor {
    client: Client,
}

impl PgExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn into_client(self) -> Client {
        self.client
    }
}

#[async_trait]
impl SchemaExecutor for PgExecutor {
    async fn begin(&mut self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn current_version(&mut self, version_table: &str) -> Result<VersionRead> {
        let query = format!("SELECT MAX(version) FROM {}", version_table);
        match self.client.query_one(&query, &[]).await {
            Ok(row) => {
                let version: Option<i32> = row.get(0);
                Ok(match version {
                    Some(v) => VersionRead::Version(i64::from(v)),
                    None => VersionRead::Empty,
                })
            }
            Err(err) if is_undefined_table(&err) => Ok(VersionRead::TableMissing),
            Err(err) => Err(err.into()),
        }
    }
}
