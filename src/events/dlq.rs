use async_trait::async_trait;
use tokio_postgres::Client;

use crate::error::{CfmgError, Result};
use crate::events::Event;
use crate::migrate::validate_prefix;

/// Durable record of events that exhausted every delivery attempt on a sink.
/// Append-only: entries are never updated or re-driven by the dispatcher.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn store(&self, event: &Event, attempts: u32, last_error: &str) -> Result<()>;
}

/// Dead-letter store backed by the `{prefix}events_failed` table created by
/// the registry migrations.
pub struct PgDeadLetterStore {
    client: Client,
    table: String,
}

impl PgDeadLetterStore {
    pub fn new(client: Client, table_prefix: &str) -> Result<Self> {
        validate_prefix(table_prefix)?;
        Ok(Self {
            client,
            table: format!("{}events_failed", table_prefix),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl DeadLetterStore for PgDeadLetterStore {
    async fn store(&self, event: &Event, attempts: u32, last_error: &str) -> Result<()> {
        let payload = serde_json::to_value(event)?;
        let statement = format!(
            "INSERT INTO {} (name, payload, attempts, last_error) VALUES ($1, $2, $3, $4)",
            self.table
        );
        self.client
            .execute(
                &statement,
                &[&event.name, &payload, &(attempts as i32), &last_error],
            )
            .await
            .map_err(|err| CfmgError::DeadLetter {
                message: err.to_string(),
            })?;
        Ok(())
    }
}
