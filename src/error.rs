use thiserror::Error;

/// Main error type for cfmg
#[derive(Error, Debug)]
pub enum CfmgError {
    // Migration Errors
    #[error("version table {table} not found")]
    NoVersionTable { table: String },

    #[error("target version {target} exceeds known migration count {max}")]
    TargetOutOfRange { target: i64, max: i64 },

    #[error("migration {version} failed at statement {statement:?}: {message}")]
    MigrationFailed {
        version: i64,
        statement: String,
        message: String,
    },

    #[error("invalid table prefix {0:?}")]
    InvalidPrefix(String),

    // Database Errors
    #[error("database error: {message}")]
    Database {
        message: String,
        #[source]
        source: tokio_postgres::Error,
    },

    // Configuration Errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to load configuration from {path}: {message}")]
    ConfigLoad { path: String, message: String },

    // Event Delivery Errors
    #[error("sink {0:?} already registered")]
    DuplicateSink(String),

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned status {status}")]
    WebhookStatus { status: u16 },

    #[error("redis publish failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[cfg(feature = "kafka")]
    #[error("kafka produce failed: {0}")]
    Kafka(String),

    #[error("dead-letter store failed: {message}")]
    DeadLetter { message: String },
}

impl From<tokio_postgres::Error> for CfmgError {
    fn from(err: tokio_postgres::Error) -> Self {
        CfmgError::Database {
            message: err.to_string(),
            source: err,
        }
    }
}

/// Result type alias for cfmg operations
pub type Result<T> = std::result::Result<T, CfmgError>;

/// True when the error is PostgreSQL's undefined_table (SQLSTATE 42P01).
pub fn is_undefined_table(err: &tokio_postgres::Error) -> bool {
    err.as_db_error()
        .map(|db| db.code() == &tokio_postgres::error::SqlState::UNDEFINED_TABLE)
        .unwrap_or(false)
}

/// Format an error with its full source chain, one cause per line.
pub fn format_error_chain(err: &CfmgError) -> String {
    use std::error::Error;

    let mut output = format!("Error: {}", err);

    let mut current_err: &dyn Error = err;
    while let Some(source) = current_err.source() {
        output.push_str(&format!("\n  Caused by: {}", source));
        current_err = source;
    }

    output
}
