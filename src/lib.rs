//! cfmg: versioned structural metadata for relational tables.
//!
//! The crate owns three tightly coupled cores:
//!
//! - [`migrate`]: a transactional, dialect-aware migration engine that walks
//!   a tenant's registry schema through an ordered list of embedded SQL
//!   scripts, built on the quote-aware statement splitter in [`sql`].
//! - [`diff`]: a canonicalizing JSON diff engine producing deterministic
//!   unified diffs with change counts, used for audit trails and drift
//!   detection.
//! - [`events`]: a concurrent dispatcher that fans registry change events
//!   out to webhook/pub-sub/broker sinks with per-sink retry, exponential
//!   backoff, and dead-letter capture.
//!
//! HTTP routing, CLI parsing, policy enforcement, and registry row
//! persistence live in the embedding service; this crate only tracks and
//! propagates schema versions and their diffs.

pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod logging;
pub mod migrate;
pub mod sql;

pub use config::{Config, EventsConfig};
pub use diff::{canonicalize_json, unified_diff, DiffReport};
pub use error::{CfmgError, Result};
pub use events::{
    dispatcher_from_config, DeadLetterStore, Dispatcher, Event, RetryPolicy, Sink, SinkRegistry,
    WebhookSink,
};
pub use migrate::{Driver, Migration, Migrator, PgExecutor, SchemaExecutor, VersionRead};
pub use sql::split_statements;
