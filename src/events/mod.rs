//! Registry change events and their best-effort propagation.
//!
//! A [`Dispatcher`] fans one [`Event`] out to every configured [`Sink`]
//! concurrently. Each (event, sink) pair gets its own delivery task with
//! isolated exponential backoff, so a slow or dead sink never holds up the
//! others. Events that exhaust their attempts on a sink are appended to the
//! dead-letter store, once, and then considered closed.

pub mod dlq;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod redis;
pub mod registry;
pub mod webhook;

pub use dlq::{DeadLetterStore, PgDeadLetterStore};
pub use registry::SinkRegistry;
pub use webhook::WebhookSink;

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::EventsConfig;
use crate::diff::DiffReport;
use crate::error::Result;

/// A registry change notification. Owned by the dispatcher only for the
/// duration of delivery; never stored except through the dead-letter path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub time: DateTime<Utc>,
    pub data: Value,
    pub id: String,
}

impl Event {
    pub fn new(name: impl Into<String>, id: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            time: Utc::now(),
            data,
            id: id.into(),
        }
    }

    /// Event carrying a schema drift/change report for one tenant scope.
    pub fn diff_report(id: impl Into<String>, report: &DiffReport) -> Self {
        Self::new(
            "cf.registry.diff",
            id,
            serde_json::json!({
                "added": report.added,
                "removed": report.removed,
                "unified": report.unified,
            }),
        )
    }

    /// Event announcing a completed schema migration.
    pub fn schema_migrated(id: impl Into<String>, from: i64, to: i64) -> Self {
        Self::new(
            "cf.registry.migrated",
            id,
            serde_json::json!({ "from": from, "to": to }),
        )
    }
}

/// A pluggable delivery target. Implementations must be safe to call from
/// multiple delivery tasks at once.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short adapter kind for logs ("webhook", "redis", ...).
    fn kind(&self) -> &'static str;

    async fn emit(&self, event: &Event) -> Result<()>;
}

/// Per-sink retry settings: `max_attempts` total attempts, the first one
/// immediate, each wait doubling from `initial_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &EventsConfig) -> Self {
        let mut policy = Self::default();
        if cfg.retry.max_attempts > 0 {
            policy.max_attempts = cfg.retry.max_attempts;
        }
        if cfg.retry.initial_delay_ms > 0 {
            policy.initial_delay = Duration::from_millis(cfg.retry.initial_delay_ms);
        }
        policy
    }
}

/// Broadcasts events to registered sinks with per-sink retry and dead-letter
/// capture. `dispatch` is fire-and-forget; there is no per-event completion
/// signal, only [`settled`](Dispatcher::settled) for quiescing everything
/// in flight (shutdown, tests).
pub struct Dispatcher {
    sinks: Vec<(String, Arc<dyn Sink>)>,
    retry: RetryPolicy,
    dlq: Option<Arc<dyn DeadLetterStore>>,
    inflight: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(
        registry: SinkRegistry,
        retry: RetryPolicy,
        dlq: Option<Arc<dyn DeadLetterStore>>,
    ) -> Self {
        Self {
            sinks: registry.into_entries(),
            retry,
            dlq,
            inflight: Mutex::new(Vec::new()),
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Start one independent delivery task per sink and return immediately.
    /// Nothing is reported back to the caller; failures end up in the
    /// dead-letter store or the log.
    pub fn dispatch(&self, event: Event) {
        let mut inflight = self.inflight.lock().unwrap_or_else(|p| p.into_inner());
        for (name, sink) in &self.sinks {
            let task = deliver(
                name.clone(),
                Arc::clone(sink),
                event.clone(),
                self.retry,
                self.dlq.clone(),
            );
            inflight.push(tokio::spawn(task));
        }
    }

    /// Wait until every delivery task spawned so far has finished, including
    /// their retries and dead-letter writes. Deliveries dispatched while
    /// waiting are awaited too.
    pub async fn settled(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut inflight = self.inflight.lock().unwrap_or_else(|p| p.into_inner());
                std::mem::take(&mut *inflight)
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                let _ = handle.await;
            }
        }
    }
}

async fn deliver(
    name: String,
    sink: Arc<dyn Sink>,
    event: Event,
    retry: RetryPolicy,
    dlq: Option<Arc<dyn DeadLetterStore>>,
) {
    let mut delay = retry.initial_delay;
    let mut last_error = String::new();
    for attempt in 1..=retry.max_attempts {
        match sink.emit(&event).await {
            Ok(()) => {
                debug!(sink = %name, event = %event.name, attempt, "event delivered");
                return;
            }
            Err(err) => {
                warn!(sink = %name, event = %event.name, attempt, error = %err, "event delivery failed");
                last_error = err.to_string();
            }
        }
        if attempt < retry.max_attempts {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    match &dlq {
        Some(store) => {
            if let Err(err) = store.store(&event, retry.max_attempts, &last_error).await {
                // Never re-enter the retry loop for the dead-letter store.
                error!(sink = %name, event = %event.name, error = %err, "dead-letter write failed, event dropped");
            }
        }
        None => {
            warn!(sink = %name, event = %event.name, "delivery exhausted and no dead-letter store configured");
        }
    }
}

/// Build a dispatcher from configuration: every enabled sink is registered
/// under its kind, retry settings fall back to the documented defaults.
pub fn dispatcher_from_config(
    cfg: &EventsConfig,
    dlq: Option<Arc<dyn DeadLetterStore>>,
) -> Result<Dispatcher> {
    let mut registry = SinkRegistry::new();
    if let Some(sink) = WebhookSink::from_config(&cfg.sinks.webhook)? {
        registry.register("webhook", Arc::new(sink))?;
    }
    if let Some(sink) = redis::RedisSink::from_config(&cfg.sinks.redis)? {
        registry.register("redis", Arc::new(sink))?;
    }
    #[cfg(feature = "kafka")]
    if let Some(sink) = kafka::KafkaSink::from_config(&cfg.sinks.kafka)? {
        registry.register("kafka", Arc::new(sink))?;
    }
    Ok(Dispatcher::new(registry, RetryPolicy::from_config(cfg), dlq))
}
