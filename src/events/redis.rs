use async_trait::async_trait;
use redis::AsyncCommands;

use crate::config::RedisSinkConfig;
use crate::error::Result;
use crate::events::{Event, Sink};

/// Publishes events on a Redis pub/sub channel. A disabled or DSN-less
/// section builds to `None`, so an unconfigured sink is a permanent no-op
/// rather than a retried failure.
pub struct RedisSink {
    client: redis::Client,
    channel: String,
}

impl RedisSink {
    pub fn from_config(cfg: &RedisSinkConfig) -> Result<Option<Self>> {
        if !cfg.enabled || cfg.dsn.is_empty() {
            return Ok(None);
        }
        let client = redis::Client::open(cfg.dsn.as_str())?;
        Ok(Some(Self {
            client,
            channel: cfg.channel.clone(),
        }))
    }
}

#[async_trait]
impl Sink for RedisSink {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn emit(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.client.get_async_connection().await?;
        let _receivers: i64 = conn.publish(&self.channel, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_builds_no_sink() {
        let cfg = RedisSinkConfig {
            enabled: false,
            dsn: "redis://localhost:6379".to_string(),
            channel: "cfmg-events".to_string(),
        };
        assert!(RedisSink::from_config(&cfg).unwrap().is_none());

        let cfg = RedisSinkConfig {
            enabled: true,
            dsn: String::new(),
            channel: "cfmg-events".to_string(),
        };
        assert!(RedisSink::from_config(&cfg).unwrap().is_none());
    }

    #[test]
    fn test_invalid_dsn_is_an_error() {
        let cfg = RedisSinkConfig {
            enabled: true,
            dsn: "not-a-redis-url".to_string(),
            channel: "cfmg-events".to_string(),
        };
        assert!(RedisSink::from_config(&cfg).is_err());
    }
}
