use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::config::KafkaSinkConfig;
use crate::error::{CfmgError, Result};
use crate::events::{Event, Sink};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Produces events to a Kafka topic. The send is bounded: a producer error
/// or a timed-out enqueue both surface as one failed delivery attempt for
/// the dispatcher's retry loop.
pub struct KafkaSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaSink {
    pub fn from_config(cfg: &KafkaSinkConfig) -> Result<Option<Self>> {
        if !cfg.enabled || cfg.brokers.is_empty() {
            return Ok(None);
        }
        let producer = ClientConfig::new()
            .set("bootstrap.servers", cfg.brokers.join(","))
            .create()
            .map_err(|err| CfmgError::Kafka(err.to_string()))?;
        Ok(Some(Self {
            producer,
            topic: cfg.topic.clone(),
        }))
    }
}

#[async_trait]
impl Sink for KafkaSink {
    fn kind(&self) -> &'static str {
        "kafka"
    }

    async fn emit(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        let record = FutureRecord::to(&self.topic).payload(&payload).key(&event.id);
        self.producer
            .send(record, Timeout::After(SEND_TIMEOUT))
            .await
            .map_err(|(err, _)| CfmgError::Kafka(err.to_string()))?;
        Ok(())
    }
}
