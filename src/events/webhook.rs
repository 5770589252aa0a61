use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::WebhookSinkConfig;
use crate::error::{CfmgError, Result};
use crate::events::{Event, Sink};

/// Request header carrying the HMAC-SHA256 signature of the raw JSON body.
pub const SIGNATURE_HEADER: &str = "x-cfmg-signature";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

type HmacSha256 = Hmac<Sha256>;

/// POSTs events as JSON to an HTTP endpoint. When a shared secret is
/// configured, the raw body is signed and the hex digest attached as
/// `x-cfmg-signature: sha256=<hex>`. Any response status >= 300 counts as a
/// failed delivery attempt.
pub struct WebhookSink {
    endpoint: String,
    secret: Option<String>,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(endpoint: impl Into<String>, secret: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            secret: secret.filter(|s| !s.is_empty()),
            client,
        })
    }

    /// Build from config; a disabled or endpoint-less section yields `None`
    /// so optional sinks never enter the dispatch path.
    pub fn from_config(cfg: &WebhookSinkConfig) -> Result<Option<Self>> {
        if !cfg.enabled || cfg.endpoint.is_empty() {
            return Ok(None);
        }
        let timeout = if cfg.timeout_ms > 0 {
            Duration::from_millis(cfg.timeout_ms)
        } else {
            DEFAULT_TIMEOUT
        };
        let secret = if cfg.secret.is_empty() {
            None
        } else {
            Some(cfg.secret.clone())
        };
        Ok(Some(Self::new(cfg.endpoint.clone(), secret, timeout)?))
    }
}

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[async_trait]
impl Sink for WebhookSink {
    fn kind(&self) -> &'static str {
        "webhook"
    }

    async fn emit(&self, event: &Event) -> Result<()> {
        let body = serde_json::to_vec(event)?;
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, format!("sha256={}", sign(secret, &body)));
        }
        let response = request.body(body).send().await?;
        let status = response.status().as_u16();
        if status >= 300 {
            return Err(CfmgError::WebhookStatus { status });
        }
        Ok(())
    }
}
