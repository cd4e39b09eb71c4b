//! Delivery of normalized sale events to the downstream automation endpoint.
//!
//! Only transport-level failures retry (bounded attempts, exponential backoff). A response from the sink, 2xx or
//! not, ends the attempt loop: a non-2xx answer is the sink's decision and retrying it immediately would not change
//! anything. On exhaustion the forwarder returns a sentinel failure result rather than an error, so the pipeline can
//! always release its claim and acknowledge the inbound caller.

use std::sync::Arc;

use log::*;
use reqwest::Client;

use crate::{config::ForwardConfig, data_objects::SaleEvent, errors::ServerError};

/// The terminal result of a delivery attempt sequence. `status` is `None` when no response was ever received.
#[derive(Debug, Clone, Default)]
pub struct DeliveryResult {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<String>,
}

impl DeliveryResult {
    pub fn delivered(&self) -> bool {
        self.status.map(|s| (200..300).contains(&s)).unwrap_or(false)
    }

    pub fn failed(error: String) -> Self {
        Self { status: None, body: None, error: Some(error) }
    }
}

/// A destination for normalized sale events.
#[allow(async_fn_in_trait)]
pub trait EventSink {
    async fn deliver(&self, event: &SaleEvent, idempotency_key: &str) -> DeliveryResult;
}

#[derive(Debug, Clone)]
pub struct HttpForwarder {
    config: ForwardConfig,
    client: Arc<Client>,
}

impl HttpForwarder {
    pub fn new(config: ForwardConfig) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }
}

impl EventSink for HttpForwarder {
    async fn deliver(&self, event: &SaleEvent, idempotency_key: &str) -> DeliveryResult {
        let Some(url) = self.config.sink_url.as_deref() else {
            return DeliveryResult::failed("MSR_SINK_URL is not set".to_string());
        };
        let mut delay = self.config.backoff_base;
        let mut last_error = None;
        for attempt in 1..=self.config.max_retries {
            let result = self.client.post(url).header("Idempotency-Key", idempotency_key).json(event).send().await;
            match result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    if (200..300).contains(&status) {
                        debug!("📤 Sale event {idempotency_key} delivered. Sink answered {status}");
                    } else {
                        warn!("📤 Sink rejected sale event {idempotency_key} with status {status}. {body}");
                    }
                    return DeliveryResult { status: Some(status), body: Some(body), error: None };
                },
                Err(e) => {
                    warn!(
                        "📤 Transport failure delivering {idempotency_key} (attempt {attempt}/{}). {e}",
                        self.config.max_retries
                    );
                    last_error = Some(e.to_string());
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                },
            }
        }
        DeliveryResult::failed(last_error.unwrap_or_else(|| "unknown transport failure".to_string()))
    }
}
