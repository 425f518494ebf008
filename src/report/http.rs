use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::Config;
use crate::errors::Error;
use crate::errors::Result;
use crate::span::Endpoint;
use crate::span::FinishedSpan;

use super::CollectorSink;
use super::Reporter;


/// HTTP push of span-document batches to the collector endpoint.
///
/// Every push is bounded by the configured timeout; there is no retry.
pub struct HttpCollector {
    endpoint_url: String,
    client: Client,
}

impl HttpCollector {
    pub fn new(config: &Config) -> Result<HttpCollector> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(HttpCollector {
            endpoint_url: config.endpoint_url.clone(),
            client,
        })
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    fn post(&self, spans: &[Value]) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint_url)
            .json(spans)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::CollectorStatus(status.as_u16()));
        }
        Ok(())
    }
}

impl CollectorSink for HttpCollector {
    fn forward(&self, spans: &[Value]) -> Result<()> {
        if spans.is_empty() {
            return Ok(());
        }
        self.post(spans)
    }
}


/// Direct reporter: encodes and pushes each batch synchronously.
///
/// The instrumented call path pays for the push, bounded by the timeout;
/// failed batches are dropped.
pub struct HttpReporter {
    collector: HttpCollector,
    local: Endpoint,
}

impl HttpReporter {
    pub fn new(config: &Config) -> Result<HttpReporter> {
        Ok(HttpReporter {
            collector: HttpCollector::new(config)?,
            local: Endpoint::new(&config.service_name),
        })
    }
}

impl Reporter for HttpReporter {
    fn report(&self, spans: &[FinishedSpan]) -> Result<()> {
        if spans.is_empty() {
            return Ok(());
        }
        let documents: Vec<Value> = spans
            .iter()
            .map(|span| span.to_document(&self.local))
            .collect();
        self.collector.post(&documents)
    }
}
