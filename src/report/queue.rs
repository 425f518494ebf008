use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::Value;

use crate::config::Config;
use crate::errors::Result;
use crate::queue::SpanQueue;
use crate::span::Endpoint;
use crate::span::FinishedSpan;

use super::Reporter;


/// Queue-backed reporter: one serialized batch per durable message.
///
/// Pushing to the queue fully decouples producer latency from delivery.
/// An empty queue name is a misconfiguration surfaced once as an error
/// log; every report then becomes a no-op rather than a crash.
pub struct QueueReporter {
    queue: Arc<dyn SpanQueue>,
    queue_name: String,
    local: Endpoint,
    misconfigured_logged: AtomicBool,
}

impl QueueReporter {
    pub fn new(config: &Config, queue: Arc<dyn SpanQueue>) -> QueueReporter {
        QueueReporter {
            queue,
            queue_name: config.queue_name.clone(),
            local: Endpoint::new(&config.service_name),
            misconfigured_logged: AtomicBool::new(false),
        }
    }
}

impl Reporter for QueueReporter {
    fn report(&self, spans: &[FinishedSpan]) -> Result<()> {
        if spans.is_empty() {
            return Ok(());
        }
        if self.queue_name.is_empty() {
            if !self.misconfigured_logged.swap(true, Ordering::Relaxed) {
                tracing::error!("span report skipped: queue name is empty");
            }
            return Ok(());
        }
        let documents: Vec<Value> = spans
            .iter()
            .map(|span| span.to_document(&self.local))
            .collect();
        let payload = serde_json::to_string(&documents)?;
        self.queue.push(&self.queue_name, &payload)
    }
}
