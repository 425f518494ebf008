use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::TimeZone;
use chrono::Utc;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;

use crate::config::Config;
use crate::errors::Error;
use crate::errors::Result;
use crate::index::SpanIndex;
use crate::queue::SpanQueue;
use crate::report::CollectorSink;


const INDEX_PREFIX: &str = "zipkin:span:processed-";


/// Long-running consumer that drains the span queue and fans out.
///
/// Each poll iteration pops at most one message, decodes it and appends
/// its spans to an aggregation buffer. Every `relay_frequency` iterations
/// the buffer is forwarded to the collector, bulk-indexed, and cleared.
/// The loop sleeps `relay_interval_ms` between iterations whether or not
/// work was found.
///
/// Failure policy is best effort throughout: malformed messages are
/// discarded, forwarding and indexing failures are logged and the
/// undelivered batch is dropped. The loop itself never terminates on a
/// delivery failure; supervision and restarts are external concerns.
pub struct RelayConsumer {
    queue: Arc<dyn SpanQueue>,
    queue_name: String,
    collector: Box<dyn CollectorSink>,
    index: Option<Box<dyn SpanIndex>>,
    frequency: u32,
    interval: Duration,
    counter: u32,
    buffer: Vec<Value>,
}

impl RelayConsumer {
    /// Build a consumer; an empty queue name is the one fatal
    /// misconfiguration and is reported to the operator immediately.
    pub fn new(
        config: &Config,
        queue: Arc<dyn SpanQueue>,
        collector: Box<dyn CollectorSink>,
        index: Option<Box<dyn SpanIndex>>,
    ) -> Result<RelayConsumer> {
        if config.queue_name.is_empty() {
            return Err(Error::InvalidConfig(String::from("queue name is empty")));
        }
        Ok(RelayConsumer {
            queue,
            queue_name: config.queue_name.clone(),
            collector,
            index,
            frequency: config.relay_frequency.max(1),
            interval: Duration::from_millis(config.relay_interval_ms),
            counter: 0,
            buffer: Vec::new(),
        })
    }

    /// Poll and sleep forever.
    pub fn run(&mut self) {
        loop {
            self.poll_once();
            thread::sleep(self.interval);
        }
    }

    /// One iteration of the polling loop.
    pub fn poll_once(&mut self) {
        match self.queue.pop(&self.queue_name) {
            Ok(Some(payload)) => match serde_json::from_str::<Vec<Value>>(&payload) {
                Ok(spans) => self.buffer.extend(spans),
                Err(error) => {
                    tracing::warn!("discarding malformed span batch: {}", error);
                }
            },
            Ok(None) => (),
            Err(error) => tracing::warn!("queue pop failed: {}", error),
        }
        self.counter += 1;
        if self.counter >= self.frequency {
            self.flush();
            self.counter = 0;
        }
    }

    /// Spans currently waiting in the aggregation buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        if let Err(error) = self.collector.forward(&self.buffer) {
            tracing::error!("collector forward failed, dropping batch: {}", error);
        }
        if let Some(index) = &self.index {
            let items: Vec<(String, Value)> = self
                .buffer
                .iter()
                .map(|span| (index_name(span), index_document(span)))
                .collect();
            if let Err(error) = index.bulk(&items) {
                tracing::error!("bulk index failed, dropping batch: {}", error);
            }
        }
        self.buffer.clear();
    }
}


fn start_seconds(span: &Value) -> i64 {
    let micros = span.get("timestamp").and_then(Value::as_u64).unwrap_or(0);
    (micros / 1_000_000) as i64
}

/// Day-bucketed index name derived from the span's start timestamp.
pub fn index_name(span: &Value) -> String {
    let date = Utc
        .timestamp_opt(start_seconds(span), 0)
        .single()
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| String::from("1970-01-01"));
    format!("{}{}", INDEX_PREFIX, date)
}

/// Flatten a collector-format span into an index document.
///
/// Tags become individually prefixed `tag_*` fields, `is_success` is
/// derived from the presence of an `error` tag, and the known numeric
/// looking tags are coerced to numbers for the index schema.
pub fn index_document(span: &Value) -> Value {
    let mut document = match span {
        Value::Object(fields) => fields.clone(),
        _ => Map::new(),
    };

    let created_at = Utc
        .timestamp_opt(start_seconds(span), 0)
        .single()
        .map(|at| at.to_rfc3339())
        .unwrap_or_default();
    document.insert(String::from("created_at"), json!(created_at));

    let mut has_error = false;
    if let Some(Value::Object(tags)) = document.remove("tags") {
        for (key, value) in tags {
            if key == "error" {
                has_error = true;
            }
            let field = format!("tag_{}", key.replace('.', "_"));
            document.insert(field, value);
        }
    }
    document.insert(String::from("is_success"), json!(!has_error));

    let status = document
        .get("tag_http_status_code")
        .and_then(Value::as_str)
        .and_then(|status| status.parse::<i64>().ok());
    if let Some(status) = status {
        document.insert(String::from("tag_http_status_code"), json!(status));
    }

    let memory = document
        .get("tag_runtime_memory")
        .and_then(Value::as_str)
        .and_then(|memory| memory.trim_end_matches("MB").parse::<f64>().ok());
    if let Some(memory) = memory {
        document.insert(String::from("tag_runtime_memory_float"), json!(memory));
    }

    Value::Object(document)
}
