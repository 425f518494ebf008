use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde_json::json;
use serde_json::Value;

use crate::context::TraceContext;
use crate::metrics::MetricsSnapshot;

pub mod tag;

use self::tag::SpanTags;
use self::tag::TagValue;


/// Role of the traced operation relative to its peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Client,
    Server,
    Producer,
    Consumer,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Client => "CLIENT",
            Kind::Server => "SERVER",
            Kind::Producer => "PRODUCER",
            Kind::Consumer => "CONSUMER",
        }
    }
}


/// The service reporting the spans, attached to every document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub service_name: String,
}

impl Endpoint {
    pub fn new(service_name: &str) -> Endpoint {
        Endpoint {
            service_name: String::from(service_name),
        }
    }
}


/// Model of an in-progress traced operation.
///
/// A `Span` is to a distributed trace what a stack frame is to a stack
/// trace. Spans are created by `Tracer::start_span`, mutated only by the
/// owning execution, and consumed by `Tracer::finish`: the type system
/// makes finishing a span twice impossible.
#[derive(Debug)]
pub struct Span {
    context: TraceContext,
    name: String,
    kind: Option<Kind>,
    start: SystemTime,
    tags: SpanTags,
    start_snapshot: Option<MetricsSnapshot>,
}

impl Span {
    pub(crate) fn new(name: &str, kind: Option<Kind>, context: TraceContext) -> Span {
        Span {
            context,
            name: String::from(name),
            kind,
            start: SystemTime::now(),
            tags: SpanTags::new(),
            start_snapshot: None,
        }
    }

    /// Access the span's `TraceContext`.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// True when this span carries payload (tags and enrichment).
    pub fn is_sampled(&self) -> bool {
        self.context.is_sampled()
    }

    /// Returns the operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rewrite the operation name.
    ///
    /// The name stays mutable until finish so it can be replaced once a
    /// route pattern is resolved.
    pub fn set_name(&mut self, name: &str) {
        self.name = String::from(name);
    }

    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    /// Append a tag to the span.
    ///
    /// Values outside the accepted scalar shapes coerce to the empty
    /// string; tagging never fails.
    pub fn tag<TV: Into<TagValue>>(&mut self, key: &str, value: TV) {
        self.tags.tag(key, value);
    }

    /// Access the tags appended so far.
    pub fn tags(&self) -> &SpanTags {
        &self.tags
    }

    pub(crate) fn start(&self) -> SystemTime {
        self.start
    }

    pub(crate) fn start_snapshot(&self) -> Option<&MetricsSnapshot> {
        self.start_snapshot.as_ref()
    }

    pub(crate) fn set_start_snapshot(&mut self, snapshot: MetricsSnapshot) {
        self.start_snapshot = Some(snapshot);
    }

    pub(crate) fn into_finished(self, duration_micros: u64) -> FinishedSpan {
        let start_micros = self
            .start
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_micros() as u64)
            .unwrap_or(0);
        FinishedSpan {
            context: self.context,
            name: self.name,
            kind: self.kind,
            start_micros,
            duration_micros,
            tags: self.tags,
        }
    }
}


/// A span whose operation has completed.
///
/// Finished spans are immutable payloads for reporting; they are handed
/// to a `Reporter` and never reused.
#[derive(Clone, Debug)]
pub struct FinishedSpan {
    context: TraceContext,
    name: String,
    kind: Option<Kind>,
    start_micros: u64,
    duration_micros: u64,
    tags: SpanTags,
}

impl FinishedSpan {
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    /// Start timestamp in microseconds since the epoch.
    pub fn start_micros(&self) -> u64 {
        self.start_micros
    }

    pub fn duration_micros(&self) -> u64 {
        self.duration_micros
    }

    pub fn tags(&self) -> &SpanTags {
        &self.tags
    }

    /// Encode the span as a collector-format JSON document.
    pub fn to_document(&self, local: &Endpoint) -> Value {
        let mut document = serde_json::Map::new();
        document.insert(String::from("traceId"), json!(self.context.trace_id_hex()));
        document.insert(String::from("id"), json!(self.context.span_id_hex()));
        document.insert(String::from("name"), json!(self.name));
        document.insert(String::from("timestamp"), json!(self.start_micros));
        document.insert(String::from("duration"), json!(self.duration_micros));
        document.insert(
            String::from("localEndpoint"),
            json!({"serviceName": local.service_name}),
        );
        if let Some(parent) = self.context.parent_id_hex() {
            document.insert(String::from("parentId"), json!(parent));
        }
        if let Some(kind) = self.kind {
            document.insert(String::from("kind"), json!(kind.as_str()));
        }
        if self.context.flags().is_debug() {
            document.insert(String::from("debug"), json!(true));
        }
        if !self.tags.is_empty() {
            let mut tags = serde_json::Map::new();
            for (key, value) in self.tags.iter() {
                tags.insert(String::from(key), json!(value));
            }
            document.insert(String::from("tags"), Value::Object(tags));
        }
        Value::Object(document)
    }
}
